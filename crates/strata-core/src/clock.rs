use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Format used for labels and task output, e.g. `2024-03-09 14:05:07.000125`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Wall-clock source for labels and task completion markers.
pub trait Clock: Send + Sync {
    /// Current local wall time.
    fn now(&self) -> NaiveDateTime;
}

/// Render a timestamp the way labels and task outputs embed it.
#[must_use]
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Local wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Configuration for a [`SteppingClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSpec {
    /// Base timestamp in milliseconds since the Unix epoch.
    pub base_millis: i64,
    /// Milliseconds added per read.
    pub step_millis: i64,
}

impl Default for ClockSpec {
    fn default() -> Self {
        Self {
            base_millis: 1_700_000_000_000,
            step_millis: 1,
        }
    }
}

/// Deterministic clock that advances a fixed step on every read.
///
/// A step of zero gives a fixed clock.
#[derive(Debug)]
pub struct SteppingClock {
    spec: ClockSpec,
    reads: AtomicI64,
}

impl SteppingClock {
    #[must_use]
    pub const fn new(spec: ClockSpec) -> Self {
        Self {
            spec,
            reads: AtomicI64::new(0),
        }
    }

    /// A clock that always reports `base_millis`.
    #[must_use]
    pub const fn fixed(base_millis: i64) -> Self {
        Self::new(ClockSpec {
            base_millis,
            step_millis: 0,
        })
    }

    fn next_millis(&self) -> i64 {
        let reads = self.reads.fetch_add(1, Ordering::SeqCst);
        self.spec
            .base_millis
            .saturating_add(self.spec.step_millis.saturating_mul(reads))
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> NaiveDateTime {
        DateTime::from_timestamp_millis(self.next_millis())
            .unwrap_or_default()
            .naive_utc()
    }
}
