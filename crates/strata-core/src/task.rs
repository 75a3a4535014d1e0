//! The shared side effect observed by every state layer.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::clock::{Clock, format_timestamp};

/// Output reported before any layer has run the task.
pub const NOT_EXECUTED: &str = "not-executed";

/// Outcome of a side-effecting operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    output: String,
}

impl TaskResult {
    #[must_use]
    pub fn new() -> Self {
        Self {
            output: NOT_EXECUTED.to_string(),
        }
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Overwrite the output with a `done at {timestamp}` marker.
    pub fn run(&mut self, clock: &dyn Clock) {
        self.output = format!("done at {}", format_timestamp(clock.now()));
    }
}

impl Default for TaskResult {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output)
    }
}

/// Shared-ownership handle to a [`TaskResult`].
///
/// Cloning the handle aliases the same result: a run through any clone is
/// visible through all of them. The result lives as long as its longest
/// holder.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    inner: Arc<Mutex<TaskResult>>,
}

impl TaskHandle {
    /// Allocate a fresh, not-yet-executed result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the task, updating the output seen by every holder.
    pub fn run(&self, clock: &dyn Clock) {
        let mut task = self.lock();
        task.run(clock);
        debug!(output = %task.output(), "task run");
    }

    /// Current output.
    #[must_use]
    pub fn output(&self) -> String {
        self.lock().output().to_string()
    }

    /// Whether both handles alias the same result.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live holders of this result.
    #[must_use]
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn lock(&self) -> MutexGuard<'_, TaskResult> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lock().output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SteppingClock;

    #[test]
    fn fresh_result_is_not_executed() {
        let task = TaskResult::new();
        assert_eq!(task.output(), "not-executed");
        assert_eq!(TaskHandle::new().output(), "not-executed");
    }

    #[test]
    fn run_stamps_completion_time() {
        let clock = SteppingClock::fixed(0);
        let mut task = TaskResult::new();
        task.run(&clock);
        assert_eq!(task.output(), "done at 1970-01-01 00:00:00.000000");
    }

    #[test]
    fn repeated_runs_change_the_value() {
        let clock = SteppingClock::new(crate::clock::ClockSpec {
            base_millis: 0,
            step_millis: 1_000,
        });
        let handle = TaskHandle::new();
        handle.run(&clock);
        let first = handle.output();
        handle.run(&clock);
        assert_ne!(first, handle.output());
    }

    #[test]
    fn clones_alias_the_same_result() {
        let clock = SteppingClock::fixed(0);
        let a = TaskHandle::new();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.holders(), 2);
        b.run(&clock);
        assert_eq!(a.output(), b.output());
        assert_eq!(a.to_string(), "done at 1970-01-01 00:00:00.000000");
    }

    #[test]
    fn separate_handles_are_independent() {
        let clock = SteppingClock::fixed(0);
        let a = TaskHandle::new();
        let b = TaskHandle::new();
        assert!(!a.ptr_eq(&b));
        b.run(&clock);
        assert_eq!(a.output(), NOT_EXECUTED);
    }

    #[test]
    fn result_outlives_dropped_holders() {
        let clock = SteppingClock::fixed(0);
        let survivor = {
            let original = TaskHandle::new();
            let copy = original.clone();
            original.run(&clock);
            copy
        };
        assert_eq!(survivor.holders(), 1);
        assert_eq!(survivor.output(), "done at 1970-01-01 00:00:00.000000");
    }
}
