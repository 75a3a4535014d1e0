//! Uniform integer sources consumed by random state mutation.
//!
//! Every mutation that needs randomness takes a `&mut dyn Entropy` so callers
//! can substitute a seeded source in tests and replays.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A uniform integer generator.
pub trait Entropy {
    /// Draw a value uniformly from the inclusive range `[lo, hi]`.
    ///
    /// Implementations return `lo` when `hi < lo`.
    fn next_in(&mut self, lo: i64, hi: i64) -> i64;
}

/// OS-seeded generator used by long-running hosts.
#[derive(Debug, Clone)]
pub struct SystemEntropy {
    rng: StdRng,
}

impl SystemEntropy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for SystemEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl Entropy for SystemEntropy {
    fn next_in(&mut self, lo: i64, hi: i64) -> i64 {
        if hi < lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }
}

/// `StdRng` seeded from a fixed value, behind `--seed`.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    rng: StdRng,
}

impl SeededEntropy {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Entropy for SeededEntropy {
    fn next_in(&mut self, lo: i64, hi: i64) -> i64 {
        if hi < lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }
}

/// Tiny deterministic RNG.
///
/// Reproducible across platforms and `rand` releases, which `StdRng` does not
/// promise. The `demo` command and golden tests rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Create a new deterministic RNG from a seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Next pseudo-random `u64`.
    #[must_use]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // drop the weak low bits
        self.state >> 11
    }

    /// Next value in `[0, upper_exclusive)`.
    #[must_use]
    pub fn next_bounded(&mut self, upper_exclusive: u64) -> u64 {
        if upper_exclusive == 0 {
            return 0;
        }
        self.next_u64() % upper_exclusive
    }
}

impl Entropy for DeterministicRng {
    fn next_in(&mut self, lo: i64, hi: i64) -> i64 {
        if hi < lo {
            return lo;
        }
        let span = hi.abs_diff(lo).saturating_add(1);
        let offset = self.next_bounded(span);
        lo.saturating_add_unsigned(offset)
    }
}
