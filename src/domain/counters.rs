//! Engagement counters: compact display formatting and synthesis.
//!
//! Counts below 1 000 render as plain decimals, counts below 10 000 as a
//! one-decimal `K` figure, and everything above as a whole-number `K`
//! figure. Rounding is round-half-up over integer arithmetic so the output
//! is deterministic across platforms.

use std::sync::Mutex;

use rand::{Rng, SeedableRng, rngs::StdRng};

const COMMENTS_RANGE: std::ops::Range<u64> = 50..550;
const REPOSTS_RANGE: std::ops::Range<u64> = 200..2200;
const LIKES_RANGE: std::ops::Range<u64> = 500..8500;
const VIEWS_RANGE: std::ops::Range<u64> = 5000..95000;
const SHARES_RANGE: std::ops::Range<u64> = 30..530;

/// Five independent engagement figures sampled for one card.
///
/// No ordering relationship holds between the fields; each is drawn from its
/// own fixed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementCounters {
    pub comments: u64,
    pub reposts: u64,
    pub likes: u64,
    pub views: u64,
    pub shares: u64,
}

/// Format a count for card display.
pub fn format_count(n: u64) -> String {
    if n < 1000 {
        return n.to_string();
    }
    if n < 10_000 {
        let tenths = (n + 50) / 100;
        return format!("{}.{}K", tenths / 10, tenths % 10);
    }
    // Divide before rounding so counts near `u64::MAX` cannot overflow.
    let thousands = n / 1000 + u64::from(n % 1000 >= 500);
    format!("{thousands}K")
}

/// Source of engagement counters for a submission.
///
/// The pipeline depends on this capability rather than on inline randomness
/// so tests can supply deterministic sequences.
pub trait CounterSampler: Send + Sync {
    fn sample(&self) -> EngagementCounters;
}

/// Samples each counter independently from its fixed range.
pub struct RangeSampler {
    rng: Mutex<StdRng>,
}

impl RangeSampler {
    /// Sampler seeded from the operating system.
    pub fn from_os_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sampler for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl CounterSampler for RangeSampler {
    fn sample(&self) -> EngagementCounters {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| {
            // A panic while holding the lock cannot corrupt an StdRng.
            poisoned.into_inner()
        });
        EngagementCounters {
            comments: rng.random_range(COMMENTS_RANGE),
            reposts: rng.random_range(REPOSTS_RANGE),
            likes: rng.random_range(LIKES_RANGE),
            views: rng.random_range(VIEWS_RANGE),
            shares: rng.random_range(SHARES_RANGE),
        }
    }
}
