//! Timeout tiers, retry policy and the failed-unit policy.
//!
//! Two clocks govern a generation:
//!
//! - The **total budget** scales with the full request length and bounds how
//!   long the caller waits for the whole generation.
//! - The **per-unit request timeout** is fixed, because every unit is bounded
//!   by the segmenter's maximum unit length.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed timeout for a single unit call.
pub const UNIT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `(max text length inclusive, budget seconds)`, ascending.
const TIMEOUT_TIERS: [(usize, u64); 6] = [
    (1_000, 60),
    (5_000, 180),
    (10_000, 300),
    (20_000, 600),
    (50_000, 900),
    (100_000, 1_200),
];

/// Budget for anything longer than the last tier.
const MAX_TIMEOUT_SECS: u64 = 1_800;

/// Total generation budget in seconds for a request of `text_length` characters.
pub fn timeout_secs_for(text_length: usize) -> u64 {
    TIMEOUT_TIERS
        .iter()
        .find(|(limit, _)| text_length <= *limit)
        .map_or(MAX_TIMEOUT_SECS, |(_, secs)| *secs)
}

/// Total generation budget for a request of `text_length` characters.
pub fn timeout_for(text_length: usize) -> Duration {
    Duration::from_secs(timeout_secs_for(text_length))
}

/// Application-level retry policy for a single unit.
///
/// Attempt `n` (1-based) that fails waits `base_delay * n` before attempt
/// `n + 1`. The last attempt reports its failure immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after a failed `attempt`, or `None` when no attempt is left.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.base_delay * attempt)
    }
}

/// What a session does when one of its units exhausts its retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// End the session with a terminal error at the failed index.
    #[default]
    Abort,
    /// Omit the failed unit's audio and keep going.
    Skip,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => f.write_str("abort"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown failure policy '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_tier_boundaries() {
        assert_eq!(timeout_for(0), Duration::from_secs(60));
        assert_eq!(timeout_for(999), Duration::from_secs(60));
        assert_eq!(timeout_for(1_000), Duration::from_secs(60));
        assert_eq!(timeout_for(1_001), Duration::from_secs(180));
        assert_eq!(timeout_for(5_000), Duration::from_secs(180));
        assert_eq!(timeout_for(5_001), Duration::from_secs(300));
        assert_eq!(timeout_for(10_001), Duration::from_secs(600));
        assert_eq!(timeout_for(20_001), Duration::from_secs(900));
        assert_eq!(timeout_for(50_001), Duration::from_secs(1_200));
        assert_eq!(timeout_for(100_000), Duration::from_secs(1_200));
        assert_eq!(timeout_for(100_001), Duration::from_secs(1_800));
    }

    #[test]
    fn default_retry_waits_grow_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn retry_policy_needs_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn failure_policy_parsing() {
        assert_eq!("abort".parse::<FailurePolicy>(), Ok(FailurePolicy::Abort));
        assert_eq!(" SKIP ".parse::<FailurePolicy>(), Ok(FailurePolicy::Skip));
        assert!("retry".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default(), FailurePolicy::Abort);
    }
}
