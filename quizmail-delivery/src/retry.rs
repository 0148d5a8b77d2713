//! Retry policy for failed delivery attempts.

use chrono::{DateTime, Duration, Utc};
use rand::Rng as _;
use serde::{Deserialize, Serialize};

/// Encapsulates the attempt cap and backoff curve so the processing loop
/// never reasons about delays directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum delivery attempts before an item is terminally failed.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for the quadratic backoff (in seconds).
    ///
    /// The delay after attempt `n` is `n² × base`.
    ///
    /// Default: 300 seconds (5 minutes)
    #[serde(default = "defaults::base_delay_secs")]
    pub base_delay_secs: u64,

    /// Cap on the computed delay (in seconds).
    ///
    /// Default: 3600 seconds (1 hour)
    #[serde(default = "defaults::max_delay_secs")]
    pub max_delay_secs: u64,

    /// Jitter factor randomizing delays within ±`jitter_factor` to keep
    /// retries from clustering.
    ///
    /// Default: 0.1 (±10%)
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_secs: defaults::base_delay_secs(),
            max_delay_secs: defaults::max_delay_secs(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempts` tries.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// When the next attempt may run, given that `attempts` tries have
    /// already been made.
    #[must_use]
    pub fn next_attempt_at(&self, attempts: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let quadratic = u64::from(attempts).saturating_mul(u64::from(attempts));
        let delay_secs = quadratic
            .saturating_mul(self.base_delay_secs)
            .min(self.max_delay_secs);

        let jittered = if self.jitter_factor > 0.0 && delay_secs > 0 {
            let spread = self.jitter_factor.min(1.0);
            let factor = rand::rng().random_range(1.0 - spread..=1.0 + spread);
            // delays are bounded by max_delay_secs, well inside f64 range
            (delay_secs as f64 * factor) as i64
        } else {
            i64::try_from(delay_secs).unwrap_or(i64::MAX)
        };

        now + Duration::seconds(jittered.max(0))
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_secs() -> u64 {
        300
    }

    pub const fn max_delay_secs() -> u64 {
        3600
    }

    pub const fn jitter_factor() -> f64 {
        0.1
    }
}
