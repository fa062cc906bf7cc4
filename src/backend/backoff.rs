//! Transport-level backoff policy.
//!
//! [`BackoffConfig`] controls how transient provider errors (overload,
//! internal errors, timeouts, interrupted streams) are retried with
//! increasing delays. The retry loop itself lives in [`crate::retry`].

use serde::Deserialize;
use std::time::Duration;

/// Configuration for transport-level retry with exponential backoff.
///
/// The delay before retry `n` (0-indexed) is
/// `initial_delay * multiplier^n`, capped at `max_delay`, then jittered.
/// With the defaults this is the plain doubling sequence 1s, 2s, 4s.
///
/// Deserializes from host configuration with durations in milliseconds:
///
/// ```
/// use script_pipeline::backend::BackoffConfig;
///
/// let cfg: BackoffConfig = serde_json::from_str(
///     r#"{"max_retries": 2, "initial_delay_ms": 250}"#,
/// ).unwrap();
/// assert_eq!(cfg.max_retries, 2);
/// assert_eq!(cfg.initial_delay.as_millis(), 250);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Maximum number of retries after the first attempt. Default: 3.
    pub max_retries: u32,

    /// Delay before the first retry. Default: 1 second.
    #[serde(rename = "initial_delay_ms", with = "millis")]
    pub initial_delay: Duration,

    /// Multiplier applied to the delay after each retry. Default: 2.0.
    pub multiplier: f64,

    /// Upper bound for a single delay. Default: 60 seconds.
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,

    /// Jitter strategy. Default: [`JitterStrategy::None`].
    pub jitter: JitterStrategy,

    /// HTTP status codes treated as transient.
    /// Default: `[408, 429, 500, 502, 503, 504]`.
    pub retryable_statuses: Vec<u16>,

    /// Whether a provider `Retry-After` header replaces the computed delay.
    /// Default: `true`.
    pub respect_retry_after: bool,
}

/// Jitter strategy to spread retries from many clients sharing a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterStrategy {
    /// No jitter. Delay is exactly the calculated value.
    None,

    /// Full jitter: random value in `[0, calculated_delay]`.
    Full,

    /// Equal jitter: `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
}

impl BackoffConfig {
    /// No transport retry: every failure surfaces after one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// 3 retries, 1s initial delay, doubling, 60s cap, no jitter.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: JitterStrategy::None,
            retryable_statuses: vec![408, 429, 500, 502, 503, 504],
            respect_retry_after: true,
        }
    }

    /// Conservative retry for interactive use (user is waiting):
    /// 2 retries, 500ms initial, 10s max.
    pub fn interactive() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            ..Self::standard()
        }
    }

    /// Aggressive retry for long unattended series runs:
    /// 5 retries, 2s initial, 2 minute cap, full jitter.
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            jitter: JitterStrategy::Full,
            ..Self::standard()
        }
    }

    /// Override the retry budget and initial delay, keeping the rest.
    pub fn with_retries(mut self, max_retries: u32, initial_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_delay = initial_delay;
        self
    }

    /// Calculate the delay for retry N (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64()).max(0.0);

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };

        Duration::from_secs_f64(jittered)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl Default for JitterStrategy {
    fn default() -> Self {
        JitterStrategy::None
    }
}

/// Serde adapter for `Duration` fields expressed as integer milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
