//! Reconnection timing for job channels.
//!
//! By default the channel waits a fixed 3 seconds between attempts and
//! retries forever. Setting [`ReconnectConfig::multiplier`] above `1.0`
//! turns this into exponential backoff capped at
//! [`ReconnectConfig::max_delay`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Delay before each reconnection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Tunable parameters for the reconnect delay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt after a loss.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failed attempt.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectConfig {
    /// A constant delay with no growth.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }
}

/// Calculate the next delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`] and never
/// drops below the current delay.
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier.max(1.0)) as u64;
    Duration::from_millis(next_ms).min(config.max_delay.max(current))
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `true` when the full delay elapsed and a retry should follow.
pub async fn wait_before_retry(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
