//! Reconnection backoff.

use std::time::Duration;

/// Delay schedule for automatic reconnection.
///
/// Attempt 0 retries immediately, attempt 1 waits 15 s, attempt 2 waits
/// 30 s and every later attempt waits 60 s, until `max_attempts` failures
/// have accumulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy { max_attempts: 100 }
    }
}

impl ReconnectPolicy {
    /// Never reconnect automatically.
    pub const fn disabled() -> Self {
        ReconnectPolicy { max_attempts: 0 }
    }

    /// Delay before attempt number `attempt`, or `None` once the budget is spent.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let secs = match attempt {
            0 => 0,
            1 => 15,
            2 => 30,
            _ => 60,
        };
        Some(Duration::from_secs(secs))
    }
}
