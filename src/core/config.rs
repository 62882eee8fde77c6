/*!
 * Wait Configuration
 * Tunable parameters for blocking pipe I/O
 */

use super::limits::{MAX_BLOCKING_WAIT, WAIT_POLL_INTERVAL};
use std::time::Duration;

/// Configuration for blocking read/write waits
///
/// Carried by the manager and handed to each pipe it creates. The poll
/// interval bounds how often listeners are re-notified while a caller is
/// blocked; `max_wait` bounds waits requested with no timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Length of one bounded wait slice
    pub poll_interval: Duration,
    /// Ceiling applied when the caller passes no timeout
    pub max_wait: Duration,
}

impl WaitConfig {
    /// Configuration for tests: short slices, short ceiling
    pub fn fast() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(2),
        }
    }

    /// Resolve a caller-supplied timeout against the ceiling
    pub fn effective_timeout(&self, timeout: Option<Duration>) -> Duration {
        match timeout {
            Some(t) => t.min(self.max_wait),
            None => self.max_wait,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: WAIT_POLL_INTERVAL,
            max_wait: MAX_BLOCKING_WAIT,
        }
    }
}
