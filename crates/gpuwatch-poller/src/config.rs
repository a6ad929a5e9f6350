use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-cycle polling limits. Owned by the caller and passed in; the aggregator
/// keeps no state between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Upper bound for one server (both requests). Also bounds a whole cycle,
    /// since servers are polled concurrently.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT.min(timeout),
        }
    }

    /// Connect timeout never exceeds the overall timeout.
    pub fn effective_connect_timeout(&self) -> Duration {
        self.connect_timeout.min(self.timeout)
    }
}
