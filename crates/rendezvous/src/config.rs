//! Instance configuration.

use std::time::Duration;

/// Pause after a peer dials the bootstrap.
///
/// Gives the overlay's routing tables time to absorb the new connection. It is
/// a tolerance, not a guarantee: nothing checks that convergence happened.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on how long teardown may take before it is reported as timed out.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one instance run.
///
/// Waits are unbounded unless a deadline is set. An unbounded run is expected
/// to be cut short by an external watchdog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Pause after dialing the bootstrap.
    pub settle_delay: Duration,
    /// Deadline for each barrier wait.
    pub barrier_timeout: Option<Duration>,
    /// Deadline for the bootstrap announcement to arrive.
    pub subscribe_timeout: Option<Duration>,
    /// Deadline for stopping the endpoint.
    pub stop_timeout: Duration,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            barrier_timeout: None,
            subscribe_timeout: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl InstanceConfig {
    /// Set the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Bound every barrier wait.
    pub fn with_barrier_timeout(mut self, timeout: Duration) -> Self {
        self.barrier_timeout = Some(timeout);
        self
    }

    /// Bound the wait for the bootstrap announcement.
    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = Some(timeout);
        self
    }

    /// Set the stop timeout.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_waits_unbounded() {
        let config = InstanceConfig::default();
        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert_eq!(config.stop_timeout, Duration::from_secs(10));
        assert!(config.barrier_timeout.is_none());
        assert!(config.subscribe_timeout.is_none());
    }

    #[test]
    fn test_builders() {
        let config = InstanceConfig::default()
            .with_settle_delay(Duration::ZERO)
            .with_barrier_timeout(Duration::from_secs(1))
            .with_subscribe_timeout(Duration::from_secs(2))
            .with_stop_timeout(Duration::from_millis(5));

        assert_eq!(config.settle_delay, Duration::ZERO);
        assert_eq!(config.barrier_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.subscribe_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.stop_timeout, Duration::from_millis(5));
    }
}
