//! Capture configuration.

use std::time::Duration;
use zkfleet_core::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_RETRY_BACKOFF_MS, DEFAULT_STAGGER_DELAY_MS,
};

/// Tunables for the live-capture pipeline.
///
/// Defaults preserve the field-proven cadence: reconnect every cycle,
/// 3-second bounded connects, 2-second polls, fixed 5-second backoff.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use zkfleet_capture::CaptureConfig;
///
/// let config = CaptureConfig {
///     poll_interval: Duration::from_secs(5),
///     ..CaptureConfig::default()
/// };
/// assert_eq!(config.connect_timeout.as_secs(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Bound on each connect attempt.
    pub connect_timeout: Duration,

    /// Delay between successful poll cycles for one device.
    pub poll_interval: Duration,

    /// Fixed backoff after a failed connect; does not grow, retries
    /// indefinitely until the capture is stopped.
    pub retry_backoff: Duration,

    /// Delay between worker spawns when starting a whole fleet.
    pub stagger_delay: Duration,

    /// Open a fresh session every poll cycle (the default, matching
    /// deployed behavior and sidestepping stale device sessions). With
    /// `false`, the session is held across cycles and re-established
    /// after any error.
    pub reconnect_each_poll: bool,

    /// Capacity of the worker → sink event channel.
    pub event_channel_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            stagger_delay: Duration::from_millis(DEFAULT_STAGGER_DELAY_MS),
            reconnect_each_poll: true,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.retry_backoff, Duration::from_secs(5));
        assert!(config.reconnect_each_poll);
        assert!(config.event_channel_capacity > 0);
    }
}
