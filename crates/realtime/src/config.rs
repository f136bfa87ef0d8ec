use std::time::Duration;

use taskboard_core::constants::{
    DEFAULT_POLL_INTERVAL_SECS, MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY_MS,
    RECONNECT_MAX_DELAY_MS,
};

pub const DEFAULT_REALTIME_URL: &str = "http://localhost:5000";

/// Settings for [`crate::RealtimeChannel`] and the sessions built on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Event stream root, e.g. `http://localhost:5000`.
    pub url: String,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Failed reconnects tolerated before the channel reports unavailable.
    pub max_reconnect_attempts: u32,
    /// Full-refetch cadence while the channel is unavailable.
    pub poll_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            reconnect_base_delay: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            reconnect_max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Reads `TASKBOARD_REALTIME_URL`, `TASKBOARD_RECONNECT_ATTEMPTS` and
    /// `TASKBOARD_POLL_INTERVAL_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|value| value.trim().parse::<u64>().ok());

        Self {
            url: lookup("TASKBOARD_REALTIME_URL")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.url),
            max_reconnect_attempts: parse("TASKBOARD_RECONNECT_ATTEMPTS")
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(defaults.max_reconnect_attempts),
            poll_interval: parse("TASKBOARD_POLL_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let env = HashMap::from([
            ("TASKBOARD_REALTIME_URL", "https://rt.example.com"),
            ("TASKBOARD_RECONNECT_ATTEMPTS", "3"),
            ("TASKBOARD_POLL_INTERVAL_SECS", "10"),
        ]);
        let config = ChannelConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.url, "https://rt.example.com");
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(
            config.reconnect_base_delay,
            Duration::from_millis(RECONNECT_BASE_DELAY_MS)
        );
    }

    #[test]
    fn zero_poll_interval_is_ignored() {
        let config = ChannelConfig::from_lookup(|key| {
            (key == "TASKBOARD_POLL_INTERVAL_SECS").then(|| "0".to_string())
        });
        assert_eq!(config, ChannelConfig::default());
    }
}
