use std::time::Duration;

use taskboard_core::constants::DEFAULT_REQUEST_TIMEOUT_SECS;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Connection settings for [`crate::BoardClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, e.g. `http://localhost:5000/api`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Reads `TASKBOARD_API_URL`, `TASKBOARD_TOKEN` and
    /// `TASKBOARD_API_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timeout = lookup("TASKBOARD_API_TIMEOUT_SECS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        Self {
            base_url: lookup("TASKBOARD_API_URL")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.base_url),
            token: lookup("TASKBOARD_TOKEN").filter(|value| !value.trim().is_empty()),
            timeout,
        }
    }
}
