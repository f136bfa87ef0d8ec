//! Failures of a single REST call, and how each one is reported to the
//! coordinator.

use taskboard_core::errors::{FailureKind, RemoteError};
use taskboard_core::sync::{classify_http_status, failure_kind_for_status, RetryClass};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got an answer (connect, TLS, timeout, broken body).
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The answer arrived but did not have the expected shape.
    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Caught before sending.
    #[error("bad input: {0}")]
    BadInput(String),

    /// The configured token cannot be sent.
    #[error("unusable credential: {0}")]
    Credential(String),
}

impl ApiError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput(message.into())
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential(message.into())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Whether repeating the same call could help.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Rejected { status, .. } => classify_http_status(*status),
            Self::Transport(_) => RetryClass::Retryable,
            Self::Decode(_) | Self::BadInput(_) => RetryClass::Permanent,
            Self::Credential(_) => RetryClass::ReauthRequired,
        }
    }

    /// How this failure surfaces in the store.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Rejected { status, .. } => failure_kind_for_status(*status),
            // The write may or may not have landed.
            Self::Transport(_) | Self::Decode(_) => FailureKind::NetworkFailure,
            Self::BadInput(_) => FailureKind::ValidationFailure,
            Self::Credential(_) => FailureKind::Unauthorized,
        }
    }
}

impl From<ApiError> for RemoteError {
    fn from(err: ApiError) -> Self {
        let remote = RemoteError::new(err.failure_kind(), err.to_string());
        match err.status_code() {
            Some(status) => remote.with_status(status),
            None => remote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_class_for_auth_error_is_reauth() {
        let err = ApiError::rejected(401, "unauthorized");
        assert_eq!(err.retry_class(), RetryClass::ReauthRequired);
        assert_eq!(err.failure_kind(), FailureKind::Unauthorized);
    }

    #[test]
    fn remote_error_keeps_status_and_kind() {
        let remote = RemoteError::from(ApiError::rejected(422, "title is required"));
        assert_eq!(remote.kind, FailureKind::ValidationFailure);
        assert_eq!(remote.status, Some(422));
        assert!(remote.message.contains("title is required"));

        let remote = RemoteError::from(ApiError::rejected(404, "no such task"));
        assert_eq!(remote.kind, FailureKind::NotFound);
    }

    #[test]
    fn server_errors_are_retryable_network_failures() {
        let err = ApiError::rejected(503, "unavailable");
        assert_eq!(err.retry_class(), RetryClass::Retryable);
        assert_eq!(err.failure_kind(), FailureKind::NetworkFailure);
    }
}
