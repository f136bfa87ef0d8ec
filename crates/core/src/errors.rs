//! Error types for the task board core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{EntityKind, EntityRef};

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How a remote call failed, from the point of view of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service could not be reached or answered with a server error.
    /// Never retried automatically, to avoid duplicate writes.
    NetworkFailure,
    /// The service rejected the mutation.
    ValidationFailure,
    /// The service (or the local store) does not know the entity.
    NotFound,
    /// The credential was missing, expired or insufficient.
    Unauthorized,
}

/// A failed call to the backing service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind:?}: {message}")]
pub struct RemoteError {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NetworkFailure, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ValidationFailure, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Result type alias for calls through [`crate::api::BoardApi`].
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// A mutation or refetch that did not go through, as recorded in the store's
/// error slot for the calling view to render.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{operation} failed: {error}")]
pub struct MutationFailure {
    pub operation: String,
    pub target: Option<EntityRef>,
    pub error: RemoteError,
}

impl MutationFailure {
    pub fn new(operation: &str, target: Option<EntityRef>, error: RemoteError) -> Self {
        Self {
            operation: operation.to_string(),
            target,
            error,
        }
    }

    /// A mutation aimed at something the store does not hold.
    pub fn missing(operation: &str, target: EntityRef) -> Self {
        let message = format!("{:?} {} is not in the store", target.kind, target.id);
        Self::new(
            operation,
            Some(target),
            RemoteError::new(FailureKind::NotFound, message),
        )
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind
    }
}

/// Errors raised while decoding payloads or reconciling them into the store.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind:?} {id} is missing required field `{field}`")]
    IncompleteEntity {
        kind: EntityKind,
        id: String,
        field: &'static str,
    },

    #[error("Invalid payload for `{event}`: {message}")]
    InvalidPayload { event: String, message: String },

    #[error("Unknown event `{0}`")]
    UnknownEvent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Mutation(#[from] MutationFailure),
}

impl Error {
    pub fn invalid_payload(event: &str, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            event: event.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_failure_names_the_operation() {
        let failure = MutationFailure::new(
            "update_task",
            Some(EntityRef::task("t1")),
            RemoteError::validation("title must not be empty").with_status(422),
        );
        assert_eq!(failure.kind(), FailureKind::ValidationFailure);
        assert!(failure.to_string().starts_with("update_task failed"));
    }

    #[test]
    fn missing_entity_is_not_found() {
        let failure = MutationFailure::missing("move_task", EntityRef::task("ghost"));
        assert_eq!(failure.kind(), FailureKind::NotFound);
        assert_eq!(failure.error.status, None);
    }
}
