//! Client-side state for a collaborative task board.
//!
//! The [`store::EntityStore`] holds boards, cards, tasks, invitations and
//! notifications. Local edits go through the
//! [`coordinator::MutationCoordinator`], which writes optimistically and then
//! reconciles the service's answer. Push events are decoded by [`sync`] and
//! folded in through [`reconcile`].

pub mod api;
pub mod bus;
pub mod constants;
pub mod coordinator;
pub mod errors;
pub mod models;
pub mod positions;
pub mod reconcile;
pub mod store;
pub mod sync;

pub use errors::{Error, FailureKind, MutationFailure, RemoteError, RemoteResult, Result};
