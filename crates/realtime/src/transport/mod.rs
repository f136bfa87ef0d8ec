//! Transports carry [`Frame`]s between the channel and the service.
//!
//! A transport opens a [`Link`]: an inbound frame stream plus an outbound
//! sink. The stream ending means the connection is gone.

mod event_stream;
mod memory;

pub use event_stream::{EventStreamTransport, SseDecoder};
pub use memory::MemoryTransport;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Room control event names.
pub const JOIN_BOARD: &str = "join_board";
pub const LEAVE_BOARD: &str = "leave_board";

/// One named message on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    pub fn join(board_id: &str) -> Self {
        Self::new(JOIN_BOARD, Value::String(board_id.to_string()))
    }

    pub fn leave(board_id: &str) -> Self {
        Self::new(LEAVE_BOARD, Value::String(board_id.to_string()))
    }

    /// The board id of a room control frame.
    pub fn room(&self) -> Option<&str> {
        match self.event.as_str() {
            JOIN_BOARD | LEAVE_BOARD => self.payload.as_str(),
            _ => None,
        }
    }
}

/// Outbound half of a connection.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, frame: Frame) -> Result<()>;
}

/// An open connection.
pub struct Link {
    pub inbound: BoxStream<'static, Frame>,
    pub outbound: Box<dyn FrameSink>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Opens one authenticated connection.
    async fn open(&self, credential: &str) -> Result<Link>;
}
