//! Error types for the real-time channel.

use thiserror::Error;

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors raised by the channel and its transports.
///
/// Running out of reconnect attempts is not an error; it is reported as
/// [`crate::ChannelStatus::Unavailable`].
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The transport could not open or keep a connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connection went away while sending
    #[error("Connection closed")]
    Closed,

    /// A frame could not be decoded
    #[error("Undecodable frame: {0}")]
    Decode(String),

    /// No session is running
    #[error("Channel is not connected")]
    NotConnected,
}

impl ChannelError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
