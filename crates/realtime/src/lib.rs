//! Real-time side of the task board client.
//!
//! [`RealtimeChannel`] keeps one supervised connection to the service and
//! fans frames out to subscribers. [`BoardSession`] ties a channel to a
//! [`taskboard_core::coordinator::MutationCoordinator`] for one open board.

mod channel;
mod config;
mod error;
mod session;
pub mod transport;

pub use channel::{ChannelStatus, RealtimeChannel};
pub use config::{ChannelConfig, DEFAULT_REALTIME_URL};
pub use error::{ChannelError, Result};
pub use session::BoardSession;
pub use transport::{ChannelTransport, EventStreamTransport, Frame, MemoryTransport};
