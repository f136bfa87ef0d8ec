//! Channel event taxonomy plus the retry and backoff helpers shared by the
//! REST client and the real-time channel.

mod events;
mod retry;

pub use events::*;
pub use retry::*;
