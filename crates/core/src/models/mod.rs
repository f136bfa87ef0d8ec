//! Board, card, task, invitation and notification records plus their patches.

mod board;
mod card;
mod invitation;
mod notification;
mod patch;
mod task;

pub use board::*;
pub use card::*;
pub use invitation::*;
pub use notification::*;
pub use patch::{Mergeable, Patch};
pub use task::*;
