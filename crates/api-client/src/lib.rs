//! REST client for the task board service.
//!
//! [`BoardClient`] implements [`taskboard_core::api::BoardApi`] over HTTP so
//! the mutation coordinator can drive a real server.

mod client;
mod config;
mod error;
mod types;

pub use client::BoardClient;
pub use config::{ClientConfig, DEFAULT_API_URL};
pub use error::{ApiError, Result};
pub use types::ApiErrorResponse;
