//! Failure classification and backoff shared by the REST client and the
//! real-time channel.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::FailureKind;

/// Retry policy classification for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> RetryClass {
    match status {
        401 | 403 => RetryClass::ReauthRequired,
        408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
        500..=599 => RetryClass::Retryable,
        _ => RetryClass::Permanent,
    }
}

/// How a failed HTTP status surfaces to the store.
pub fn failure_kind_for_status(status: u16) -> FailureKind {
    match status {
        401 | 403 => FailureKind::Unauthorized,
        404 | 410 => FailureKind::NotFound,
        408 | 429 | 500..=599 => FailureKind::NetworkFailure,
        _ => FailureKind::ValidationFailure,
    }
}

/// Exponential backoff with full cap, no jitter. `attempt` starts at 0.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    const MAX_EXPONENT: u32 = 16;

    let factor = 2_u32.saturating_pow(attempt.min(MAX_EXPONENT));
    base.saturating_mul(factor).min(max)
}

/// [`backoff_delay`] plus up to 25% random jitter, still capped at `max`.
pub fn backoff_with_jitter(attempt: u32, base: Duration, max: Duration) -> Duration {
    let delay = backoff_delay(attempt, base, max);
    let jitter_ceiling = (delay.as_millis() as u64 / 4).max(1);
    let jitter = rand::thread_rng().gen_range(0..jitter_ceiling);
    (delay + Duration::from_millis(jitter)).min(max)
}
