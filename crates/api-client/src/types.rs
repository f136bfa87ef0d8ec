//! Wire shapes used only by the REST client.

use serde::{Deserialize, Serialize};
use taskboard_core::api::CardPosition;
use taskboard_core::models::InvitationStatus;

/// Error body returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(alias = "error")]
    pub message: String,
}

impl ApiErrorResponse {
    pub fn describe(&self) -> String {
        match &self.code {
            Some(code) => format!("{}: {}", code, self.message),
            None => self.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderCardsRequest<'a> {
    pub card_positions: &'a [CardPosition],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondToInvitationRequest<'a> {
    pub invitation_id: &'a str,
    pub status: InvitationStatus,
}
