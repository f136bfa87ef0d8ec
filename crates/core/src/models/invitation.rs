use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patch::{explicit_null, impl_patch, require};
use crate::errors::Error;
use crate::store::EntityKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

/// An invitation to join a board. Kept apart from board membership until
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub board_id: String,
    pub invitee_email: String,
    #[serde(default)]
    pub invited_by: Option<String>,
    #[serde(default)]
    pub status: InvitationStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default, alias = "email", skip_serializing_if = "Option::is_none")]
    pub invitee_email: Option<String>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub invited_by: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<InvitationStatus>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<Option<DateTime<Utc>>>,
}

impl_patch!(Invitation, InvitationPatch {
    board_id => "boardId",
    invitee_email => "inviteeEmail",
    invited_by => "invitedBy",
    status => "status",
    created_at => "createdAt",
    updated_at => "updatedAt",
});

impl InvitationPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl TryFrom<InvitationPatch> for Invitation {
    type Error = Error;

    fn try_from(patch: InvitationPatch) -> Result<Self, Self::Error> {
        let board_id = require(patch.board_id, EntityKind::Invitation, &patch.id, "boardId")?;
        let invitee_email = require(
            patch.invitee_email,
            EntityKind::Invitation,
            &patch.id,
            "inviteeEmail",
        )?;
        Ok(Self {
            id: patch.id,
            board_id,
            invitee_email,
            invited_by: patch.invited_by.flatten(),
            status: patch.status.unwrap_or_default(),
            created_at: patch.created_at.flatten(),
            updated_at: patch.updated_at.flatten(),
        })
    }
}
