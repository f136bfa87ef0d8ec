use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patch::{explicit_null, impl_patch, require};
use crate::errors::Error;
use crate::store::EntityKind;

/// A board owns cards (columns) which own tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<BTreeSet<String>>,
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

impl_patch!(Board, BoardPatch {
    name => "name",
    description => "description",
    owner_id => "ownerId",
    members => "members",
    created_at => "createdAt",
    updated_at => "updatedAt",
});

impl BoardPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl TryFrom<BoardPatch> for Board {
    type Error = Error;

    fn try_from(patch: BoardPatch) -> Result<Self, Self::Error> {
        let name = require(patch.name, EntityKind::Board, &patch.id, "name")?;
        let owner_id = require(patch.owner_id, EntityKind::Board, &patch.id, "ownerId")?;
        Ok(Self {
            id: patch.id,
            name,
            description: patch.description.flatten(),
            owner_id,
            members: patch.members.unwrap_or_default(),
            created_at: patch.created_at.flatten(),
            updated_at: patch.updated_at.flatten(),
        })
    }
}
