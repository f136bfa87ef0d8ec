use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patch::{explicit_null, impl_patch, require};
use crate::errors::Error;
use crate::store::EntityKind;

/// A list/column on a board. `position` orders cards within the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub board_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
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

impl_patch!(Card, CardPatch {
    board_id => "boardId",
    name => "name",
    description => "description",
    position => "position",
    created_at => "createdAt",
    updated_at => "updatedAt",
});

impl CardPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl TryFrom<CardPatch> for Card {
    type Error = Error;

    fn try_from(patch: CardPatch) -> Result<Self, Self::Error> {
        let board_id = require(patch.board_id, EntityKind::Card, &patch.id, "boardId")?;
        let name = require(patch.name, EntityKind::Card, &patch.id, "name")?;
        let position = require(patch.position, EntityKind::Card, &patch.id, "position")?;
        Ok(Self {
            id: patch.id,
            board_id,
            name,
            description: patch.description.flatten(),
            position,
            created_at: patch.created_at.flatten(),
            updated_at: patch.updated_at.flatten(),
        })
    }
}
