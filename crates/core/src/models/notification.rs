use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patch::{explicit_null, impl_patch, require};
use crate::errors::Error;
use crate::store::EntityKind;

/// A user-facing notification. The payload shape depends on `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPatch {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Option<DateTime<Utc>>>,
}

impl_patch!(Notification, NotificationPatch {
    kind => "type",
    read => "read",
    payload => "payload",
    created_at => "createdAt",
});

impl NotificationPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl TryFrom<NotificationPatch> for Notification {
    type Error = Error;

    fn try_from(patch: NotificationPatch) -> Result<Self, Self::Error> {
        let kind = require(patch.kind, EntityKind::Notification, &patch.id, "type")?;
        Ok(Self {
            id: patch.id,
            kind,
            read: patch.read.unwrap_or(false),
            payload: patch.payload.unwrap_or(serde_json::Value::Null),
            created_at: patch.created_at.flatten(),
        })
    }
}
