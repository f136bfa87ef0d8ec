use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patch::{explicit_null, impl_patch, require};
use crate::errors::Error;
use crate::store::EntityKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Issue,
    Commit,
    Branch,
    PullRequest,
}

/// A GitHub item linked to a task.
///
/// `reference` is the issue/PR number, the commit sha or the branch name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub repository: String,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Attachment as submitted by the client, before the server assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDraft {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub repository: String,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub board_id: String,
    pub card_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub assigned_to: BTreeSet<String>,
    #[serde(default)]
    pub github_attachments: Vec<Attachment>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_attachments: Option<Vec<Attachment>>,
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

impl_patch!(Task, TaskPatch {
    board_id => "boardId",
    card_id => "cardId",
    title => "title",
    description => "description",
    priority => "priority",
    due_date => "dueDate",
    completed => "completed",
    assigned_to => "assignedTo",
    github_attachments => "githubAttachments",
    position => "position",
    created_at => "createdAt",
    updated_at => "updatedAt",
});

/// Fields that change where a task sits rather than what it says.
pub const TASK_STRUCTURAL_FIELDS: [&str; 3] = ["boardId", "cardId", "position"];

impl TaskPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl TryFrom<TaskPatch> for Task {
    type Error = Error;

    fn try_from(patch: TaskPatch) -> Result<Self, Self::Error> {
        let board_id = require(patch.board_id, EntityKind::Task, &patch.id, "boardId")?;
        let card_id = require(patch.card_id, EntityKind::Task, &patch.id, "cardId")?;
        let title = require(patch.title, EntityKind::Task, &patch.id, "title")?;
        let position = require(patch.position, EntityKind::Task, &patch.id, "position")?;
        Ok(Self {
            id: patch.id,
            board_id,
            card_id,
            title,
            description: patch.description.flatten(),
            priority: patch.priority.unwrap_or_default(),
            due_date: patch.due_date.flatten(),
            completed: patch.completed.unwrap_or(false),
            assigned_to: patch.assigned_to.unwrap_or_default(),
            github_attachments: patch.github_attachments.unwrap_or_default(),
            position,
            created_at: patch.created_at.flatten(),
            updated_at: patch.updated_at.flatten(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Mergeable, Patch};

    #[test]
    fn explicit_null_is_kept_apart_from_absent() {
        let patch: TaskPatch =
            serde_json::from_str(r#"{"id":"t1","dueDate":null}"#).expect("decode patch");
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.description, None);
        assert_eq!(patch.touched_fields(), vec!["dueDate"]);
    }

    #[test]
    fn priority_round_trips_in_lowercase() {
        let json = serde_json::to_string(&Priority::High).expect("encode");
        assert_eq!(json, "\"high\"");
        let parsed: Priority = serde_json::from_str("\"none\"").expect("decode");
        assert_eq!(parsed, Priority::None);
    }

    #[test]
    fn insert_requires_card_and_title() {
        let mut patch = TaskPatch::new("t1");
        patch.board_id = Some("b1".into());
        patch.position = Some(0);
        patch.title = Some("Write docs".into());
        let err = Task::try_from(patch).expect_err("missing cardId");
        assert!(err.to_string().contains("cardId"));
    }

    #[test]
    fn to_patch_then_merge_onto_anything_reproduces_the_task() {
        let task = Task {
            id: "t1".into(),
            board_id: "b1".into(),
            card_id: "c1".into(),
            title: "Fix bug".into(),
            description: Some("crash on save".into()),
            priority: Priority::High,
            due_date: None,
            completed: false,
            assigned_to: BTreeSet::from(["u1".to_string()]),
            github_attachments: Vec::new(),
            position: 2,
            created_at: None,
            updated_at: None,
        };
        let mut other = task.clone();
        other.title = "Something else".into();
        other.position = 9;
        assert_eq!(other.merge(&task.to_patch()), task);
    }
}
