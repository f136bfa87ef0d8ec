//! The remote mutation surface the coordinator talks to.
//!
//! Responses are returned as patches: the service may omit fields, and the
//! coordinator folds whatever it gets through reconciliation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::RemoteResult;
use crate::models::{
    Attachment, AttachmentDraft, BoardPatch, CardPatch, InvitationPatch, InvitationStatus,
    NotificationPatch, Priority, TaskPatch,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoard {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCard {
    pub board_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    #[serde(skip)]
    pub board_id: String,
    #[serde(skip)]
    pub card_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub assigned_to: BTreeSet<String>,
}

/// A task update. `card_id` addresses the task where it currently lives;
/// `target_card_id` moves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[serde(skip)]
    pub board_id: String,
    #[serde(skip)]
    pub card_id: String,
    #[serde(flatten)]
    pub changes: TaskPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_card_id: Option<String>,
}

impl UpdateTask {
    pub fn task_id(&self) -> &str {
        &self.changes.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPosition {
    pub card_id: String,
    pub position: i64,
}

/// Where a task lives, for calls addressed by path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskLocation {
    pub board_id: String,
    pub card_id: String,
    pub task_id: String,
}

impl TaskLocation {
    pub fn new(
        board_id: impl Into<String>,
        card_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            board_id: board_id.into(),
            card_id: card_id.into(),
            task_id: task_id.into(),
        }
    }
}

/// Remote operations on boards, cards, tasks, invitations and notifications.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn list_boards(&self) -> RemoteResult<Vec<BoardPatch>>;
    async fn get_board(&self, board_id: &str) -> RemoteResult<BoardPatch>;
    async fn create_board(&self, request: &CreateBoard) -> RemoteResult<BoardPatch>;
    async fn update_board(&self, board_id: &str, changes: &BoardPatch)
        -> RemoteResult<BoardPatch>;
    async fn delete_board(&self, board_id: &str) -> RemoteResult<()>;

    async fn list_cards(&self, board_id: &str) -> RemoteResult<Vec<CardPatch>>;
    async fn create_card(&self, request: &CreateCard) -> RemoteResult<CardPatch>;
    async fn update_card(
        &self,
        board_id: &str,
        card_id: &str,
        changes: &CardPatch,
    ) -> RemoteResult<CardPatch>;
    async fn delete_card(&self, board_id: &str, card_id: &str) -> RemoteResult<()>;
    async fn reorder_cards(&self, board_id: &str, positions: &[CardPosition]) -> RemoteResult<()>;

    async fn list_tasks(&self, board_id: &str, card_id: &str) -> RemoteResult<Vec<TaskPatch>>;
    async fn create_task(&self, request: &CreateTask) -> RemoteResult<TaskPatch>;
    async fn update_task(&self, request: &UpdateTask) -> RemoteResult<TaskPatch>;
    async fn delete_task(&self, task: &TaskLocation) -> RemoteResult<()>;

    async fn attach_github_item(
        &self,
        task: &TaskLocation,
        draft: &AttachmentDraft,
    ) -> RemoteResult<Attachment>;
    async fn remove_github_attachment(
        &self,
        task: &TaskLocation,
        attachment_id: &str,
    ) -> RemoteResult<()>;

    async fn pending_invitations(&self) -> RemoteResult<Vec<InvitationPatch>>;
    async fn respond_to_invitation(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> RemoteResult<InvitationPatch>;

    async fn list_notifications(&self) -> RemoteResult<Vec<NotificationPatch>>;
    async fn mark_notification_read(&self, notification_id: &str)
        -> RemoteResult<NotificationPatch>;
    async fn delete_notification(&self, notification_id: &str) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_task_body_flattens_changes_and_hides_path_ids() {
        let mut changes = TaskPatch::new("t1");
        changes.position = Some(0);
        changes.due_date = Some(None);
        let request = UpdateTask {
            board_id: "b1".into(),
            card_id: "c1".into(),
            changes,
            target_card_id: Some("c2".into()),
        };

        let body = serde_json::to_value(&request).expect("encode");
        assert_eq!(
            body,
            serde_json::json!({"id": "t1", "dueDate": null, "position": 0, "targetCardId": "c2"})
        );
    }

    #[test]
    fn create_task_omits_empty_assignees() {
        let request = CreateTask {
            board_id: "b1".into(),
            card_id: "c1".into(),
            title: "Ship it".into(),
            description: None,
            priority: Some(Priority::Low),
            due_date: None,
            assigned_to: BTreeSet::new(),
        };
        let body = serde_json::to_value(&request).expect("encode");
        assert_eq!(body, serde_json::json!({"title": "Ship it", "priority": "low"}));
    }
}
