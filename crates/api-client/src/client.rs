//! REST client for the task board service.
//!
//! Every call carries the configured bearer token. Responses are decoded as
//! patches; list and single-entity responses are accepted both bare and
//! wrapped in an envelope such as `{"boards": [...]}` or `{"card": {...}}`.

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;

use taskboard_core::api::{
    BoardApi, CardPosition, CreateBoard, CreateCard, CreateTask, TaskLocation, UpdateTask,
};
use taskboard_core::errors::RemoteResult;
use taskboard_core::models::{
    Attachment, AttachmentDraft, BoardPatch, CardPatch, InvitationPatch, InvitationStatus,
    NotificationPatch, TaskPatch,
};

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::types::{ApiErrorResponse, ReorderCardsRequest, RespondToInvitationRequest};

const MAX_LOG_BODY_CHARS: usize = 512;

/// Takes the value under `key` if the body is an envelope, else the body.
fn unwrap_envelope(body: Value, key: &str) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    }
}

/// Fills in `id` when the service answers with a partial entity (or nothing).
fn with_id(value: Value, id: &str) -> Value {
    match value {
        Value::Object(mut map) => {
            map.entry("id").or_insert_with(|| Value::String(id.to_string()));
            Value::Object(map)
        }
        _ => serde_json::json!({ "id": id }),
    }
}

/// Client for the task board REST API.
#[derive(Debug, Clone)]
pub struct BoardClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BoardClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    /// Builds a client from `TASKBOARD_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins path segments onto the base URL, percent-encoding each.
    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    fn task_url(&self, task: &TaskLocation, rest: &[&str]) -> String {
        let mut segments = vec![
            "boards",
            task.board_id.as_str(),
            "cards",
            task.card_id.as_str(),
            "tasks",
            task.task_id.as_str(),
        ];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::credential("token is not a valid header value"))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(headers)
    }

    /// Sends a request and returns the raw body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.headers(self.headers()?).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(ApiError::rejected(status.as_u16(), error.describe()));
            }
            return Err(ApiError::rejected(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }
        Ok(body)
    }

    /// Sends a request and returns the value under `envelope` (or the bare
    /// body). An empty body reads as `null`.
    async fn fetch_value(&self, request: RequestBuilder, envelope: &str) -> Result<Value> {
        let body = self.send(request).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response. Body: {}, Error: {}", body, e);
            ApiError::Decode(e)
        })?;
        Ok(unwrap_envelope(value, envelope))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, envelope: &str) -> Result<T> {
        let value = self.fetch_value(request, envelope).await?;
        Self::decode(value, envelope)
    }

    fn decode<T: DeserializeOwned>(value: Value, envelope: &str) -> Result<T> {
        serde_json::from_value(value).map_err(|e| {
            error!("Failed to deserialize `{}` from response: {}", envelope, e);
            ApiError::Decode(e)
        })
    }

    /// Sends a request whose response body carries nothing we need.
    async fn execute(&self, request: RequestBuilder) -> Result<()> {
        self.send(request).await.map(|_| ())
    }

    // Boards

    /// GET /boards
    pub async fn list_boards(&self) -> Result<Vec<BoardPatch>> {
        let url = self.url(&["boards"]);
        debug!("Listing boards: {}", url);
        self.fetch(self.client.get(&url), "boards").await
    }

    /// GET /boards/{id}
    pub async fn get_board(&self, board_id: &str) -> Result<BoardPatch> {
        let url = self.url(&["boards", board_id]);
        self.fetch(self.client.get(&url), "board").await
    }

    /// POST /boards
    pub async fn create_board(&self, request: &CreateBoard) -> Result<BoardPatch> {
        let url = self.url(&["boards"]);
        self.fetch(self.client.post(&url).json(request), "board").await
    }

    /// PUT /boards/{id}
    pub async fn update_board(&self, board_id: &str, changes: &BoardPatch) -> Result<BoardPatch> {
        let url = self.url(&["boards", board_id]);
        self.fetch(self.client.put(&url).json(changes), "board").await
    }

    /// DELETE /boards/{id}
    pub async fn delete_board(&self, board_id: &str) -> Result<()> {
        let url = self.url(&["boards", board_id]);
        self.execute(self.client.delete(&url)).await
    }

    // Cards

    /// GET /boards/{boardId}/cards
    pub async fn list_cards(&self, board_id: &str) -> Result<Vec<CardPatch>> {
        let url = self.url(&["boards", board_id, "cards"]);
        self.fetch(self.client.get(&url), "cards").await
    }

    /// POST /boards/{boardId}/cards
    pub async fn create_card(&self, request: &CreateCard) -> Result<CardPatch> {
        let url = self.url(&["boards", &request.board_id, "cards"]);
        self.fetch(self.client.post(&url).json(request), "card").await
    }

    /// PUT /boards/{boardId}/cards/{cardId}
    pub async fn update_card(
        &self,
        board_id: &str,
        card_id: &str,
        changes: &CardPatch,
    ) -> Result<CardPatch> {
        let url = self.url(&["boards", board_id, "cards", card_id]);
        self.fetch(self.client.put(&url).json(changes), "card").await
    }

    /// DELETE /boards/{boardId}/cards/{cardId}
    pub async fn delete_card(&self, board_id: &str, card_id: &str) -> Result<()> {
        let url = self.url(&["boards", board_id, "cards", card_id]);
        self.execute(self.client.delete(&url)).await
    }

    /// PATCH /boards/{boardId}/cards/reorder
    pub async fn reorder_cards(&self, board_id: &str, positions: &[CardPosition]) -> Result<()> {
        let url = self.url(&["boards", board_id, "cards", "reorder"]);
        let body = ReorderCardsRequest {
            card_positions: positions,
        };
        self.execute(self.client.patch(&url).json(&body)).await
    }

    // Tasks

    /// GET /boards/{boardId}/cards/{cardId}/tasks
    pub async fn list_tasks(&self, board_id: &str, card_id: &str) -> Result<Vec<TaskPatch>> {
        let url = self.url(&["boards", board_id, "cards", card_id, "tasks"]);
        self.fetch(self.client.get(&url), "tasks").await
    }

    /// POST /boards/{boardId}/cards/{cardId}/tasks
    pub async fn create_task(&self, request: &CreateTask) -> Result<TaskPatch> {
        let url = self.url(&[
            "boards",
            &request.board_id,
            "cards",
            &request.card_id,
            "tasks",
        ]);
        self.fetch(self.client.post(&url).json(request), "task").await
    }

    /// PUT /boards/{boardId}/cards/{cardId}/tasks/{taskId}
    ///
    /// `cardId` in the path is where the task is now; `targetCardId` in the
    /// body moves it.
    pub async fn update_task(&self, request: &UpdateTask) -> Result<TaskPatch> {
        let location =
            TaskLocation::new(&request.board_id, &request.card_id, request.task_id());
        let url = self.task_url(&location, &[]);
        debug!("Updating task: {}", url);
        self.fetch(self.client.put(&url).json(request), "task").await
    }

    /// DELETE /boards/{boardId}/cards/{cardId}/tasks/{taskId}
    pub async fn delete_task(&self, task: &TaskLocation) -> Result<()> {
        let url = self.task_url(task, &[]);
        self.execute(self.client.delete(&url)).await
    }

    /// POST .../tasks/{taskId}/github-attachments
    pub async fn attach_github_item(
        &self,
        task: &TaskLocation,
        draft: &AttachmentDraft,
    ) -> Result<Attachment> {
        let url = self.task_url(task, &["github-attachments"]);
        self.fetch(self.client.post(&url).json(draft), "attachment").await
    }

    /// DELETE .../tasks/{taskId}/github-attachments/{attachmentId}
    pub async fn remove_github_attachment(
        &self,
        task: &TaskLocation,
        attachment_id: &str,
    ) -> Result<()> {
        let url = self.task_url(task, &["github-attachments", attachment_id]);
        self.execute(self.client.delete(&url)).await
    }

    // Invitations

    /// GET /boards/invitations/pending
    pub async fn pending_invitations(&self) -> Result<Vec<InvitationPatch>> {
        let url = self.url(&["boards", "invitations", "pending"]);
        self.fetch(self.client.get(&url), "invitations").await
    }

    /// POST /boards/invitation/respond
    pub async fn respond_to_invitation(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> Result<InvitationPatch> {
        if invitation_id.trim().is_empty() {
            return Err(ApiError::bad_input("invitation id is empty"));
        }
        let url = self.url(&["boards", "invitation", "respond"]);
        let body = RespondToInvitationRequest {
            invitation_id,
            status,
        };
        let value = self
            .fetch_value(self.client.post(&url).json(&body), "invitation")
            .await?;
        let mut answered: InvitationPatch =
            Self::decode(with_id(value, invitation_id), "invitation")?;
        answered.status.get_or_insert(status);
        Ok(answered)
    }

    // Notifications

    /// GET /notifications
    pub async fn list_notifications(&self) -> Result<Vec<NotificationPatch>> {
        let url = self.url(&["notifications"]);
        self.fetch(self.client.get(&url), "notifications").await
    }

    /// PATCH /notifications/{id}/read
    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<NotificationPatch> {
        let url = self.url(&["notifications", notification_id, "read"]);
        let value = self
            .fetch_value(self.client.patch(&url), "notification")
            .await?;
        let mut updated: NotificationPatch =
            Self::decode(with_id(value, notification_id), "notification")?;
        updated.read.get_or_insert(true);
        Ok(updated)
    }

    /// DELETE /notifications/{id}
    pub async fn delete_notification(&self, notification_id: &str) -> Result<()> {
        let url = self.url(&["notifications", notification_id]);
        self.execute(self.client.delete(&url)).await
    }
}

#[async_trait]
impl BoardApi for BoardClient {
    async fn list_boards(&self) -> RemoteResult<Vec<BoardPatch>> {
        Ok(BoardClient::list_boards(self).await?)
    }

    async fn get_board(&self, board_id: &str) -> RemoteResult<BoardPatch> {
        Ok(BoardClient::get_board(self, board_id).await?)
    }

    async fn create_board(&self, request: &CreateBoard) -> RemoteResult<BoardPatch> {
        Ok(BoardClient::create_board(self, request).await?)
    }

    async fn update_board(
        &self,
        board_id: &str,
        changes: &BoardPatch,
    ) -> RemoteResult<BoardPatch> {
        Ok(BoardClient::update_board(self, board_id, changes).await?)
    }

    async fn delete_board(&self, board_id: &str) -> RemoteResult<()> {
        Ok(BoardClient::delete_board(self, board_id).await?)
    }

    async fn list_cards(&self, board_id: &str) -> RemoteResult<Vec<CardPatch>> {
        Ok(BoardClient::list_cards(self, board_id).await?)
    }

    async fn create_card(&self, request: &CreateCard) -> RemoteResult<CardPatch> {
        Ok(BoardClient::create_card(self, request).await?)
    }

    async fn update_card(
        &self,
        board_id: &str,
        card_id: &str,
        changes: &CardPatch,
    ) -> RemoteResult<CardPatch> {
        Ok(BoardClient::update_card(self, board_id, card_id, changes).await?)
    }

    async fn delete_card(&self, board_id: &str, card_id: &str) -> RemoteResult<()> {
        Ok(BoardClient::delete_card(self, board_id, card_id).await?)
    }

    async fn reorder_cards(&self, board_id: &str, positions: &[CardPosition]) -> RemoteResult<()> {
        Ok(BoardClient::reorder_cards(self, board_id, positions).await?)
    }

    async fn list_tasks(&self, board_id: &str, card_id: &str) -> RemoteResult<Vec<TaskPatch>> {
        Ok(BoardClient::list_tasks(self, board_id, card_id).await?)
    }

    async fn create_task(&self, request: &CreateTask) -> RemoteResult<TaskPatch> {
        Ok(BoardClient::create_task(self, request).await?)
    }

    async fn update_task(&self, request: &UpdateTask) -> RemoteResult<TaskPatch> {
        Ok(BoardClient::update_task(self, request).await?)
    }

    async fn delete_task(&self, task: &TaskLocation) -> RemoteResult<()> {
        Ok(BoardClient::delete_task(self, task).await?)
    }

    async fn attach_github_item(
        &self,
        task: &TaskLocation,
        draft: &AttachmentDraft,
    ) -> RemoteResult<Attachment> {
        Ok(BoardClient::attach_github_item(self, task, draft).await?)
    }

    async fn remove_github_attachment(
        &self,
        task: &TaskLocation,
        attachment_id: &str,
    ) -> RemoteResult<()> {
        Ok(BoardClient::remove_github_attachment(self, task, attachment_id).await?)
    }

    async fn pending_invitations(&self) -> RemoteResult<Vec<InvitationPatch>> {
        Ok(BoardClient::pending_invitations(self).await?)
    }

    async fn respond_to_invitation(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> RemoteResult<InvitationPatch> {
        Ok(BoardClient::respond_to_invitation(self, invitation_id, status).await?)
    }

    async fn list_notifications(&self) -> RemoteResult<Vec<NotificationPatch>> {
        Ok(BoardClient::list_notifications(self).await?)
    }

    async fn mark_notification_read(
        &self,
        notification_id: &str,
    ) -> RemoteResult<NotificationPatch> {
        Ok(BoardClient::mark_notification_read(self, notification_id).await?)
    }

    async fn delete_notification(&self, notification_id: &str) -> RemoteResult<()> {
        Ok(BoardClient::delete_notification(self, notification_id).await?)
    }
}
