#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use taskboard_core::api::{
    BoardApi, CardPosition, CreateBoard, CreateCard, CreateTask, TaskLocation, UpdateTask,
};
use taskboard_core::coordinator::MutationCoordinator;
use taskboard_core::models::{
    Attachment, AttachmentDraft, Board, BoardPatch, Card, CardPatch, Invitation,
    InvitationPatch, InvitationStatus, Mergeable, Notification, NotificationPatch, Priority,
    Task, TaskPatch,
};
use taskboard_core::store::EntityStore;
use taskboard_core::{FailureKind, RemoteError, RemoteResult};

pub fn board(id: &str) -> Board {
    Board {
        id: id.into(),
        name: format!("Board {id}"),
        description: None,
        owner_id: "u1".into(),
        members: BTreeSet::from(["u1".to_string()]),
        created_at: None,
        updated_at: None,
    }
}

pub fn card(id: &str, board_id: &str, position: i64) -> Card {
    Card {
        id: id.into(),
        board_id: board_id.into(),
        name: format!("Card {id}"),
        description: None,
        position,
        created_at: None,
        updated_at: None,
    }
}

pub fn task(id: &str, card_id: &str, position: i64) -> Task {
    Task {
        id: id.into(),
        board_id: "b1".into(),
        card_id: card_id.into(),
        title: format!("Task {id}"),
        description: None,
        priority: Priority::None,
        due_date: None,
        completed: false,
        assigned_to: BTreeSet::new(),
        github_attachments: Vec::new(),
        position,
        created_at: None,
        updated_at: None,
    }
}

/// In-memory stand-in for the REST service.
///
/// Each call is applied to the fake's state as it arrives; a gate registered
/// for the operation then holds the response back until released.
#[derive(Default)]
pub struct FakeApi {
    pub boards: Mutex<BTreeMap<String, Board>>,
    pub cards: Mutex<BTreeMap<String, Card>>,
    pub tasks: Mutex<BTreeMap<String, Task>>,
    pub invitations: Mutex<BTreeMap<String, Invitation>>,
    pub notifications: Mutex<BTreeMap<String, Notification>>,
    /// Card ids of every `reorder_cards` request, in the order sent.
    pub reorders: Mutex<Vec<Vec<String>>>,
    failures: Mutex<BTreeMap<&'static str, RemoteError>>,
    gates: Mutex<BTreeMap<&'static str, VecDeque<oneshot::Receiver<()>>>>,
    calls: Mutex<Vec<&'static str>>,
    next_id: AtomicU64,
}

impl FakeApi {
    pub fn seeded(store: &EntityStore) -> Arc<Self> {
        let api = Self::default();
        for board in store.all::<Board>() {
            api.boards.lock().unwrap().insert(board.id.clone(), board);
        }
        for card in store.all::<Card>() {
            api.cards.lock().unwrap().insert(card.id.clone(), card);
        }
        for task in store.all::<Task>() {
            api.tasks.lock().unwrap().insert(task.id.clone(), task);
        }
        for invitation in store.all::<Invitation>() {
            api.invitations
                .lock()
                .unwrap()
                .insert(invitation.id.clone(), invitation);
        }
        for notification in store.all::<Notification>() {
            api.notifications
                .lock()
                .unwrap()
                .insert(notification.id.clone(), notification);
        }
        Arc::new(api)
    }

    /// Makes the next call to `operation` fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: RemoteError) {
        self.failures.lock().unwrap().insert(operation, error);
    }

    /// Holds the next response of `operation` until the sender fires.
    pub fn gate(&self, operation: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(rx);
        tx
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Records the call. A scripted failure is returned (after the gate, if
    /// any) without touching the fake's state.
    async fn enter(&self, operation: &'static str) -> RemoteResult<()> {
        self.calls.lock().unwrap().push(operation);
        let failure = self.failures.lock().unwrap().remove(operation);
        match failure {
            Some(error) => self.respond(operation, Err(error)).await,
            None => Ok(()),
        }
    }

    async fn respond<T>(&self, operation: &'static str, result: RemoteResult<T>) -> RemoteResult<T> {
        let gate = self
            .gates
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    fn not_found(what: &str) -> RemoteError {
        RemoteError::new(FailureKind::NotFound, format!("{what} not found")).with_status(404)
    }

    fn renumber(&self, card_id: &str, anchor: &str, index: i64) {
        let mut tasks = self.tasks.lock().unwrap();
        let mut ids: Vec<(i64, String)> = tasks
            .values()
            .filter(|task| task.card_id == card_id && task.id != anchor)
            .map(|task| (task.position, task.id.clone()))
            .collect();
        ids.sort();
        let mut order: Vec<String> = ids.into_iter().map(|(_, id)| id).collect();
        if tasks.get(anchor).is_some_and(|task| task.card_id == card_id) {
            let index = (index.max(0) as usize).min(order.len());
            order.insert(index, anchor.to_string());
        }
        for (position, id) in order.iter().enumerate() {
            if let Some(task) = tasks.get_mut(id) {
                task.position = position as i64;
            }
        }
    }
}

#[async_trait]
impl BoardApi for FakeApi {
    async fn list_boards(&self) -> RemoteResult<Vec<BoardPatch>> {
        self.enter("list_boards").await?;
        let boards = self.boards.lock().unwrap().values().map(Board::to_patch).collect();
        self.respond("list_boards", Ok(boards)).await
    }

    async fn get_board(&self, board_id: &str) -> RemoteResult<BoardPatch> {
        self.enter("get_board").await?;
        let board = self
            .boards
            .lock()
            .unwrap()
            .get(board_id)
            .map(Board::to_patch)
            .ok_or_else(|| Self::not_found("board"));
        self.respond("get_board", board).await
    }

    async fn create_board(&self, request: &CreateBoard) -> RemoteResult<BoardPatch> {
        self.enter("create_board").await?;
        let mut created = board(&self.next_id("b"));
        created.name = request.name.clone();
        created.description = request.description.clone();
        self.boards
            .lock()
            .unwrap()
            .insert(created.id.clone(), created.clone());
        self.respond("create_board", Ok(created.to_patch())).await
    }

    async fn update_board(&self, board_id: &str, changes: &BoardPatch) -> RemoteResult<BoardPatch> {
        self.enter("update_board").await?;
        let updated = self.boards.lock().unwrap().get_mut(board_id).map(|board| {
            *board = board.merge(changes);
            board.to_patch()
        });
        self.respond("update_board", updated.ok_or_else(|| Self::not_found("board")))
            .await
    }

    async fn delete_board(&self, board_id: &str) -> RemoteResult<()> {
        self.enter("delete_board").await?;
        self.boards.lock().unwrap().remove(board_id);
        self.respond("delete_board", Ok(())).await
    }

    async fn list_cards(&self, board_id: &str) -> RemoteResult<Vec<CardPatch>> {
        self.enter("list_cards").await?;
        let cards = self
            .cards
            .lock()
            .unwrap()
            .values()
            .filter(|card| card.board_id == board_id)
            .map(Card::to_patch)
            .collect();
        self.respond("list_cards", Ok(cards)).await
    }

    async fn create_card(&self, request: &CreateCard) -> RemoteResult<CardPatch> {
        self.enter("create_card").await?;
        let mut created = card(&self.next_id("c"), &request.board_id, request.position);
        created.name = request.name.clone();
        self.cards
            .lock()
            .unwrap()
            .insert(created.id.clone(), created.clone());
        self.respond("create_card", Ok(created.to_patch())).await
    }

    async fn update_card(
        &self,
        _board_id: &str,
        card_id: &str,
        changes: &CardPatch,
    ) -> RemoteResult<CardPatch> {
        self.enter("update_card").await?;
        let updated = self.cards.lock().unwrap().get_mut(card_id).map(|card| {
            *card = card.merge(changes);
            card.to_patch()
        });
        self.respond("update_card", updated.ok_or_else(|| Self::not_found("card")))
            .await
    }

    async fn delete_card(&self, _board_id: &str, card_id: &str) -> RemoteResult<()> {
        self.enter("delete_card").await?;
        self.cards.lock().unwrap().remove(card_id);
        self.tasks
            .lock()
            .unwrap()
            .retain(|_, task| task.card_id != card_id);
        self.respond("delete_card", Ok(())).await
    }

    async fn reorder_cards(&self, _board_id: &str, positions: &[CardPosition]) -> RemoteResult<()> {
        self.enter("reorder_cards").await?;
        self.reorders
            .lock()
            .unwrap()
            .push(positions.iter().map(|slot| slot.card_id.clone()).collect());
        {
            let mut cards = self.cards.lock().unwrap();
            for slot in positions {
                if let Some(card) = cards.get_mut(&slot.card_id) {
                    card.position = slot.position;
                }
            }
        }
        self.respond("reorder_cards", Ok(())).await
    }

    async fn list_tasks(&self, _board_id: &str, card_id: &str) -> RemoteResult<Vec<TaskPatch>> {
        self.enter("list_tasks").await?;
        let tasks = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|task| task.card_id == card_id)
            .map(Task::to_patch)
            .collect();
        self.respond("list_tasks", Ok(tasks)).await
    }

    async fn create_task(&self, request: &CreateTask) -> RemoteResult<TaskPatch> {
        self.enter("create_task").await?;
        let position = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|task| task.card_id == request.card_id)
            .count() as i64;
        let mut created = task(&self.next_id("t"), &request.card_id, position);
        created.board_id = request.board_id.clone();
        created.title = request.title.clone();
        created.priority = request.priority.unwrap_or_default();
        self.tasks
            .lock()
            .unwrap()
            .insert(created.id.clone(), created.clone());
        self.respond("create_task", Ok(created.to_patch())).await
    }

    async fn update_task(&self, request: &UpdateTask) -> RemoteResult<TaskPatch> {
        self.enter("update_task").await?;
        let task_id = request.task_id().to_string();
        let moved = {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.get_mut(&task_id).map(|task| {
                let from = task.card_id.clone();
                *task = task.merge(&request.changes);
                if let Some(target) = &request.target_card_id {
                    task.card_id = target.clone();
                }
                (from, task.card_id.clone(), task.position)
            })
        };
        let Some((from, to, position)) = moved else {
            return self
                .respond("update_task", Err(Self::not_found("task")))
                .await;
        };
        if request.changes.position.is_some() || from != to {
            self.renumber(&to, &task_id, position);
            if from != to {
                self.renumber(&from, "", 0);
            }
        }
        let updated = self.tasks.lock().unwrap().get(&task_id).map(Task::to_patch);
        self.respond("update_task", updated.ok_or_else(|| Self::not_found("task")))
            .await
    }

    async fn delete_task(&self, location: &TaskLocation) -> RemoteResult<()> {
        self.enter("delete_task").await?;
        self.tasks.lock().unwrap().remove(&location.task_id);
        self.respond("delete_task", Ok(())).await
    }

    async fn attach_github_item(
        &self,
        location: &TaskLocation,
        draft: &AttachmentDraft,
    ) -> RemoteResult<Attachment> {
        self.enter("attach_github_item").await?;
        let attachment = Attachment {
            id: self.next_id("a"),
            kind: draft.kind,
            repository: draft.repository.clone(),
            reference: draft.reference.clone(),
            title: draft.title.clone(),
            url: draft.url.clone(),
            state: None,
        };
        if let Some(task) = self.tasks.lock().unwrap().get_mut(&location.task_id) {
            task.github_attachments.push(attachment.clone());
        }
        self.respond("attach_github_item", Ok(attachment)).await
    }

    async fn remove_github_attachment(
        &self,
        location: &TaskLocation,
        attachment_id: &str,
    ) -> RemoteResult<()> {
        self.enter("remove_github_attachment").await?;
        if let Some(task) = self.tasks.lock().unwrap().get_mut(&location.task_id) {
            task.github_attachments
                .retain(|attachment| attachment.id != attachment_id);
        }
        self.respond("remove_github_attachment", Ok(())).await
    }

    async fn pending_invitations(&self) -> RemoteResult<Vec<InvitationPatch>> {
        self.enter("pending_invitations").await?;
        let invitations = self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|invitation| invitation.status == InvitationStatus::Pending)
            .map(Invitation::to_patch)
            .collect();
        self.respond("pending_invitations", Ok(invitations)).await
    }

    async fn respond_to_invitation(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> RemoteResult<InvitationPatch> {
        self.enter("respond_to_invitation").await?;
        let answered = self
            .invitations
            .lock()
            .unwrap()
            .get_mut(invitation_id)
            .map(|invitation| {
                invitation.status = status;
                invitation.to_patch()
            });
        self.respond(
            "respond_to_invitation",
            answered.ok_or_else(|| Self::not_found("invitation")),
        )
        .await
    }

    async fn list_notifications(&self) -> RemoteResult<Vec<NotificationPatch>> {
        self.enter("list_notifications").await?;
        let notifications = self
            .notifications
            .lock()
            .unwrap()
            .values()
            .map(Notification::to_patch)
            .collect();
        self.respond("list_notifications", Ok(notifications)).await
    }

    async fn mark_notification_read(&self, notification_id: &str) -> RemoteResult<NotificationPatch> {
        self.enter("mark_notification_read").await?;
        let updated = self
            .notifications
            .lock()
            .unwrap()
            .get_mut(notification_id)
            .map(|notification| {
                notification.read = true;
                notification.to_patch()
            });
        self.respond(
            "mark_notification_read",
            updated.ok_or_else(|| Self::not_found("notification")),
        )
        .await
    }

    async fn delete_notification(&self, notification_id: &str) -> RemoteResult<()> {
        self.enter("delete_notification").await?;
        self.notifications.lock().unwrap().remove(notification_id);
        self.respond("delete_notification", Ok(())).await
    }
}

/// A store with board b1, cards c1 and c2, tasks t1 and t2 in c1 and t3 in
/// c2, plus a fake service holding the same state.
pub fn seeded() -> (Arc<EntityStore>, Arc<FakeApi>, Arc<MutationCoordinator>) {
    let store = Arc::new(EntityStore::new());
    store.transaction(|txn| {
        txn.upsert(board("b1"));
        txn.upsert(card("c1", "b1", 0));
        txn.upsert(card("c2", "b1", 1));
        txn.upsert(task("t1", "c1", 0));
        txn.upsert(task("t2", "c1", 1));
        txn.upsert(task("t3", "c2", 0));
    });
    let api = FakeApi::seeded(&store);
    let coordinator = Arc::new(
        MutationCoordinator::new(store.clone(), api.clone()).with_user_id("u1"),
    );
    (store, api, coordinator)
}

/// Yields until `n` mutations are in flight.
pub async fn wait_for_in_flight(coordinator: &MutationCoordinator, n: usize) {
    for _ in 0..1000 {
        if coordinator.in_flight().len() == n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {n} mutations in flight, saw {}", coordinator.in_flight().len());
}

pub fn positions(store: &EntityStore, card_id: &str) -> Vec<(String, i64)> {
    store
        .tasks_for_card(card_id)
        .into_iter()
        .map(|task| (task.id, task.position))
        .collect()
}
