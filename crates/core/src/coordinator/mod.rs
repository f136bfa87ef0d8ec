//! Optimistic mutation coordinator.
//!
//! Every user mutation goes through the same state machine:
//!
//! 1. register it in the ledger (with the fields it writes) and write the
//!    expected result into the store straight away;
//! 2. issue the remote call;
//! 3. on success, reconcile the response, letting it write only fields no
//!    newer local edit has claimed;
//! 4. on failure, revert a field edit's own fields, drop a create's
//!    placeholder, or refetch whatever a structural change or delete touched.
//!    The failure lands in the store's error slot and is returned.
//!
//! Push events and refetches leave fields claimed by in-flight mutations
//! alone, so a confirmed response and a peer's push can arrive in any order.

mod ledger;
mod refetch;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::{debug, warn};
use uuid::Uuid;

pub use ledger::{MutationKind, MutationRecord, MutationState};

use ledger::{MutationLedger, MutationStart};

use crate::api::{
    BoardApi, CardPosition, CreateBoard, CreateCard, CreateTask, TaskLocation, UpdateTask,
};
use crate::constants::LOCAL_ID_PREFIX;
use crate::errors::{MutationFailure, RemoteError};
use crate::models::{
    AttachmentDraft, Board, BoardPatch, Card, CardPatch, Invitation, InvitationPatch,
    InvitationStatus, Mergeable, Notification, NotificationPatch, Patch, Task, TaskPatch,
    TASK_STRUCTURAL_FIELDS,
};
use crate::positions::{dense_order, plan_move, MoveIntent, MovePlan, Slot};
use crate::reconcile::{self, Change, EntityPatch, Outcome, RefetchScope};
use crate::store::{EntityKind, EntityRef, EntityStore, StoredEntity};

pub type MutationResult<T> = std::result::Result<T, MutationFailure>;

/// Fields and deletes held by in-flight mutations at one moment.
pub(crate) struct Claims {
    fields: BTreeMap<EntityRef, BTreeSet<&'static str>>,
    deletes: BTreeSet<EntityRef>,
}

impl Claims {
    fn allows(&self, target: &EntityRef, field: &str) -> bool {
        !self
            .fields
            .get(target)
            .is_some_and(|claimed| claimed.contains(field))
    }

    fn deleting(&self, target: &EntityRef) -> bool {
        self.deletes.contains(target)
    }
}

pub struct MutationCoordinator {
    store: Arc<EntityStore>,
    api: Arc<dyn BoardApi>,
    ledger: Mutex<MutationLedger>,
    user_id: Option<String>,
}

fn local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

/// The current values of `fields`, as a patch.
fn fields_of<E: StoredEntity>(current: &E, fields: &[&'static str]) -> E::Patch {
    let mut before = current.to_patch();
    before.retain_fields(&|field| fields.iter().any(|known| *known == field));
    before
}

fn slots<E: StoredEntity>(siblings: &[E]) -> Vec<Slot> {
    siblings
        .iter()
        .filter_map(|entity| entity.position().map(|position| Slot::new(entity.id(), position)))
        .collect()
}

/// Siblings the service knows about. Placeholders of creates still in flight
/// are left out of planned moves and the orders sent upstream.
fn remote_slots<E: StoredEntity>(siblings: &[E]) -> Vec<Slot> {
    siblings
        .iter()
        .filter(|entity| !entity.id().starts_with(LOCAL_ID_PREFIX))
        .filter_map(|entity| entity.position().map(|position| Slot::new(entity.id(), position)))
        .collect()
}

impl MutationCoordinator {
    pub fn new(store: Arc<EntityStore>, api: Arc<dyn BoardApi>) -> Self {
        Self {
            store,
            api,
            ledger: Mutex::new(MutationLedger::default()),
            user_id: None,
        }
    }

    /// The signed-in user, recorded as owner of optimistic boards.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn api(&self) -> &Arc<dyn BoardApi> {
        &self.api
    }

    /// Mutations still waiting for the service.
    pub fn in_flight(&self) -> Vec<MutationRecord> {
        self.ledger().in_flight()
    }

    /// Recently finished mutations, oldest first.
    pub fn history(&self) -> Vec<MutationRecord> {
        self.ledger().history()
    }

    fn ledger(&self) -> MutexGuard<'_, MutationLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn claims(&self) -> Claims {
        let ledger = self.ledger();
        Claims {
            fields: ledger.claimed_fields(),
            deletes: ledger.pending_deletes(),
        }
    }

    fn begin(&self, start: MutationStart) -> u64 {
        debug!(
            "Mutation {} on {} ({:?}, fields {:?})",
            start.operation, start.target, start.kind, start.fields
        );
        self.ledger().begin(start)
    }

    fn write_local(&self, patch: EntityPatch) {
        let target = patch.entity_ref();
        if let Err(err) = self
            .store
            .transaction(|txn| reconcile::apply_local(txn, patch))
        {
            warn!("Optimistic write to {} skipped: {}", target, err);
        }
    }

    fn missing(&self, operation: &'static str, target: EntityRef) -> MutationFailure {
        let failure = MutationFailure::missing(operation, target);
        self.store.record_error(failure.clone());
        failure
    }

    /// Reconciles a confirmed change, masked by what newer edits claim.
    fn apply_confirmed(&self, seq: u64, change: Change) -> Outcome {
        let record = self.ledger().get(seq).cloned();
        let filter = move |target: &EntityRef, field: &str| match &record {
            Some(record) if record.target == *target => record.response_may_write(field),
            _ => true,
        };
        self.store
            .transaction(|txn| reconcile::apply(txn, change, &filter))
    }

    async fn confirm(&self, seq: u64, change: Option<Change>) {
        let outcome = change.map(|change| self.apply_confirmed(seq, change));
        self.ledger().finish(seq, None);
        if let Some(scope) = outcome.and_then(|outcome| outcome.refetch) {
            self.refetch_quietly(&scope).await;
        }
    }

    /// Replaces a create's placeholder with what the service returned.
    async fn swap_placeholder(&self, seq: u64, placeholder: &EntityRef, created: EntityPatch) {
        let outcome = self.store.transaction(|txn| {
            txn.remove_ref(placeholder);
            reconcile::apply(txn, Change::Upsert(created), &reconcile::accept_all)
        });
        self.ledger().finish(seq, None);
        if let Some(scope) = outcome.refetch {
            self.refetch_quietly(&scope).await;
        }
    }

    async fn fail(&self, seq: u64, error: RemoteError) -> MutationFailure {
        let record = self.ledger().finish(seq, Some(error.clone()));
        let Some(record) = record else {
            let failure = MutationFailure::new("unknown", None, error);
            self.store.record_error(failure.clone());
            return failure;
        };

        match record.kind {
            MutationKind::FieldEdit => self.revert(&record),
            MutationKind::Create => {
                if record.target.id.starts_with(LOCAL_ID_PREFIX) {
                    self.store
                        .transaction(|txn| txn.remove_ref(&record.target));
                }
            }
            MutationKind::Structural | MutationKind::Delete => {
                for scope in &record.on_failure {
                    self.refetch_quietly(scope).await;
                }
            }
        }

        let failure = MutationFailure::new(record.operation, Some(record.target), error);
        warn!("{}", failure);
        self.store.record_error(failure.clone());
        failure
    }

    /// Puts back the pre-mutation values of a failed edit's own fields,
    /// except those a newer edit has since overwritten.
    fn revert(&self, record: &MutationRecord) {
        let Some(mut before) = record.before.clone() else {
            return;
        };
        before.retain_fields(&|field| !record.newer_concurrent.contains(field));
        if before.touched_fields().is_empty() {
            return;
        }
        debug!("Reverting {} on {}", record.operation, record.target);
        self.write_local(before);
    }

    // Boards

    pub async fn create_board(&self, request: CreateBoard) -> MutationResult<String> {
        const OP: &str = "create_board";
        let placeholder = EntityRef::board(local_id());
        let owner = self.user_id.clone().unwrap_or_default();
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Create,
            target: placeholder.clone(),
            fields: Vec::new(),
            before: None,
            on_failure: Vec::new(),
        });
        self.store.upsert(Board {
            id: placeholder.id.clone(),
            name: request.name.clone(),
            description: request.description.clone(),
            members: BTreeSet::from([owner.clone()]),
            owner_id: owner,
            created_at: Some(Utc::now()),
            updated_at: None,
        });

        match self.api.create_board(&request).await {
            Ok(created) => {
                let id = created.id.clone();
                self.swap_placeholder(seq, &placeholder, created.into())
                    .await;
                Ok(id)
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    pub async fn update_board(&self, changes: BoardPatch) -> MutationResult<()> {
        const OP: &str = "update_board";
        let target = EntityRef::board(&changes.id);
        let Some(current) = self.store.get::<Board>(&changes.id) else {
            return Err(self.missing(OP, target));
        };
        let fields = changes.touched_fields();
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::FieldEdit,
            target,
            before: Some(fields_of(&current, &fields).into()),
            fields,
            on_failure: Vec::new(),
        });
        self.write_local(changes.clone().into());

        match self.api.update_board(&changes.id, &changes).await {
            Ok(updated) => {
                self.confirm(seq, Some(Change::Upsert(updated.into()))).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    pub async fn delete_board(&self, board_id: &str) -> MutationResult<()> {
        const OP: &str = "delete_board";
        let target = EntityRef::board(board_id);
        if self.store.get::<Board>(board_id).is_none() {
            return Err(self.missing(OP, target));
        }
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Delete,
            target: target.clone(),
            fields: Vec::new(),
            before: None,
            on_failure: vec![RefetchScope::Boards, RefetchScope::board(board_id)],
        });
        self.store.remove::<Board>(board_id);

        match self.api.delete_board(board_id).await {
            Ok(()) => {
                self.confirm(seq, Some(Change::Remove(target))).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    // Cards

    pub async fn create_card(&self, request: CreateCard) -> MutationResult<String> {
        const OP: &str = "create_card";
        let placeholder = EntityRef::card(local_id());
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Create,
            target: placeholder.clone(),
            fields: Vec::new(),
            before: None,
            on_failure: Vec::new(),
        });
        self.store.upsert(Card {
            id: placeholder.id.clone(),
            board_id: request.board_id.clone(),
            name: request.name.clone(),
            description: request.description.clone(),
            position: request.position,
            created_at: Some(Utc::now()),
            updated_at: None,
        });

        match self.api.create_card(&request).await {
            Ok(mut created) => {
                created.board_id.get_or_insert_with(|| request.board_id.clone());
                let id = created.id.clone();
                self.swap_placeholder(seq, &placeholder, created.into())
                    .await;
                Ok(id)
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    /// Edits a card. Touching `position` or `boardId` makes it structural.
    pub async fn update_card(&self, changes: CardPatch) -> MutationResult<()> {
        const OP: &str = "update_card";
        let target = EntityRef::card(&changes.id);
        let Some(current) = self.store.get::<Card>(&changes.id) else {
            return Err(self.missing(OP, target));
        };
        let fields = changes.touched_fields();
        let structural = fields
            .iter()
            .any(|field| matches!(*field, "position" | "boardId"));
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: if structural {
                MutationKind::Structural
            } else {
                MutationKind::FieldEdit
            },
            target,
            before: Some(fields_of(&current, &fields).into()),
            fields,
            on_failure: vec![RefetchScope::board_cards(&current.board_id)],
        });
        self.write_local(changes.clone().into());

        match self
            .api
            .update_card(&current.board_id, &changes.id, &changes)
            .await
        {
            Ok(mut updated) => {
                updated
                    .board_id
                    .get_or_insert_with(|| current.board_id.clone());
                self.confirm(seq, Some(Change::Upsert(updated.into()))).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    pub async fn delete_card(&self, card_id: &str) -> MutationResult<()> {
        const OP: &str = "delete_card";
        let target = EntityRef::card(card_id);
        let Some(current) = self.store.get::<Card>(card_id) else {
            return Err(self.missing(OP, target));
        };
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Delete,
            target: target.clone(),
            fields: Vec::new(),
            before: None,
            on_failure: vec![RefetchScope::board(&current.board_id)],
        });
        self.store.remove::<Card>(card_id);

        match self.api.delete_card(&current.board_id, card_id).await {
            Ok(()) => {
                self.confirm(seq, Some(Change::Remove(target))).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    /// Moves a card to `target_index` among its board's cards and sends the
    /// resulting order.
    pub async fn move_card(&self, card_id: &str, target_index: usize) -> MutationResult<MovePlan> {
        const OP: &str = "move_card";
        let target = EntityRef::card(card_id);
        let Some(current) = self.store.get::<Card>(card_id) else {
            return Err(self.missing(OP, target));
        };
        let siblings = remote_slots(&self.store.cards_for_board(&current.board_id));
        let intent = MoveIntent {
            entity_id: card_id.to_string(),
            source_parent_id: current.board_id.clone(),
            target_parent_id: current.board_id.clone(),
            target_index,
        };
        let plan = plan_move(&siblings, &intent);
        let MovePlan::Move(planned) = &plan else {
            return Ok(plan);
        };

        let order = dense_order(&siblings, Some((card_id, target_index)));
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Structural,
            target,
            fields: vec!["position"],
            before: None,
            on_failure: vec![RefetchScope::board_cards(&current.board_id)],
        });
        let mut optimistic = CardPatch::new(card_id);
        optimistic.position = Some(planned.position);
        self.write_local(optimistic.into());

        let positions: Vec<CardPosition> = order
            .iter()
            .map(|slot| CardPosition {
                card_id: slot.id.clone(),
                position: slot.position,
            })
            .collect();
        match self.api.reorder_cards(&current.board_id, &positions).await {
            Ok(()) => {
                let change = Change::Reposition {
                    kind: EntityKind::Card,
                    parent_id: current.board_id.clone(),
                    positions: order,
                };
                self.confirm(seq, Some(change)).await;
                Ok(plan)
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    // Tasks

    pub async fn create_task(&self, request: CreateTask) -> MutationResult<String> {
        const OP: &str = "create_task";
        let placeholder = EntityRef::task(local_id());
        let position = self.store.tasks_for_card(&request.card_id).len() as i64;
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Create,
            target: placeholder.clone(),
            fields: Vec::new(),
            before: None,
            on_failure: Vec::new(),
        });
        self.store.upsert(Task {
            id: placeholder.id.clone(),
            board_id: request.board_id.clone(),
            card_id: request.card_id.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            priority: request.priority.unwrap_or_default(),
            due_date: request.due_date,
            completed: false,
            assigned_to: request.assigned_to.clone(),
            github_attachments: Vec::new(),
            position,
            created_at: Some(Utc::now()),
            updated_at: None,
        });

        match self.api.create_task(&request).await {
            Ok(mut created) => {
                created.board_id.get_or_insert_with(|| request.board_id.clone());
                created.card_id.get_or_insert_with(|| request.card_id.clone());
                let id = created.id.clone();
                self.swap_placeholder(seq, &placeholder, created.into())
                    .await;
                Ok(id)
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    /// Edits a task. Touching `cardId`, `boardId` or `position` makes it
    /// structural; a changed `cardId` is sent as a move.
    pub async fn update_task(&self, changes: TaskPatch) -> MutationResult<()> {
        const OP: &str = "update_task";
        let target = EntityRef::task(&changes.id);
        let Some(current) = self.store.get::<Task>(&changes.id) else {
            return Err(self.missing(OP, target));
        };
        let fields = changes.touched_fields();
        let structural = fields
            .iter()
            .any(|field| TASK_STRUCTURAL_FIELDS.contains(field));
        let moving_to = changes
            .card_id
            .clone()
            .filter(|card_id| *card_id != current.card_id);

        let mut on_failure = vec![RefetchScope::card_tasks(
            &current.board_id,
            &current.card_id,
        )];
        if let Some(card_id) = &moving_to {
            on_failure.push(RefetchScope::card_tasks(&current.board_id, card_id));
        }
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: if structural {
                MutationKind::Structural
            } else {
                MutationKind::FieldEdit
            },
            target,
            before: Some(fields_of(&current, &fields).into()),
            fields,
            on_failure,
        });
        self.write_local(changes.clone().into());

        let mut body = changes;
        body.card_id = None;
        let request = UpdateTask {
            board_id: current.board_id.clone(),
            card_id: current.card_id.clone(),
            changes: body,
            target_card_id: moving_to.clone(),
        };
        let vacated = moving_to.is_some().then_some(current.card_id.as_str());
        self.send_task_update(seq, &request, vacated).await
    }

    /// Moves a task to `target_index` within `target_parent_id` (a card).
    pub async fn move_task(&self, intent: MoveIntent) -> MutationResult<MovePlan> {
        const OP: &str = "move_task";
        let target = EntityRef::task(&intent.entity_id);
        let Some(current) = self.store.get::<Task>(&intent.entity_id) else {
            return Err(self.missing(OP, target));
        };
        if self.store.get::<Card>(&intent.target_parent_id).is_none() {
            return Err(self.missing(OP, EntityRef::card(&intent.target_parent_id)));
        }
        let intent = MoveIntent {
            source_parent_id: current.card_id.clone(),
            ..intent
        };
        let siblings = remote_slots(&self.store.tasks_for_card(&intent.target_parent_id));
        let plan = plan_move(&siblings, &intent);
        let MovePlan::Move(planned) = &plan else {
            return Ok(plan);
        };

        let mut fields = vec!["position"];
        let mut on_failure = vec![RefetchScope::card_tasks(
            &current.board_id,
            &current.card_id,
        )];
        if planned.parent_changed {
            fields.push("cardId");
            on_failure.push(RefetchScope::card_tasks(
                &current.board_id,
                &planned.target_parent_id,
            ));
        }
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Structural,
            target,
            before: Some(fields_of(&current, &fields).into()),
            fields,
            on_failure,
        });

        let mut optimistic = TaskPatch::new(&current.id);
        optimistic.position = Some(planned.position);
        if planned.parent_changed {
            optimistic.card_id = Some(planned.target_parent_id.clone());
        }
        self.write_local(optimistic.into());

        let mut body = TaskPatch::new(&current.id);
        body.position = Some(planned.position);
        let request = UpdateTask {
            board_id: current.board_id.clone(),
            card_id: current.card_id.clone(),
            changes: body,
            target_card_id: planned
                .parent_changed
                .then(|| planned.target_parent_id.clone()),
        };
        let vacated = planned.parent_changed.then_some(current.card_id.as_str());
        self.send_task_update(seq, &request, vacated).await?;
        Ok(plan)
    }

    /// Sends a task update. A card the task left is compacted once the
    /// service confirms, since the optimistic write already moved the task
    /// out of it.
    async fn send_task_update(
        &self,
        seq: u64,
        request: &UpdateTask,
        vacated: Option<&str>,
    ) -> MutationResult<()> {
        match self.api.update_task(request).await {
            Ok(mut updated) => {
                // Some responses leave out where the task ended up.
                if updated.card_id.is_none() {
                    updated.card_id = request.target_card_id.clone();
                }
                updated
                    .board_id
                    .get_or_insert_with(|| request.board_id.clone());
                self.confirm(seq, Some(Change::Upsert(updated.into()))).await;
                if let Some(card_id) = vacated {
                    self.compact_tasks(card_id);
                }
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    fn compact_tasks(&self, card_id: &str) {
        let order = dense_order(&slots(&self.store.tasks_for_card(card_id)), None);
        let change = Change::Reposition {
            kind: EntityKind::Task,
            parent_id: card_id.to_string(),
            positions: order,
        };
        self.store
            .transaction(|txn| reconcile::apply(txn, change, &reconcile::accept_all));
    }

    pub async fn delete_task(&self, task_id: &str) -> MutationResult<()> {
        const OP: &str = "delete_task";
        let target = EntityRef::task(task_id);
        let Some(current) = self.store.get::<Task>(task_id) else {
            return Err(self.missing(OP, target));
        };
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Delete,
            target: target.clone(),
            fields: Vec::new(),
            before: None,
            on_failure: vec![RefetchScope::card_tasks(
                &current.board_id,
                &current.card_id,
            )],
        });
        self.store.remove::<Task>(task_id);

        let location = TaskLocation::new(&current.board_id, &current.card_id, task_id);
        match self.api.delete_task(&location).await {
            Ok(()) => {
                self.confirm(seq, Some(Change::Remove(target))).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    // Attachments

    /// Links a GitHub item to a task. Returns the attachment id.
    pub async fn attach_github_item(
        &self,
        task_id: &str,
        draft: AttachmentDraft,
    ) -> MutationResult<String> {
        const OP: &str = "attach_github_item";
        let target = EntityRef::task(task_id);
        let Some(current) = self.store.get::<Task>(task_id) else {
            return Err(self.missing(OP, target));
        };
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Create,
            target,
            fields: Vec::new(),
            before: None,
            on_failure: Vec::new(),
        });

        let location = TaskLocation::new(&current.board_id, &current.card_id, task_id);
        match self.api.attach_github_item(&location, &draft).await {
            Ok(attachment) => {
                let id = attachment.id.clone();
                let change = Change::AttachmentAdded {
                    task_id: task_id.to_string(),
                    attachment,
                };
                self.confirm(seq, Some(change)).await;
                Ok(id)
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    pub async fn remove_github_attachment(
        &self,
        task_id: &str,
        attachment_id: &str,
    ) -> MutationResult<()> {
        const OP: &str = "remove_github_attachment";
        let target = EntityRef::task(task_id);
        let Some(current) = self.store.get::<Task>(task_id) else {
            return Err(self.missing(OP, target));
        };
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Structural,
            target,
            fields: vec!["githubAttachments"],
            before: None,
            on_failure: vec![RefetchScope::card_tasks(
                &current.board_id,
                &current.card_id,
            )],
        });
        let removal = Change::AttachmentRemoved {
            task_id: task_id.to_string(),
            attachment_id: attachment_id.to_string(),
        };
        self.store
            .transaction(|txn| reconcile::apply(txn, removal, &reconcile::accept_all));

        let location = TaskLocation::new(&current.board_id, &current.card_id, task_id);
        match self
            .api
            .remove_github_attachment(&location, attachment_id)
            .await
        {
            Ok(()) => {
                self.confirm(seq, None).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    // Invitations

    pub async fn respond_to_invitation(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> MutationResult<()> {
        const OP: &str = "respond_to_invitation";
        let target = EntityRef::invitation(invitation_id);
        let Some(current) = self.store.get::<Invitation>(invitation_id) else {
            return Err(self.missing(OP, target));
        };
        let fields = vec!["status"];
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::FieldEdit,
            target,
            before: Some(fields_of(&current, &fields).into()),
            fields,
            on_failure: Vec::new(),
        });
        let mut optimistic = InvitationPatch::new(invitation_id);
        optimistic.status = Some(status);
        self.write_local(optimistic.into());

        match self.api.respond_to_invitation(invitation_id, status).await {
            Ok(mut answered) => {
                answered.status.get_or_insert(status);
                self.confirm(seq, Some(Change::Upsert(answered.into()))).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    // Notifications

    pub async fn mark_notification_read(&self, notification_id: &str) -> MutationResult<()> {
        const OP: &str = "mark_notification_read";
        let target = EntityRef::notification(notification_id);
        let Some(current) = self.store.get::<Notification>(notification_id) else {
            return Err(self.missing(OP, target));
        };
        if current.read {
            return Ok(());
        }
        let fields = vec!["read"];
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::FieldEdit,
            target,
            before: Some(fields_of(&current, &fields).into()),
            fields,
            on_failure: Vec::new(),
        });
        let mut optimistic = NotificationPatch::new(notification_id);
        optimistic.read = Some(true);
        self.write_local(optimistic.into());

        match self.api.mark_notification_read(notification_id).await {
            Ok(updated) => {
                self.confirm(seq, Some(Change::Upsert(updated.into()))).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }

    pub async fn delete_notification(&self, notification_id: &str) -> MutationResult<()> {
        const OP: &str = "delete_notification";
        let target = EntityRef::notification(notification_id);
        if self.store.get::<Notification>(notification_id).is_none() {
            return Err(self.missing(OP, target));
        }
        let seq = self.begin(MutationStart {
            operation: OP,
            kind: MutationKind::Delete,
            target: target.clone(),
            fields: Vec::new(),
            before: None,
            on_failure: vec![RefetchScope::Notifications],
        });
        self.store.remove::<Notification>(notification_id);

        match self.api.delete_notification(notification_id).await {
            Ok(()) => {
                self.confirm(seq, Some(Change::Remove(target))).await;
                Ok(())
            }
            Err(error) => Err(self.fail(seq, error).await),
        }
    }
}
