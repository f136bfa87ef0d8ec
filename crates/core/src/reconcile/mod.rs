//! Reconciliation: folding deltas from the service into the store.
//!
//! Every write path (mutation responses, push events, refetches) comes
//! through here. Fields present in a delta overwrite, absent fields survive,
//! and the last delta to arrive wins per field. Deltas that carry a position
//! trigger dense renumbering of the affected parents, which mirrors what the
//! service does on its side.

mod snapshot;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub use snapshot::{replace_snapshot, SnapshotSummary};

use crate::models::{
    Attachment, Board, BoardPatch, Card, CardPatch, Invitation, InvitationPatch,
    InvitationStatus, Mergeable, Notification, NotificationPatch, Patch, Task, TaskPatch,
};
use crate::positions::{dense_order, settle_order, Slot};
use crate::store::{EntityKind, EntityRef, EntityStore, StoreTxn, StoredEntity};

/// Decides, per entity and wire field name, whether a delta may write it.
pub type FieldFilter<'a> = &'a (dyn Fn(&EntityRef, &str) -> bool + Sync);

/// A filter that lets every field through.
pub fn accept_all(_: &EntityRef, _: &str) -> bool {
    true
}

/// A partial entity of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "patch", rename_all = "snake_case")]
pub enum EntityPatch {
    Board(BoardPatch),
    Card(CardPatch),
    Task(TaskPatch),
    Invitation(InvitationPatch),
    Notification(NotificationPatch),
}

impl EntityPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPatch::Board(_) => EntityKind::Board,
            EntityPatch::Card(_) => EntityKind::Card,
            EntityPatch::Task(_) => EntityKind::Task,
            EntityPatch::Invitation(_) => EntityKind::Invitation,
            EntityPatch::Notification(_) => EntityKind::Notification,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityPatch::Board(patch) => patch.id(),
            EntityPatch::Card(patch) => patch.id(),
            EntityPatch::Task(patch) => patch.id(),
            EntityPatch::Invitation(patch) => patch.id(),
            EntityPatch::Notification(patch) => patch.id(),
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind(), self.id())
    }

    pub fn touched_fields(&self) -> Vec<&'static str> {
        match self {
            EntityPatch::Board(patch) => patch.touched_fields(),
            EntityPatch::Card(patch) => patch.touched_fields(),
            EntityPatch::Task(patch) => patch.touched_fields(),
            EntityPatch::Invitation(patch) => patch.touched_fields(),
            EntityPatch::Notification(patch) => patch.touched_fields(),
        }
    }

    pub fn retain_fields(&mut self, keep: &dyn Fn(&str) -> bool) {
        match self {
            EntityPatch::Board(patch) => patch.retain_fields(keep),
            EntityPatch::Card(patch) => patch.retain_fields(keep),
            EntityPatch::Task(patch) => patch.retain_fields(keep),
            EntityPatch::Invitation(patch) => patch.retain_fields(keep),
            EntityPatch::Notification(patch) => patch.retain_fields(keep),
        }
    }

    /// Board the delta belongs to, when it names one.
    pub fn board_id(&self) -> Option<&str> {
        match self {
            EntityPatch::Board(patch) => Some(patch.id()),
            EntityPatch::Card(patch) => patch.board_id.as_deref(),
            EntityPatch::Task(patch) => patch.board_id.as_deref(),
            EntityPatch::Invitation(patch) => patch.board_id.as_deref(),
            EntityPatch::Notification(_) => None,
        }
    }
}

impl From<BoardPatch> for EntityPatch {
    fn from(patch: BoardPatch) -> Self {
        EntityPatch::Board(patch)
    }
}

impl From<CardPatch> for EntityPatch {
    fn from(patch: CardPatch) -> Self {
        EntityPatch::Card(patch)
    }
}

impl From<TaskPatch> for EntityPatch {
    fn from(patch: TaskPatch) -> Self {
        EntityPatch::Task(patch)
    }
}

impl From<InvitationPatch> for EntityPatch {
    fn from(patch: InvitationPatch) -> Self {
        EntityPatch::Invitation(patch)
    }
}

impl From<NotificationPatch> for EntityPatch {
    fn from(patch: NotificationPatch) -> Self {
        EntityPatch::Notification(patch)
    }
}

/// One authoritative change to fold into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Upsert(EntityPatch),
    Remove(EntityRef),
    /// Bulk positions for the children of one parent, applied as given.
    Reposition {
        kind: EntityKind,
        parent_id: String,
        positions: Vec<Slot>,
    },
    /// A member joined or left a board. Without a member id the board is
    /// refetched instead.
    Membership {
        board_id: String,
        member_id: Option<String>,
        joined: bool,
    },
    AttachmentAdded {
        task_id: String,
        attachment: Attachment,
    },
    AttachmentRemoved {
        task_id: String,
        attachment_id: String,
    },
}

/// Which slice of server state should be fetched again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RefetchScope {
    Boards,
    Board { board_id: String },
    BoardCards { board_id: String },
    CardTasks { board_id: String, card_id: String },
    Invitations,
    Notifications,
}

impl RefetchScope {
    pub fn board(board_id: impl Into<String>) -> Self {
        RefetchScope::Board {
            board_id: board_id.into(),
        }
    }

    pub fn board_cards(board_id: impl Into<String>) -> Self {
        RefetchScope::BoardCards {
            board_id: board_id.into(),
        }
    }

    pub fn card_tasks(board_id: impl Into<String>, card_id: impl Into<String>) -> Self {
        RefetchScope::CardTasks {
            board_id: board_id.into(),
            card_id: card_id.into(),
        }
    }

    /// Board whose state this scope covers, if any.
    pub fn board_id(&self) -> Option<&str> {
        match self {
            RefetchScope::Board { board_id }
            | RefetchScope::BoardCards { board_id }
            | RefetchScope::CardTasks { board_id, .. } => Some(board_id),
            RefetchScope::Boards | RefetchScope::Invitations | RefetchScope::Notifications => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Unchanged,
    Inserted,
    Merged,
    Removed { target: EntityRef, cascaded: usize },
    Repositioned { count: usize },
}

/// Result of reconciling one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub effect: Effect,
    pub refetch: Option<RefetchScope>,
}

impl Outcome {
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            refetch: None,
        }
    }

    pub fn unchanged() -> Self {
        Self::new(Effect::Unchanged)
    }

    pub fn refetch(effect: Effect, scope: Option<RefetchScope>) -> Self {
        Self {
            effect,
            refetch: scope,
        }
    }

    pub fn or_refetch(mut self, scope: Option<RefetchScope>) -> Self {
        if self.refetch.is_none() {
            self.refetch = scope;
        }
        self
    }
}

/// Reconciles one change inside an open transaction.
pub fn apply(txn: &mut StoreTxn<'_>, change: Change, filter: FieldFilter<'_>) -> Outcome {
    match change {
        Change::Upsert(patch) => apply_patch(txn, patch, filter),
        Change::Remove(target) => remove(txn, target),
        Change::Reposition {
            kind,
            parent_id,
            positions,
        } => reposition(txn, kind, &parent_id, &positions),
        Change::Membership {
            board_id,
            member_id,
            joined,
        } => membership(txn, &board_id, member_id, joined),
        Change::AttachmentAdded {
            task_id,
            attachment,
        } => attachment_added(txn, &task_id, attachment),
        Change::AttachmentRemoved {
            task_id,
            attachment_id,
        } => attachment_removed(txn, &task_id, &attachment_id),
    }
}

/// Reconciles one change as its own transaction.
pub fn apply_to_store(store: &EntityStore, change: Change, filter: FieldFilter<'_>) -> Outcome {
    store.transaction(|txn| apply(txn, change, filter))
}

/// Writes a client-side guess. Present fields overwrite, nothing is
/// renumbered and incomplete inserts are refused.
pub fn apply_local(txn: &mut StoreTxn<'_>, patch: EntityPatch) -> crate::errors::Result<Effect> {
    match patch {
        EntityPatch::Board(patch) => merge_local::<Board>(txn, patch),
        EntityPatch::Card(patch) => merge_local::<Card>(txn, patch),
        EntityPatch::Task(patch) => merge_local::<Task>(txn, patch),
        EntityPatch::Invitation(patch) => merge_local::<Invitation>(txn, patch),
        EntityPatch::Notification(patch) => merge_local::<Notification>(txn, patch),
    }
}

fn merge_local<E: StoredEntity>(
    txn: &mut StoreTxn<'_>,
    patch: E::Patch,
) -> crate::errors::Result<Effect> {
    match txn.get::<E>(patch.id()).cloned() {
        Some(current) => {
            let merged = current.merge(&patch);
            if merged == current {
                return Ok(Effect::Unchanged);
            }
            txn.upsert(merged);
            Ok(Effect::Merged)
        }
        None => {
            txn.upsert(E::from_patch(patch)?);
            Ok(Effect::Inserted)
        }
    }
}

fn apply_patch(txn: &mut StoreTxn<'_>, patch: EntityPatch, filter: FieldFilter<'_>) -> Outcome {
    match patch {
        EntityPatch::Board(patch) => {
            let scope = Some(RefetchScope::Boards);
            upsert::<Board>(txn, patch, filter, scope)
        }
        EntityPatch::Card(patch) => {
            let scope = patch.board_id.clone().map(RefetchScope::board_cards);
            upsert::<Card>(txn, patch, filter, scope)
        }
        EntityPatch::Task(patch) => apply_task(txn, patch, filter),
        EntityPatch::Invitation(patch) => {
            let accepted = patch.status == Some(InvitationStatus::Accepted);
            let outcome = upsert::<Invitation>(txn, patch, filter, Some(RefetchScope::Invitations));
            if accepted && outcome.effect != Effect::Unchanged {
                // Membership is owned by the board record on the service.
                outcome.or_refetch(Some(RefetchScope::Boards))
            } else {
                outcome
            }
        }
        EntityPatch::Notification(patch) => {
            upsert::<Notification>(txn, patch, filter, Some(RefetchScope::Notifications))
        }
    }
}

fn apply_task(txn: &mut StoreTxn<'_>, patch: TaskPatch, filter: FieldFilter<'_>) -> Outcome {
    let task_id = patch.id.clone();
    let existing = txn.get::<Task>(&task_id).cloned();
    let board_id = patch
        .board_id
        .clone()
        .or_else(|| existing.as_ref().map(|task| task.board_id.clone()));
    let card_id = patch
        .card_id
        .clone()
        .or_else(|| existing.as_ref().map(|task| task.card_id.clone()));
    let card_known = card_id
        .as_deref()
        .is_some_and(|card_id| txn.get::<Card>(card_id).is_some());

    if existing.is_none() && !card_known {
        debug!(
            "Task {} targets unknown card {:?}, refetching instead of inserting",
            task_id, card_id
        );
        return Outcome::refetch(Effect::Unchanged, board_id.map(RefetchScope::board));
    }

    let incomplete_scope = match (&board_id, &card_id) {
        (Some(board_id), Some(card_id)) => Some(RefetchScope::card_tasks(board_id, card_id)),
        (Some(board_id), None) => Some(RefetchScope::board(board_id)),
        _ => None,
    };
    let outcome = upsert::<Task>(txn, patch, filter, incomplete_scope);

    let moved_to_unknown = txn
        .get::<Task>(&task_id)
        .is_some_and(|task| txn.get::<Card>(&task.card_id).is_none());
    if moved_to_unknown {
        // The task stays under its new card id until the refetch brings the
        // card in or drops the task.
        return outcome.or_refetch(board_id.map(RefetchScope::board));
    }
    outcome
}

fn upsert<E: StoredEntity>(
    txn: &mut StoreTxn<'_>,
    mut patch: E::Patch,
    filter: FieldFilter<'_>,
    incomplete_scope: Option<RefetchScope>,
) -> Outcome {
    let target = EntityRef::new(E::KIND, patch.id());
    patch.retain_fields(&|field| filter(&target, field));

    match txn.get::<E>(&target.id).cloned() {
        Some(current) => {
            if patch.is_empty() {
                return Outcome::unchanged();
            }
            let claimed = E::patch_position(&patch);
            let merged = current.merge(&patch);
            let changed = merged != current;
            let source_parent = current.parent_id().map(str::to_string);
            let target_parent = merged.parent_id().map(str::to_string);
            txn.upsert(merged);

            let mut shifted = 0;
            if let (Some(position), Some(target_parent)) = (claimed, target_parent.as_deref()) {
                shifted +=
                    renumber::<E>(txn, target_parent, Some((target.id.as_str(), position)));
                if let Some(source_parent) = source_parent.as_deref() {
                    if source_parent != target_parent {
                        shifted += renumber::<E>(txn, source_parent, None);
                    }
                }
            }

            debug!(
                "Merged {} ({} fields, {} siblings shifted)",
                target,
                patch.touched_fields().len(),
                shifted
            );
            if changed || shifted > 0 {
                Outcome::new(Effect::Merged)
            } else {
                Outcome::unchanged()
            }
        }
        None => {
            let ordered = matches!(E::KIND, EntityKind::Card | EntityKind::Task);
            if ordered && E::patch_position(&patch).is_none() {
                // Appended at the end of its parent.
                if let Some(parent) = E::patch_parent(&patch).map(str::to_string) {
                    let count = txn.children::<E>(&parent).len() as i64;
                    E::set_patch_position(&mut patch, count);
                }
            }
            match E::from_patch(patch) {
                Ok(entity) => {
                    let claimed = entity.position();
                    let parent = entity.parent_id().map(str::to_string);
                    txn.upsert(entity);
                    if let (Some(position), Some(parent)) = (claimed, parent.as_deref()) {
                        renumber::<E>(txn, parent, Some((target.id.as_str(), position)));
                    }
                    debug!("Inserted {}", target);
                    Outcome::new(Effect::Inserted)
                }
                Err(err) => {
                    warn!("Cannot insert {}: {}", target, err);
                    Outcome::refetch(Effect::Unchanged, incomplete_scope)
                }
            }
        }
    }
}

/// Renumbers the children of `parent_id` densely. Returns how many siblings
/// other than the anchor moved.
fn renumber<E: StoredEntity>(
    txn: &mut StoreTxn<'_>,
    parent_id: &str,
    anchor: Option<(&str, i64)>,
) -> usize {
    let slots: Vec<Slot> = txn
        .children::<E>(parent_id)
        .iter()
        .filter_map(|entity| entity.position().map(|position| Slot::new(entity.id(), position)))
        .collect();
    let anchor = anchor.map(|(id, position)| (id, position.max(0) as usize));
    let anchor_id = anchor.map(|(id, _)| id.to_string());

    let mut shifted = 0;
    for slot in dense_order(&slots, anchor) {
        if txn.set_position::<E>(&slot.id, slot.position) && Some(&slot.id) != anchor_id.as_ref() {
            shifted += 1;
        }
    }
    shifted
}

fn remove(txn: &mut StoreTxn<'_>, target: EntityRef) -> Outcome {
    let parent = match target.kind {
        EntityKind::Card => txn
            .get::<Card>(&target.id)
            .map(|card| card.board_id.clone()),
        EntityKind::Task => txn.get::<Task>(&target.id).map(|task| task.card_id.clone()),
        _ => None,
    };

    let removed = txn.remove_ref(&target);
    if removed == 0 {
        return Outcome::unchanged();
    }
    if let Some(parent) = parent.as_deref() {
        match target.kind {
            EntityKind::Card => {
                renumber::<Card>(txn, parent, None);
            }
            EntityKind::Task => {
                renumber::<Task>(txn, parent, None);
            }
            _ => {}
        }
    }
    debug!("Removed {} and {} owned entities", target, removed - 1);
    Outcome::new(Effect::Removed {
        target,
        cascaded: removed - 1,
    })
}

/// Writes a bulk reorder under `parent_id` and renumbers the remaining
/// siblings around it. Returns how many entities moved and whether the
/// payload named entities that are not children of the parent.
fn settle<E: StoredEntity>(
    txn: &mut StoreTxn<'_>,
    parent_id: &str,
    positions: &[Slot],
) -> (usize, bool) {
    let siblings: Vec<Slot> = txn
        .children::<E>(parent_id)
        .iter()
        .filter_map(|entity| entity.position().map(|position| Slot::new(entity.id(), position)))
        .collect();
    let unknown = positions
        .iter()
        .any(|slot| !siblings.iter().any(|sibling| sibling.id == slot.id));

    let mut count = 0;
    for slot in settle_order(&siblings, positions) {
        if txn.set_position::<E>(&slot.id, slot.position) {
            count += 1;
        }
    }
    (count, unknown)
}

fn reposition(
    txn: &mut StoreTxn<'_>,
    kind: EntityKind,
    parent_id: &str,
    positions: &[Slot],
) -> Outcome {
    let (count, unknown) = match kind {
        EntityKind::Card => settle::<Card>(txn, parent_id, positions),
        EntityKind::Task => settle::<Task>(txn, parent_id, positions),
        _ => (0, false),
    };

    let effect = if count > 0 {
        Effect::Repositioned { count }
    } else {
        Effect::Unchanged
    };
    if !unknown {
        return Outcome::new(effect);
    }

    let scope = match kind {
        EntityKind::Card => Some(RefetchScope::board_cards(parent_id)),
        EntityKind::Task => txn
            .get::<Card>(parent_id)
            .map(|card| RefetchScope::card_tasks(card.board_id.clone(), parent_id)),
        _ => None,
    };
    warn!(
        "Reposition of {} under {} names unknown entities",
        kind, parent_id
    );
    Outcome::refetch(effect, scope)
}

fn membership(
    txn: &mut StoreTxn<'_>,
    board_id: &str,
    member_id: Option<String>,
    joined: bool,
) -> Outcome {
    let Some(board) = txn.get::<Board>(board_id).cloned() else {
        return Outcome::unchanged();
    };
    let Some(member_id) = member_id else {
        return Outcome::refetch(Effect::Unchanged, Some(RefetchScope::board(board_id)));
    };

    let mut members = board.members.clone();
    let changed = if joined {
        members.insert(member_id)
    } else {
        members.remove(&member_id)
    };
    if !changed {
        return Outcome::unchanged();
    }
    let mut patch = BoardPatch::new(board_id);
    patch.members = Some(members);
    txn.upsert(board.merge(&patch));
    Outcome::new(Effect::Merged)
}

fn attachment_added(txn: &mut StoreTxn<'_>, task_id: &str, attachment: Attachment) -> Outcome {
    let Some(task) = txn.get::<Task>(task_id).cloned() else {
        return Outcome::unchanged();
    };
    let mut attachments = task.github_attachments.clone();
    match attachments.iter_mut().find(|current| current.id == attachment.id) {
        Some(current) if *current == attachment => return Outcome::unchanged(),
        Some(current) => *current = attachment,
        None => attachments.push(attachment),
    }
    let mut patch = TaskPatch::new(task_id);
    patch.github_attachments = Some(attachments);
    txn.upsert(task.merge(&patch));
    Outcome::new(Effect::Merged)
}

fn attachment_removed(txn: &mut StoreTxn<'_>, task_id: &str, attachment_id: &str) -> Outcome {
    let Some(task) = txn.get::<Task>(task_id).cloned() else {
        return Outcome::unchanged();
    };
    if !task
        .github_attachments
        .iter()
        .any(|attachment| attachment.id == attachment_id)
    {
        return Outcome::unchanged();
    }
    let mut patch = TaskPatch::new(task_id);
    patch.github_attachments = Some(
        task.github_attachments
            .iter()
            .filter(|attachment| attachment.id != attachment_id)
            .cloned()
            .collect(),
    );
    txn.upsert(task.merge(&patch));
    Outcome::new(Effect::Merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttachmentKind, Priority};
    use std::collections::BTreeSet;

    fn board(id: &str) -> Board {
        Board {
            id: id.into(),
            name: "Roadmap".into(),
            description: None,
            owner_id: "u1".into(),
            members: BTreeSet::from(["u1".to_string()]),
            created_at: None,
            updated_at: None,
        }
    }

    fn card(id: &str, board: &str, position: i64) -> Card {
        Card {
            id: id.into(),
            board_id: board.into(),
            name: id.to_uppercase(),
            description: None,
            position,
            created_at: None,
            updated_at: None,
        }
    }

    fn task(id: &str, card: &str, position: i64) -> Task {
        Task {
            id: id.into(),
            board_id: "b1".into(),
            card_id: card.into(),
            title: id.to_uppercase(),
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

    fn seeded() -> EntityStore {
        let store = EntityStore::new();
        store.transaction(|txn| {
            txn.upsert(board("b1"));
            txn.upsert(card("c1", "b1", 0));
            txn.upsert(card("c2", "b1", 1));
            txn.upsert(task("t1", "c1", 0));
            txn.upsert(task("t2", "c1", 1));
            txn.upsert(task("t3", "c2", 0));
        });
        store
    }

    fn task_order(store: &EntityStore, card_id: &str) -> Vec<(String, i64)> {
        store
            .tasks_for_card(card_id)
            .into_iter()
            .map(|task| (task.id, task.position))
            .collect()
    }

    #[test]
    fn empty_delta_leaves_entity_untouched() {
        let store = seeded();
        let before = store.snapshot();
        let outcome = apply_to_store(
            &store,
            Change::Upsert(TaskPatch::new("t1").into()),
            &accept_all,
        );
        assert_eq!(outcome, Outcome::unchanged());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn explicit_null_clears_and_absent_preserves() {
        let store = seeded();
        store.transaction(|txn| {
            let mut seeded = task("t1", "c1", 0);
            seeded.description = Some("old".into());
            seeded.priority = Priority::High;
            txn.upsert(seeded);
        });

        let mut patch = TaskPatch::new("t1");
        patch.description = Some(None);
        apply_to_store(&store, Change::Upsert(patch.into()), &accept_all);

        let merged = store.get::<Task>("t1").unwrap();
        assert_eq!(merged.description, None);
        assert_eq!(merged.priority, Priority::High);
    }

    #[test]
    fn insert_without_position_appends() {
        let store = seeded();
        let mut patch = TaskPatch::new("t9");
        patch.board_id = Some("b1".into());
        patch.card_id = Some("c1".into());
        patch.title = Some("New".into());

        let outcome = apply_to_store(&store, Change::Upsert(patch.into()), &accept_all);
        assert_eq!(outcome.effect, Effect::Inserted);
        assert_eq!(
            task_order(&store, "c1"),
            vec![("t1".into(), 0), ("t2".into(), 1), ("t9".into(), 2)]
        );
    }

    #[test]
    fn incomplete_insert_asks_for_refetch() {
        let store = seeded();
        let mut patch = TaskPatch::new("t9");
        patch.board_id = Some("b1".into());
        patch.card_id = Some("c1".into());

        let outcome = apply_to_store(&store, Change::Upsert(patch.into()), &accept_all);
        assert_eq!(outcome.effect, Effect::Unchanged);
        assert_eq!(outcome.refetch, Some(RefetchScope::card_tasks("b1", "c1")));
        assert!(store.get::<Task>("t9").is_none());
    }

    #[test]
    fn new_task_for_unknown_card_is_not_inserted() {
        let store = seeded();
        let mut patch = TaskPatch::new("t9");
        patch.board_id = Some("b1".into());
        patch.card_id = Some("c404".into());
        patch.title = Some("Orphan".into());
        patch.position = Some(0);

        let outcome = apply_to_store(&store, Change::Upsert(patch.into()), &accept_all);
        assert_eq!(outcome.refetch, Some(RefetchScope::board("b1")));
        assert!(store.get::<Task>("t9").is_none());
    }

    #[test]
    fn positioned_delta_renumbers_both_parents() {
        let store = seeded();
        let mut patch = TaskPatch::new("t1");
        patch.card_id = Some("c2".into());
        patch.position = Some(0);

        let outcome = apply_to_store(&store, Change::Upsert(patch.into()), &accept_all);
        assert_eq!(outcome.effect, Effect::Merged);
        assert_eq!(task_order(&store, "c1"), vec![("t2".into(), 0)]);
        assert_eq!(
            task_order(&store, "c2"),
            vec![("t1".into(), 0), ("t3".into(), 1)]
        );
    }

    #[test]
    fn deleting_a_board_cascades() {
        let store = seeded();
        store.upsert(Invitation {
            id: "i1".into(),
            board_id: "b1".into(),
            invitee_email: "dana@example.com".into(),
            invited_by: Some("u1".into()),
            status: InvitationStatus::Pending,
            created_at: None,
            updated_at: None,
        });

        let outcome = apply_to_store(&store, Change::Remove(EntityRef::board("b1")), &accept_all);
        assert_eq!(
            outcome.effect,
            Effect::Removed {
                target: EntityRef::board("b1"),
                cascaded: 6,
            }
        );
        let state = store.snapshot();
        assert_eq!(state.len::<Card>(), 0);
        assert_eq!(state.len::<Task>(), 0);
        assert_eq!(state.len::<Invitation>(), 0);
    }

    #[test]
    fn deleting_a_task_compacts_its_card() {
        let store = seeded();
        apply_to_store(&store, Change::Remove(EntityRef::task("t1")), &accept_all);
        assert_eq!(task_order(&store, "c1"), vec![("t2".into(), 0)]);
    }

    #[test]
    fn removing_something_unknown_is_unchanged() {
        let store = seeded();
        let outcome = apply_to_store(&store, Change::Remove(EntityRef::card("nope")), &accept_all);
        assert_eq!(outcome, Outcome::unchanged());
    }

    #[test]
    fn reposition_applies_positions_verbatim() {
        let store = seeded();
        let outcome = apply_to_store(
            &store,
            Change::Reposition {
                kind: EntityKind::Task,
                parent_id: "c1".into(),
                positions: vec![Slot::new("t1", 1), Slot::new("t2", 0)],
            },
            &accept_all,
        );
        assert_eq!(outcome.effect, Effect::Repositioned { count: 2 });
        assert_eq!(
            task_order(&store, "c1"),
            vec![("t2".into(), 0), ("t1".into(), 1)]
        );
    }

    #[test]
    fn reposition_naming_strangers_refetches() {
        let store = seeded();
        let outcome = apply_to_store(
            &store,
            Change::Reposition {
                kind: EntityKind::Card,
                parent_id: "b1".into(),
                positions: vec![Slot::new("c2", 0), Slot::new("c77", 1)],
            },
            &accept_all,
        );
        assert_eq!(outcome.refetch, Some(RefetchScope::board_cards("b1")));
        assert_eq!(store.get::<Card>("c2").unwrap().position, 0);
    }

    #[test]
    fn partial_reposition_keeps_positions_dense() {
        let store = seeded();
        store.transaction(|txn| txn.upsert(task("t4", "c1", 2)));
        let outcome = apply_to_store(
            &store,
            Change::Reposition {
                kind: EntityKind::Task,
                parent_id: "c1".into(),
                positions: vec![Slot::new("t4", 0)],
            },
            &accept_all,
        );
        assert_eq!(outcome.effect, Effect::Repositioned { count: 3 });
        assert_eq!(
            task_order(&store, "c1"),
            vec![("t4".into(), 0), ("t1".into(), 1), ("t2".into(), 2)]
        );
    }

    #[test]
    fn filtered_fields_are_not_written() {
        let store = seeded();
        let mut patch = TaskPatch::new("t1");
        patch.title = Some("Pushed".into());
        patch.completed = Some(true);
        let claimed = |target: &EntityRef, field: &str| !(target.id == "t1" && field == "title");

        apply_to_store(&store, Change::Upsert(patch.into()), &claimed);
        let merged = store.get::<Task>("t1").unwrap();
        assert_eq!(merged.title, "T1");
        assert!(merged.completed);
    }

    #[test]
    fn accepted_invitation_refetches_boards() {
        let store = seeded();
        let mut patch = InvitationPatch::new("i1");
        patch.board_id = Some("b1".into());
        patch.invitee_email = Some("dana@example.com".into());
        patch.status = Some(InvitationStatus::Accepted);

        let outcome = apply_to_store(&store, Change::Upsert(patch.into()), &accept_all);
        assert_eq!(outcome.effect, Effect::Inserted);
        assert_eq!(outcome.refetch, Some(RefetchScope::Boards));
        // Membership is left to the refetch.
        assert_eq!(store.get::<Board>("b1").unwrap().members.len(), 1);
    }

    #[test]
    fn membership_changes_member_set() {
        let store = seeded();
        apply_to_store(
            &store,
            Change::Membership {
                board_id: "b1".into(),
                member_id: Some("u2".into()),
                joined: true,
            },
            &accept_all,
        );
        assert!(store.get::<Board>("b1").unwrap().members.contains("u2"));

        let outcome = apply_to_store(
            &store,
            Change::Membership {
                board_id: "b1".into(),
                member_id: None,
                joined: false,
            },
            &accept_all,
        );
        assert_eq!(outcome.refetch, Some(RefetchScope::board("b1")));
    }

    #[test]
    fn attachments_are_added_once_and_removed() {
        let store = seeded();
        let attachment = Attachment {
            id: "a1".into(),
            kind: AttachmentKind::PullRequest,
            repository: "acme/web".into(),
            reference: "42".into(),
            title: Some("Fix login".into()),
            url: None,
            state: Some("open".into()),
        };
        let added = Change::AttachmentAdded {
            task_id: "t1".into(),
            attachment,
        };

        assert_eq!(
            apply_to_store(&store, added.clone(), &accept_all).effect,
            Effect::Merged
        );
        assert_eq!(
            apply_to_store(&store, added, &accept_all).effect,
            Effect::Unchanged
        );
        assert_eq!(store.get::<Task>("t1").unwrap().github_attachments.len(), 1);

        apply_to_store(
            &store,
            Change::AttachmentRemoved {
                task_id: "t1".into(),
                attachment_id: "a1".into(),
            },
            &accept_all,
        );
        assert!(store.get::<Task>("t1").unwrap().github_attachments.is_empty());
    }

    #[test]
    fn snapshot_replacement_prunes_and_keeps_placeholders() {
        let store = seeded();
        store.upsert(card("local-1234", "b1", 2));

        let mut refreshed = CardPatch::new("c2");
        refreshed.name = Some("Doing".into());
        let summary = store.transaction(|txn| {
            replace_snapshot::<Card, _>(
                txn,
                |card: &Card| card.board_id == "b1",
                vec![refreshed],
                &accept_all,
            )
        });

        assert_eq!(
            summary,
            SnapshotSummary {
                applied: 1,
                removed: 1,
                skipped: 0,
            }
        );
        assert!(store.get::<Card>("c1").is_none());
        assert!(store.get::<Task>("t1").is_none());
        assert_eq!(store.get::<Card>("c2").unwrap().name, "Doing");
        assert!(store.get::<Card>("local-1234").is_some());
    }
}
