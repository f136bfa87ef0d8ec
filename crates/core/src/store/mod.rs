//! The entity store: the single in-memory copy of everything the client knows.
//!
//! Writes go through [`EntityStore::transaction`] (or one of the single-write
//! helpers built on it). A transaction is run to completion under the write
//! lock, then one [`StoreChange`] describing the whole batch is published on
//! the change bus. Publishing happens after the lock is released.

mod entity;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

pub use entity::{EntityKind, EntityRef, StoredEntity};

use crate::bus::{EventBus, Listener, Subscription};
use crate::errors::MutationFailure;
use crate::models::{Board, Card, Invitation, InvitationStatus, Notification, Task};

/// Raw tables, one per entity kind, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub(crate) boards: BTreeMap<String, Board>,
    pub(crate) cards: BTreeMap<String, Card>,
    pub(crate) tasks: BTreeMap<String, Task>,
    pub(crate) invitations: BTreeMap<String, Invitation>,
    pub(crate) notifications: BTreeMap<String, Notification>,
}

impl StoreState {
    pub fn get<E: StoredEntity>(&self, id: &str) -> Option<&E> {
        E::table(self).get(id)
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity.kind {
            EntityKind::Board => self.boards.contains_key(&entity.id),
            EntityKind::Card => self.cards.contains_key(&entity.id),
            EntityKind::Task => self.tasks.contains_key(&entity.id),
            EntityKind::Invitation => self.invitations.contains_key(&entity.id),
            EntityKind::Notification => self.notifications.contains_key(&entity.id),
        }
    }

    pub fn len<E: StoredEntity>(&self) -> usize {
        E::table(self).len()
    }

    /// Entities matching `predicate`, in canonical order.
    pub fn list<E, P>(&self, predicate: P) -> Vec<E>
    where
        E: StoredEntity,
        P: Fn(&E) -> bool,
    {
        let mut items: Vec<E> = E::table(self)
            .values()
            .filter(|entity| predicate(entity))
            .cloned()
            .collect();
        items.sort_by(E::sort_cmp);
        items
    }

    /// Ordered children of `parent_id`.
    pub fn children<E: StoredEntity>(&self, parent_id: &str) -> Vec<E> {
        self.list(|entity: &E| entity.parent_id() == Some(parent_id))
    }
}

/// What one transaction did. Removal wins over an upsert of the same entity
/// within a batch, and an upsert after a removal re-adds it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreChange {
    pub upserted: BTreeSet<EntityRef>,
    pub removed: BTreeSet<EntityRef>,
    pub error_changed: bool,
}

impl StoreChange {
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.removed.is_empty() && !self.error_changed
    }

    pub fn touches(&self, entity: &EntityRef) -> bool {
        self.upserted.contains(entity) || self.removed.contains(entity)
    }

    pub fn touches_kind(&self, kind: EntityKind) -> bool {
        self.upserted
            .iter()
            .chain(self.removed.iter())
            .any(|entity| entity.kind == kind)
    }

    fn record_upsert(&mut self, entity: EntityRef) {
        self.removed.remove(&entity);
        self.upserted.insert(entity);
    }

    fn record_removal(&mut self, entity: EntityRef) {
        self.upserted.remove(&entity);
        self.removed.insert(entity);
    }
}

/// Write access to the store for the duration of one transaction.
pub struct StoreTxn<'a> {
    state: &'a mut StoreState,
    change: StoreChange,
}

impl<'a> StoreTxn<'a> {
    fn new(state: &'a mut StoreState) -> Self {
        Self {
            state,
            change: StoreChange::default(),
        }
    }

    pub fn state(&self) -> &StoreState {
        self.state
    }

    pub fn get<E: StoredEntity>(&self, id: &str) -> Option<&E> {
        self.state.get(id)
    }

    pub fn children<E: StoredEntity>(&self, parent_id: &str) -> Vec<E> {
        self.state.children(parent_id)
    }

    /// Inserts or replaces an entity as a whole.
    pub fn upsert<E: StoredEntity>(&mut self, entity: E) {
        let entity_ref = entity.entity_ref();
        let table = E::table_mut(self.state);
        if table.get(&entity_ref.id).is_some_and(|current| *current == entity) {
            return;
        }
        table.insert(entity_ref.id.clone(), entity);
        self.change.record_upsert(entity_ref);
    }

    /// Rewrites one entity's position. Returns false when nothing changed.
    pub fn set_position<E: StoredEntity>(&mut self, id: &str, position: i64) -> bool {
        let Some(entity) = E::table_mut(self.state).get_mut(id) else {
            return false;
        };
        if entity.position() == Some(position) {
            return false;
        }
        entity.set_position(position);
        self.change.record_upsert(EntityRef::new(E::KIND, id));
        true
    }

    /// Removes an entity together with everything it owns: a board takes its
    /// cards, tasks and invitations with it, a card its tasks.
    pub fn remove<E: StoredEntity>(&mut self, id: &str) -> Option<E> {
        let removed = E::table_mut(self.state).remove(id)?;
        self.change.record_removal(EntityRef::new(E::KIND, id));
        match E::KIND {
            EntityKind::Board => {
                self.remove_matching::<Card, _>(|card| card.board_id == id);
                self.remove_matching::<Task, _>(|task| task.board_id == id);
                self.remove_matching::<Invitation, _>(|invitation| invitation.board_id == id);
            }
            EntityKind::Card => {
                self.remove_matching::<Task, _>(|task| task.card_id == id);
            }
            EntityKind::Task | EntityKind::Invitation | EntityKind::Notification => {}
        }
        Some(removed)
    }

    /// Type-erased [`StoreTxn::remove`]. Returns how many entities went,
    /// the target included.
    pub fn remove_ref(&mut self, entity: &EntityRef) -> usize {
        let before = self.change.removed.len();
        let found = match entity.kind {
            EntityKind::Board => self.remove::<Board>(&entity.id).is_some(),
            EntityKind::Card => self.remove::<Card>(&entity.id).is_some(),
            EntityKind::Task => self.remove::<Task>(&entity.id).is_some(),
            EntityKind::Invitation => self.remove::<Invitation>(&entity.id).is_some(),
            EntityKind::Notification => self.remove::<Notification>(&entity.id).is_some(),
        };
        if found {
            self.change.removed.len() - before
        } else {
            0
        }
    }

    /// Replaces every entity for which `in_scope` holds with `incoming`.
    /// Entities in scope but absent from `incoming` are removed (with their
    /// children); returns how many of those there were.
    pub fn replace_where<E, P>(&mut self, in_scope: P, incoming: Vec<E>) -> usize
    where
        E: StoredEntity,
        P: Fn(&E) -> bool,
    {
        let keep: BTreeSet<&str> = incoming.iter().map(|entity| entity.id()).collect();
        let stale: Vec<String> = E::table(self.state)
            .values()
            .filter(|entity| in_scope(entity) && !keep.contains(entity.id()))
            .map(|entity| entity.id().to_string())
            .collect();
        drop(keep);
        for id in &stale {
            self.remove::<E>(id);
        }
        for entity in incoming {
            self.upsert(entity);
        }
        stale.len()
    }

    /// Replaces every child of `parent_id` with `incoming`.
    pub fn replace_children<E: StoredEntity>(&mut self, parent_id: &str, incoming: Vec<E>) -> usize {
        self.replace_where(|entity: &E| entity.parent_id() == Some(parent_id), incoming)
    }

    fn remove_matching<E, P>(&mut self, predicate: P) -> usize
    where
        E: StoredEntity,
        P: Fn(&E) -> bool,
    {
        let ids: Vec<String> = E::table(self.state)
            .values()
            .filter(|entity| predicate(entity))
            .map(|entity| entity.id().to_string())
            .collect();
        for id in &ids {
            self.remove::<E>(id);
        }
        ids.len()
    }

    fn into_change(self) -> StoreChange {
        self.change
    }
}

#[derive(Default)]
struct StoreInner {
    state: StoreState,
    last_error: Option<MutationFailure>,
}

/// Shared, explicitly constructed entity store.
#[derive(Default)]
pub struct EntityStore {
    inner: RwLock<StoreInner>,
    changes: EventBus<StoreChange>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against a read-locked view of the tables.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.read_inner().state)
    }

    pub fn get<E: StoredEntity>(&self, id: &str) -> Option<E> {
        self.read(|state| state.get::<E>(id).cloned())
    }

    pub fn list<E, P>(&self, predicate: P) -> Vec<E>
    where
        E: StoredEntity,
        P: Fn(&E) -> bool,
    {
        self.read(|state| state.list(predicate))
    }

    pub fn all<E: StoredEntity>(&self) -> Vec<E> {
        self.list(|_: &E| true)
    }

    /// A copy of every table, for comparison or inspection.
    pub fn snapshot(&self) -> StoreState {
        self.read(StoreState::clone)
    }

    /// Groups several writes into one notification.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut StoreTxn<'_>) -> R) -> R {
        let (result, change) = {
            let mut inner = self.write_inner();
            let mut txn = StoreTxn::new(&mut inner.state);
            let result = f(&mut txn);
            (result, txn.into_change())
        };
        self.publish(change);
        result
    }

    pub fn upsert<E: StoredEntity>(&self, entity: E) {
        self.transaction(|txn| txn.upsert(entity));
    }

    pub fn remove<E: StoredEntity>(&self, id: &str) -> Option<E> {
        self.transaction(|txn| txn.remove::<E>(id))
    }

    pub fn replace_children<E: StoredEntity>(&self, parent_id: &str, incoming: Vec<E>) -> usize {
        self.transaction(|txn| txn.replace_children(parent_id, incoming))
    }

    /// One [`StoreChange`] per committed batch, until the handle is dropped.
    pub fn subscribe(&self) -> Subscription<StoreChange> {
        self.changes.subscribe()
    }

    /// Calls `listener` once per committed batch on a spawned task until the
    /// handle is released.
    pub fn listen<F>(&self, listener: F) -> Listener
    where
        F: Fn(&StoreChange) + Send + Sync + 'static,
    {
        self.changes.listen(listener)
    }

    pub fn record_error(&self, failure: MutationFailure) {
        debug!("Recording store error: {}", failure);
        self.write_inner().last_error = Some(failure);
        self.publish(StoreChange {
            error_changed: true,
            ..StoreChange::default()
        });
    }

    pub fn last_error(&self) -> Option<MutationFailure> {
        self.read_inner().last_error.clone()
    }

    pub fn clear_error(&self) -> Option<MutationFailure> {
        let cleared = self.write_inner().last_error.take();
        if cleared.is_some() {
            self.publish(StoreChange {
                error_changed: true,
                ..StoreChange::default()
            });
        }
        cleared
    }

    pub fn cards_for_board(&self, board_id: &str) -> Vec<Card> {
        self.read(|state| state.children(board_id))
    }

    pub fn tasks_for_card(&self, card_id: &str) -> Vec<Task> {
        self.read(|state| state.children(card_id))
    }

    pub fn pending_invitations(&self) -> Vec<Invitation> {
        self.list(|invitation: &Invitation| invitation.status == InvitationStatus::Pending)
    }

    pub fn board_invitations(&self, board_id: &str) -> Vec<Invitation> {
        self.read(|state| state.children(board_id))
    }

    pub fn unread_notification_count(&self) -> usize {
        self.read(|state| {
            state
                .notifications
                .values()
                .filter(|notification| !notification.read)
                .count()
        })
    }

    fn publish(&self, change: StoreChange) {
        if change.is_empty() {
            return;
        }
        debug!(
            "Store change: {} upserted, {} removed",
            change.upserted.len(),
            change.removed.len()
        );
        self.changes.publish(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RemoteError;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};

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
            priority: Default::default(),
            due_date: None,
            completed: false,
            assigned_to: Default::default(),
            github_attachments: Vec::new(),
            position,
            created_at: None,
            updated_at: None,
        }
    }

    fn notification(id: &str, minute: u32, read: bool) -> Notification {
        Notification {
            id: id.into(),
            kind: "task_assigned".into(),
            read,
            payload: serde_json::Value::Null,
            created_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()),
        }
    }

    #[test]
    fn cards_list_by_position_then_id() {
        let store = EntityStore::new();
        store.transaction(|txn| {
            txn.upsert(card("c3", "b1", 1));
            txn.upsert(card("c2", "b1", 0));
            txn.upsert(card("c1", "b1", 1));
            txn.upsert(card("x", "b2", 0));
        });

        let ids: Vec<String> = store
            .cards_for_board("b1")
            .into_iter()
            .map(|card| card.id)
            .collect();
        assert_eq!(ids, vec!["c2", "c1", "c3"]);
    }

    #[test]
    fn notifications_list_newest_first() {
        let store = EntityStore::new();
        store.upsert(notification("n1", 1, true));
        store.upsert(notification("n2", 5, false));
        store.upsert(notification("n3", 3, false));

        let ids: Vec<String> = store
            .all::<Notification>()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["n2", "n3", "n1"]);
        assert_eq!(store.unread_notification_count(), 2);
    }

    #[test]
    fn transaction_notifies_once_after_commit() {
        let store = EntityStore::new();
        let mut changes = store.subscribe();

        store.transaction(|txn| {
            txn.upsert(card("c1", "b1", 0));
            txn.upsert(card("c2", "b1", 1));
        });

        let change = changes.try_next().expect("one change");
        assert_eq!(change.upserted.len(), 2);
        assert!(changes.try_next().is_none());
    }

    #[test]
    fn identical_upsert_is_silent() {
        let store = EntityStore::new();
        store.upsert(card("c1", "b1", 0));
        let mut changes = store.subscribe();

        store.upsert(card("c1", "b1", 0));
        assert!(changes.try_next().is_none());
    }

    #[test]
    fn removing_a_card_takes_its_tasks() {
        let store = EntityStore::new();
        store.transaction(|txn| {
            txn.upsert(card("c1", "b1", 0));
            txn.upsert(card("c2", "b1", 1));
            txn.upsert(task("t1", "c1", 0));
            txn.upsert(task("t2", "c1", 1));
            txn.upsert(task("t3", "c2", 0));
        });
        let mut changes = store.subscribe();

        assert!(store.remove::<Card>("c1").is_some());
        assert!(store.tasks_for_card("c1").is_empty());
        assert_eq!(store.tasks_for_card("c2").len(), 1);
        assert_eq!(changes.try_next().expect("removal").removed.len(), 3);
    }

    #[tokio::test]
    async fn listener_can_read_the_store_back() {
        let store = Arc::new(EntityStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let reader = Arc::clone(&store);
        let sink = Arc::clone(&seen);
        let _listener = store.listen(move |change| {
            sink.lock().unwrap().push((change.upserted.len(), reader.all::<Card>().len()));
        });

        store.transaction(|txn| {
            txn.upsert(card("c1", "b1", 0));
            txn.upsert(card("c2", "b1", 1));
        });

        for _ in 0..100 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert_eq!(*seen.lock().unwrap(), vec![(2, 2)]);
    }

    #[test]
    fn replace_children_drops_stale_entries() {
        let store = EntityStore::new();
        store.transaction(|txn| {
            txn.upsert(card("c1", "b1", 0));
            txn.upsert(card("c2", "b1", 1));
            txn.upsert(task("t1", "c2", 0));
            txn.upsert(card("other", "b2", 0));
        });

        store.replace_children("b1", vec![card("c1", "b1", 0), card("c9", "b1", 1)]);

        let ids: Vec<String> = store
            .cards_for_board("b1")
            .into_iter()
            .map(|card| card.id)
            .collect();
        assert_eq!(ids, vec!["c1", "c9"]);
        assert!(store.get::<Task>("t1").is_none());
        assert!(store.get::<Card>("other").is_some());
    }

    #[test]
    fn error_slot_round_trip() {
        let store = EntityStore::new();
        assert!(store.last_error().is_none());
        store.record_error(MutationFailure::new(
            "delete_card",
            Some(EntityRef::card("c1")),
            RemoteError::network("connection reset"),
        ));
        assert_eq!(
            store.last_error().map(|failure| failure.operation),
            Some("delete_card".to_string())
        );
        assert!(store.clear_error().is_some());
        assert!(store.last_error().is_none());
    }
}
