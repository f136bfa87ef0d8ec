use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::StoreState;
use crate::errors::Result;
use crate::models::{
    Board, BoardPatch, Card, CardPatch, Invitation, InvitationPatch, Mergeable, Notification,
    NotificationPatch, Task, TaskPatch,
};

/// Entity types held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Board,
    Card,
    Task,
    Invitation,
    Notification,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Board,
        EntityKind::Card,
        EntityKind::Task,
        EntityKind::Invitation,
        EntityKind::Notification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Board => "board",
            EntityKind::Card => "card",
            EntityKind::Task => "task",
            EntityKind::Invitation => "invitation",
            EntityKind::Notification => "notification",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-tagged entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn board(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Board, id)
    }

    pub fn card(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Card, id)
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Task, id)
    }

    pub fn invitation(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Invitation, id)
    }

    pub fn notification(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Notification, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// An entity type that lives in one table of the store.
///
/// Ordered entities (cards, tasks) report a parent and a position; the rest
/// return `None` for both.
pub trait StoredEntity: Mergeable + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn parent_id(&self) -> Option<&str> {
        None
    }

    fn position(&self) -> Option<i64> {
        None
    }

    fn set_position(&mut self, _position: i64) {}

    /// Canonical listing order.
    fn sort_cmp(a: &Self, b: &Self) -> Ordering;

    /// Builds a new entity out of a patch, failing when a required field is
    /// absent.
    fn from_patch(patch: Self::Patch) -> Result<Self>;

    /// Parent named by a patch, if it names one.
    fn patch_parent(_patch: &Self::Patch) -> Option<&str> {
        None
    }

    fn patch_position(_patch: &Self::Patch) -> Option<i64> {
        None
    }

    fn set_patch_position(_patch: &mut Self::Patch, _position: i64) {}

    fn table(state: &StoreState) -> &BTreeMap<String, Self>;

    fn table_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self>;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::KIND, self.id())
    }
}

fn by_position(a_pos: i64, a_id: &str, b_pos: i64, b_id: &str) -> Ordering {
    a_pos.cmp(&b_pos).then_with(|| a_id.cmp(b_id))
}

impl StoredEntity for Board {
    const KIND: EntityKind = EntityKind::Board;

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_cmp(a: &Self, b: &Self) -> Ordering {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }

    fn from_patch(patch: BoardPatch) -> Result<Self> {
        Self::try_from(patch)
    }

    fn table(state: &StoreState) -> &BTreeMap<String, Self> {
        &state.boards
    }

    fn table_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self> {
        &mut state.boards
    }
}

impl StoredEntity for Card {
    const KIND: EntityKind = EntityKind::Card;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.board_id)
    }

    fn position(&self) -> Option<i64> {
        Some(self.position)
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn sort_cmp(a: &Self, b: &Self) -> Ordering {
        by_position(a.position, &a.id, b.position, &b.id)
    }

    fn from_patch(patch: CardPatch) -> Result<Self> {
        Self::try_from(patch)
    }

    fn patch_parent(patch: &CardPatch) -> Option<&str> {
        patch.board_id.as_deref()
    }

    fn patch_position(patch: &CardPatch) -> Option<i64> {
        patch.position
    }

    fn set_patch_position(patch: &mut CardPatch, position: i64) {
        patch.position = Some(position);
    }

    fn table(state: &StoreState) -> &BTreeMap<String, Self> {
        &state.cards
    }

    fn table_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self> {
        &mut state.cards
    }
}

impl StoredEntity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.card_id)
    }

    fn position(&self) -> Option<i64> {
        Some(self.position)
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn sort_cmp(a: &Self, b: &Self) -> Ordering {
        by_position(a.position, &a.id, b.position, &b.id)
    }

    fn from_patch(patch: TaskPatch) -> Result<Self> {
        Self::try_from(patch)
    }

    fn patch_parent(patch: &TaskPatch) -> Option<&str> {
        patch.card_id.as_deref()
    }

    fn patch_position(patch: &TaskPatch) -> Option<i64> {
        patch.position
    }

    fn set_patch_position(patch: &mut TaskPatch, position: i64) {
        patch.position = Some(position);
    }

    fn table(state: &StoreState) -> &BTreeMap<String, Self> {
        &state.tasks
    }

    fn table_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self> {
        &mut state.tasks
    }
}

impl StoredEntity for Invitation {
    const KIND: EntityKind = EntityKind::Invitation;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.board_id)
    }

    fn sort_cmp(a: &Self, b: &Self) -> Ordering {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }

    fn from_patch(patch: InvitationPatch) -> Result<Self> {
        Self::try_from(patch)
    }

    fn patch_parent(patch: &InvitationPatch) -> Option<&str> {
        patch.board_id.as_deref()
    }

    fn table(state: &StoreState) -> &BTreeMap<String, Self> {
        &state.invitations
    }

    fn table_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self> {
        &mut state.invitations
    }
}

impl StoredEntity for Notification {
    const KIND: EntityKind = EntityKind::Notification;

    fn id(&self) -> &str {
        &self.id
    }

    // Newest first.
    fn sort_cmp(a: &Self, b: &Self) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    }

    fn from_patch(patch: NotificationPatch) -> Result<Self> {
        Self::try_from(patch)
    }

    fn table(state: &StoreState) -> &BTreeMap<String, Self> {
        &state.notifications
    }

    fn table_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self> {
        &mut state.notifications
    }
}
