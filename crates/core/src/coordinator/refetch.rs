use std::collections::BTreeSet;

use log::{debug, warn};

use super::{Claims, MutationCoordinator, MutationResult};
use crate::errors::{FailureKind, MutationFailure, RemoteError};
use crate::models::{Board, Card, Invitation, InvitationStatus, Notification, Patch, Task, TaskPatch};
use crate::reconcile::{self, replace_snapshot, Change, Effect, Outcome, RefetchScope};
use crate::store::{EntityKind, EntityRef};
use crate::sync::{PushEvent, Reaction};

/// Drops listed entries that a delete in flight is about to remove.
fn without_deleting<P: Patch>(claims: &Claims, kind: EntityKind, patches: Vec<P>) -> Vec<P> {
    patches
        .into_iter()
        .filter(|patch| !claims.deleting(&EntityRef::new(kind, patch.id())))
        .collect()
}

fn locate_tasks(board_id: &str, card_id: &str, tasks: &mut [TaskPatch]) {
    for task in tasks {
        task.board_id.get_or_insert_with(|| board_id.to_string());
        task.card_id.get_or_insert_with(|| card_id.to_string());
    }
}

impl MutationCoordinator {
    /// Folds a push event into the store.
    ///
    /// The returned outcome may ask for a refetch; the caller decides when to
    /// run it.
    pub fn react(&self, event: PushEvent) -> Outcome {
        debug!("Push event {}", event.name());
        match event.into_reaction() {
            Reaction::Apply(change) => self.apply_push(change),
            Reaction::Refetch(scope) => Outcome::refetch(Effect::Unchanged, Some(scope)),
        }
    }

    /// Applies a peer's change, leaving alone whatever in-flight mutations
    /// have claimed.
    pub fn apply_push(&self, change: Change) -> Outcome {
        let claims = self.claims();
        let change = match change {
            Change::Reposition {
                kind,
                parent_id,
                positions,
            } => Change::Reposition {
                kind,
                positions: positions
                    .into_iter()
                    .filter(|slot| {
                        let target = EntityRef::new(kind, &slot.id);
                        !claims.deleting(&target) && claims.allows(&target, "position")
                    })
                    .collect(),
                parent_id,
            },
            other => other,
        };

        let target = match &change {
            Change::Upsert(patch) => Some(patch.entity_ref()),
            Change::Remove(target) => Some(target.clone()),
            Change::AttachmentAdded { task_id, .. } | Change::AttachmentRemoved { task_id, .. } => {
                Some(EntityRef::task(task_id))
            }
            Change::Membership { board_id, .. } => Some(EntityRef::board(board_id)),
            Change::Reposition { .. } => None,
        };
        if let Some(target) = &target {
            if claims.deleting(target) {
                debug!("Ignoring push for {}, delete in flight", target);
                return Outcome::unchanged();
            }
        }

        let filter = move |target: &EntityRef, field: &str| claims.allows(target, field);
        self.store
            .transaction(|txn| reconcile::apply(txn, change, &filter))
    }

    /// Fetches `scope` again and folds it into the store.
    pub async fn refetch(&self, scope: &RefetchScope) -> MutationResult<()> {
        debug!("Refetching {:?}", scope);
        match scope {
            RefetchScope::Boards => self.refetch_boards().await,
            RefetchScope::Board { board_id } => self.refetch_board(board_id).await,
            RefetchScope::BoardCards { board_id } => self.refetch_board_cards(board_id).await,
            RefetchScope::CardTasks { board_id, card_id } => {
                self.refetch_card_tasks(board_id, card_id).await
            }
            RefetchScope::Invitations => self.refetch_invitations().await,
            RefetchScope::Notifications => self.refetch_notifications().await,
        }
    }

    /// Like [`refetch`](Self::refetch), for paths that have nobody to
    /// report to. Failures still land in the store's error slot.
    pub async fn refetch_quietly(&self, scope: &RefetchScope) {
        if let Err(failure) = self.refetch(scope).await {
            warn!("Refetch of {:?} failed: {}", scope, failure);
        }
    }

    fn refetch_failed(
        &self,
        operation: &str,
        target: Option<EntityRef>,
        error: RemoteError,
    ) -> MutationFailure {
        let failure = MutationFailure::new(operation, target, error);
        self.store.record_error(failure.clone());
        failure
    }

    pub async fn refetch_boards(&self) -> MutationResult<()> {
        let boards = self
            .api
            .list_boards()
            .await
            .map_err(|err| self.refetch_failed("refetch_boards", None, err))?;

        let claims = self.claims();
        let boards = without_deleting(&claims, EntityKind::Board, boards);
        let filter = move |target: &EntityRef, field: &str| claims.allows(target, field);
        let summary = self.store.transaction(|txn| {
            replace_snapshot::<Board, _>(txn, |_| true, boards, &filter)
        });
        debug!("Boards refetched: {:?}", summary);
        Ok(())
    }

    /// Reloads one board with all of its cards and tasks. A board the
    /// service no longer knows is dropped.
    pub async fn refetch_board(&self, board_id: &str) -> MutationResult<()> {
        const OP: &str = "refetch_board";
        let target = EntityRef::board(board_id);
        let board = match self.api.get_board(board_id).await {
            Ok(board) => board,
            Err(err) if err.kind == FailureKind::NotFound => {
                debug!("Board {} is gone, dropping it", board_id);
                self.store.remove::<Board>(board_id);
                return Ok(());
            }
            Err(err) => return Err(self.refetch_failed(OP, Some(target), err)),
        };

        let mut cards = self
            .api
            .list_cards(board_id)
            .await
            .map_err(|err| self.refetch_failed(OP, Some(target.clone()), err))?;
        let mut tasks = Vec::new();
        for card in &mut cards {
            card.board_id.get_or_insert_with(|| board_id.to_string());
            let mut listed = self
                .api
                .list_tasks(board_id, &card.id)
                .await
                .map_err(|err| self.refetch_failed(OP, Some(target.clone()), err))?;
            locate_tasks(board_id, &card.id, &mut listed);
            tasks.extend(listed);
        }

        let claims = self.claims();
        if claims.deleting(&target) {
            return Ok(());
        }
        let cards = without_deleting(&claims, EntityKind::Card, cards);
        let tasks = without_deleting(&claims, EntityKind::Task, tasks);
        let filter = move |target: &EntityRef, field: &str| claims.allows(target, field);
        self.store.transaction(|txn| {
            let outcome = reconcile::apply(txn, Change::Upsert(board.into()), &filter);
            if outcome.refetch.is_some() {
                warn!("Refetched board {} is incomplete", board_id);
            }
            let cards =
                replace_snapshot::<Card, _>(txn, |card| card.board_id == board_id, cards, &filter);
            let tasks =
                replace_snapshot::<Task, _>(txn, |task| task.board_id == board_id, tasks, &filter);
            debug!(
                "Board {} refetched: cards {:?}, tasks {:?}",
                board_id, cards, tasks
            );
        });
        Ok(())
    }

    /// Reloads a board's cards, plus the tasks of cards not seen before.
    pub async fn refetch_board_cards(&self, board_id: &str) -> MutationResult<()> {
        const OP: &str = "refetch_board_cards";
        let target = EntityRef::board(board_id);
        let mut cards = self
            .api
            .list_cards(board_id)
            .await
            .map_err(|err| self.refetch_failed(OP, Some(target.clone()), err))?;

        let mut new_cards = BTreeSet::new();
        let mut tasks = Vec::new();
        for card in &mut cards {
            card.board_id.get_or_insert_with(|| board_id.to_string());
            if self.store.get::<Card>(&card.id).is_some() {
                continue;
            }
            let mut listed = self
                .api
                .list_tasks(board_id, &card.id)
                .await
                .map_err(|err| self.refetch_failed(OP, Some(target.clone()), err))?;
            locate_tasks(board_id, &card.id, &mut listed);
            tasks.extend(listed);
            new_cards.insert(card.id.clone());
        }

        let claims = self.claims();
        let cards = without_deleting(&claims, EntityKind::Card, cards);
        let tasks = without_deleting(&claims, EntityKind::Task, tasks);
        let filter = move |target: &EntityRef, field: &str| claims.allows(target, field);
        self.store.transaction(|txn| {
            replace_snapshot::<Card, _>(txn, |card| card.board_id == board_id, cards, &filter);
            replace_snapshot::<Task, _>(
                txn,
                |task| new_cards.contains(&task.card_id),
                tasks,
                &filter,
            );
        });
        Ok(())
    }

    /// Reloads the tasks of one card. A card the service no longer knows is
    /// dropped.
    pub async fn refetch_card_tasks(&self, board_id: &str, card_id: &str) -> MutationResult<()> {
        let mut tasks = match self.api.list_tasks(board_id, card_id).await {
            Ok(tasks) => tasks,
            Err(err) if err.kind == FailureKind::NotFound => {
                debug!("Card {} is gone, dropping it", card_id);
                self.store.remove::<Card>(card_id);
                return Ok(());
            }
            Err(err) => {
                return Err(self.refetch_failed(
                    "refetch_card_tasks",
                    Some(EntityRef::card(card_id)),
                    err,
                ))
            }
        };
        locate_tasks(board_id, card_id, &mut tasks);

        let claims = self.claims();
        let tasks = without_deleting(&claims, EntityKind::Task, tasks);
        let filter = move |target: &EntityRef, field: &str| claims.allows(target, field);
        self.store.transaction(|txn| {
            replace_snapshot::<Task, _>(txn, |task| task.card_id == card_id, tasks, &filter)
        });
        Ok(())
    }

    /// Reloads the invitations addressed to the current user.
    pub async fn refetch_invitations(&self) -> MutationResult<()> {
        let invitations = self
            .api
            .pending_invitations()
            .await
            .map_err(|err| self.refetch_failed("refetch_invitations", None, err))?;

        let claims = self.claims();
        let filter = move |target: &EntityRef, field: &str| claims.allows(target, field);
        self.store.transaction(|txn| {
            replace_snapshot::<Invitation, _>(
                txn,
                |invitation| invitation.status == InvitationStatus::Pending,
                invitations,
                &filter,
            )
        });
        Ok(())
    }

    pub async fn refetch_notifications(&self) -> MutationResult<()> {
        let notifications = self
            .api
            .list_notifications()
            .await
            .map_err(|err| self.refetch_failed("refetch_notifications", None, err))?;

        let claims = self.claims();
        let notifications = without_deleting(&claims, EntityKind::Notification, notifications);
        let filter = move |target: &EntityRef, field: &str| claims.allows(target, field);
        self.store.transaction(|txn| {
            replace_snapshot::<Notification, _>(txn, |_| true, notifications, &filter)
        });
        Ok(())
    }
}
