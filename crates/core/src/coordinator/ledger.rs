use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MUTATION_HISTORY_LIMIT;
use crate::errors::RemoteError;
use crate::reconcile::{EntityPatch, RefetchScope};
use crate::store::EntityRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Inserts a new entity, usually behind a local placeholder.
    Create,
    /// Changes content fields; reverted on failure.
    FieldEdit,
    /// Changes where something sits; refetched on failure.
    Structural,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    Pending,
    Confirmed,
    Failed,
}

/// One mutation as tracked by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    pub seq: u64,
    pub operation: &'static str,
    pub kind: MutationKind,
    pub target: EntityRef,
    /// Wire names of the fields this mutation writes.
    pub fields: BTreeSet<&'static str>,
    pub state: MutationState,
    pub error: Option<RemoteError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Fields written by mutations on the same target that were already in
    /// flight when this one started.
    #[serde(skip)]
    pub(crate) older_concurrent: BTreeSet<&'static str>,
    /// Fields written by mutations on the same target that started while
    /// this one was in flight.
    #[serde(skip)]
    pub(crate) newer_concurrent: BTreeSet<&'static str>,
    /// Pre-mutation values of `fields`, for reverting a failed edit.
    #[serde(skip)]
    pub(crate) before: Option<EntityPatch>,
    /// What to refetch if a structural change or delete fails.
    #[serde(skip)]
    pub(crate) on_failure: Vec<RefetchScope>,
}

impl MutationRecord {
    /// Whether this mutation's response may write `field` of its target.
    ///
    /// A newer in-flight edit always keeps its optimistic value. A field
    /// claimed only by an older in-flight edit is left to that edit.
    pub fn response_may_write(&self, field: &str) -> bool {
        !self.newer_concurrent.contains(field)
            && (self.fields.contains(field) || !self.older_concurrent.contains(field))
    }

    pub fn is_pending(&self) -> bool {
        self.state == MutationState::Pending
    }
}

/// A new mutation to register.
pub(crate) struct MutationStart {
    pub operation: &'static str,
    pub kind: MutationKind,
    pub target: EntityRef,
    pub fields: Vec<&'static str>,
    pub before: Option<EntityPatch>,
    pub on_failure: Vec<RefetchScope>,
}

/// In-flight mutations plus a bounded history of finished ones.
#[derive(Debug, Default)]
pub(crate) struct MutationLedger {
    next_seq: u64,
    in_flight: BTreeMap<u64, MutationRecord>,
    history: VecDeque<MutationRecord>,
}

impl MutationLedger {
    pub fn begin(&mut self, start: MutationStart) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        let fields: BTreeSet<&'static str> = start.fields.into_iter().collect();

        let mut older_concurrent = BTreeSet::new();
        for record in self.in_flight.values_mut() {
            if record.target == start.target {
                older_concurrent.extend(record.fields.iter().copied());
                record.newer_concurrent.extend(fields.iter().copied());
            }
        }

        self.in_flight.insert(
            seq,
            MutationRecord {
                seq,
                operation: start.operation,
                kind: start.kind,
                target: start.target,
                fields,
                state: MutationState::Pending,
                error: None,
                started_at: Utc::now(),
                finished_at: None,
                older_concurrent,
                newer_concurrent: BTreeSet::new(),
                before: start.before,
                on_failure: start.on_failure,
            },
        );
        seq
    }

    pub fn get(&self, seq: u64) -> Option<&MutationRecord> {
        self.in_flight.get(&seq)
    }

    /// Moves a mutation out of flight. Returns its final record.
    pub fn finish(&mut self, seq: u64, error: Option<RemoteError>) -> Option<MutationRecord> {
        let mut record = self.in_flight.remove(&seq)?;
        record.state = if error.is_some() {
            MutationState::Failed
        } else {
            MutationState::Confirmed
        };
        record.error = error;
        record.finished_at = Some(Utc::now());

        self.history.push_back(record.clone());
        while self.history.len() > MUTATION_HISTORY_LIMIT {
            self.history.pop_front();
        }
        Some(record)
    }

    /// Fields held by in-flight mutations, per target. Push events and
    /// refetches leave these alone.
    pub fn claimed_fields(&self) -> BTreeMap<EntityRef, BTreeSet<&'static str>> {
        let mut claims: BTreeMap<EntityRef, BTreeSet<&'static str>> = BTreeMap::new();
        for record in self.in_flight.values() {
            claims
                .entry(record.target.clone())
                .or_default()
                .extend(record.fields.iter().copied());
        }
        claims
    }

    /// Targets with a delete in flight.
    pub fn pending_deletes(&self) -> BTreeSet<EntityRef> {
        self.in_flight
            .values()
            .filter(|record| record.kind == MutationKind::Delete)
            .map(|record| record.target.clone())
            .collect()
    }

    pub fn in_flight(&self) -> Vec<MutationRecord> {
        self.in_flight.values().cloned().collect()
    }

    pub fn history(&self) -> Vec<MutationRecord> {
        self.history.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(target: &str, fields: &[&'static str]) -> MutationStart {
        MutationStart {
            operation: "update_task",
            kind: MutationKind::FieldEdit,
            target: EntityRef::task(target),
            fields: fields.to_vec(),
            before: None,
            on_failure: Vec::new(),
        }
    }

    #[test]
    fn concurrent_edits_see_each_other() {
        let mut ledger = MutationLedger::default();
        let first = ledger.begin(edit("t1", &["title"]));
        let second = ledger.begin(edit("t1", &["priority"]));
        let unrelated = ledger.begin(edit("t2", &["title"]));

        let first = ledger.get(first).unwrap();
        assert!(first.response_may_write("title"));
        assert!(!first.response_may_write("priority"));
        assert!(first.response_may_write("description"));

        let second = ledger.get(second).unwrap();
        assert!(!second.response_may_write("title"));
        assert!(second.response_may_write("priority"));

        assert!(ledger.get(unrelated).unwrap().response_may_write("priority"));
    }

    #[test]
    fn finishing_records_history_and_releases_claims() {
        let mut ledger = MutationLedger::default();
        let seq = ledger.begin(edit("t1", &["title"]));
        assert_eq!(
            ledger.claimed_fields().get(&EntityRef::task("t1")),
            Some(&BTreeSet::from(["title"]))
        );

        let record = ledger
            .finish(seq, Some(RemoteError::validation("too long")))
            .unwrap();
        assert_eq!(record.state, MutationState::Failed);
        assert!(ledger.claimed_fields().is_empty());
        assert_eq!(ledger.history().len(), 1);
        assert!(ledger.finish(seq, None).is_none());
    }

    #[test]
    fn history_is_bounded() {
        let mut ledger = MutationLedger::default();
        for _ in 0..(MUTATION_HISTORY_LIMIT + 5) {
            let seq = ledger.begin(edit("t1", &["title"]));
            ledger.finish(seq, None);
        }
        assert_eq!(ledger.history().len(), MUTATION_HISTORY_LIMIT);
        assert_eq!(ledger.history()[0].seq, 6);
    }
}
