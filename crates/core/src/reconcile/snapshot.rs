use log::warn;

use super::FieldFilter;
use crate::constants::LOCAL_ID_PREFIX;
use crate::models::{Mergeable, Patch};
use crate::store::{EntityRef, StoreTxn, StoredEntity};

/// Counts from folding a refetched listing into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub applied: usize,
    pub removed: usize,
    pub skipped: usize,
}

/// Folds a full listing of some scope into the store.
///
/// Each listed entity is merged over what the store holds (subject to
/// `filter`) or inserted. Entities in scope that the listing leaves out are
/// removed with everything they own. Optimistic placeholders are never in
/// scope. Incomplete new entries are skipped.
pub fn replace_snapshot<E, P>(
    txn: &mut StoreTxn<'_>,
    in_scope: P,
    patches: Vec<E::Patch>,
    filter: FieldFilter<'_>,
) -> SnapshotSummary
where
    E: StoredEntity,
    P: Fn(&E) -> bool,
{
    let mut summary = SnapshotSummary::default();
    let mut incoming = Vec::with_capacity(patches.len());

    for mut patch in patches {
        let target = EntityRef::new(E::KIND, patch.id());
        match txn.get::<E>(&target.id) {
            Some(current) => {
                patch.retain_fields(&|field| filter(&target, field));
                incoming.push(current.merge(&patch));
            }
            None => match E::from_patch(patch) {
                Ok(entity) => incoming.push(entity),
                Err(err) => {
                    warn!("Skipping refetched {}: {}", target, err);
                    summary.skipped += 1;
                }
            },
        }
    }

    summary.applied = incoming.len();
    summary.removed = txn.replace_where(
        |entity: &E| in_scope(entity) && !entity.id().starts_with(LOCAL_ID_PREFIX),
        incoming,
    );
    summary
}
