//! Drag-and-drop position planning.
//!
//! Positions are dense integers per parent, `0..n`. The client plans a move
//! against its current view of the target parent and sends the claimed
//! position; the service renumbers siblings and the confirmed response is
//! reconciled back in.

use serde::{Deserialize, Serialize};

/// One sibling as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub position: i64,
}

impl Slot {
    pub fn new(id: impl Into<String>, position: i64) -> Self {
        Self {
            id: id.into(),
            position,
        }
    }
}

/// A drop gesture. `target_index` counts siblings in the target parent with
/// the moved entity left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveIntent {
    pub entity_id: String,
    pub source_parent_id: String,
    pub target_parent_id: String,
    pub target_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub entity_id: String,
    pub target_parent_id: String,
    pub parent_changed: bool,
    /// Position to claim for the moved entity.
    pub position: i64,
    /// Siblings the service is expected to renumber. Never written locally.
    pub sibling_shifts: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovePlan {
    NoOp,
    Move(PlannedMove),
}

impl MovePlan {
    pub fn is_noop(&self) -> bool {
        matches!(self, MovePlan::NoOp)
    }
}

fn sorted(siblings: &[Slot]) -> Vec<Slot> {
    let mut ordered = siblings.to_vec();
    ordered.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    ordered
}

/// Plans a move against the current children of the target parent.
///
/// Dropping past the end clamps to the end. Dropping an entity where it
/// already sits is a no-op.
pub fn plan_move(target_siblings: &[Slot], intent: &MoveIntent) -> MovePlan {
    let ordered = sorted(target_siblings);
    let parent_changed = intent.source_parent_id != intent.target_parent_id;
    let current_index = ordered.iter().position(|slot| slot.id == intent.entity_id);
    let others = ordered
        .iter()
        .filter(|slot| slot.id != intent.entity_id)
        .count();
    let index = intent.target_index.min(others);

    if !parent_changed && current_index == Some(index) {
        return MovePlan::NoOp;
    }

    let dense = dense_order(&ordered, Some((&intent.entity_id, index)));
    let sibling_shifts = dense
        .into_iter()
        .filter(|slot| slot.id != intent.entity_id)
        .filter(|slot| {
            ordered
                .iter()
                .find(|current| current.id == slot.id)
                .is_some_and(|current| current.position != slot.position)
        })
        .collect();

    MovePlan::Move(PlannedMove {
        entity_id: intent.entity_id.clone(),
        target_parent_id: intent.target_parent_id.clone(),
        parent_changed,
        position: index as i64,
        sibling_shifts,
    })
}

/// Renumbers `siblings` densely from zero in their current order.
///
/// With an anchor `(id, index)`, that entity is first taken out (if present)
/// and then placed at `index`, clamped to the end.
pub fn dense_order(siblings: &[Slot], anchor: Option<(&str, usize)>) -> Vec<Slot> {
    let mut ids: Vec<String> = sorted(siblings).into_iter().map(|slot| slot.id).collect();
    if let Some((anchor_id, index)) = anchor {
        ids.retain(|id| id != anchor_id);
        let index = index.min(ids.len());
        ids.insert(index, anchor_id.to_string());
    }
    ids.into_iter()
        .enumerate()
        .map(|(position, id)| Slot::new(id, position as i64))
        .collect()
}

/// Renumbers `siblings` densely after a bulk reorder that may name only some
/// of them. Named entities land at their given index (in ascending order,
/// ties by id); the rest keep their relative order around them. Names that
/// are not siblings are ignored.
pub fn settle_order(siblings: &[Slot], named: &[Slot]) -> Vec<Slot> {
    let named: Vec<Slot> = sorted(named)
        .into_iter()
        .filter(|slot| siblings.iter().any(|sibling| sibling.id == slot.id))
        .collect();
    let mut ids: Vec<String> = sorted(siblings)
        .into_iter()
        .filter(|slot| !named.iter().any(|other| other.id == slot.id))
        .map(|slot| slot.id)
        .collect();
    for slot in named {
        let index = (slot.position.max(0) as usize).min(ids.len());
        ids.insert(index, slot.id);
    }
    ids.into_iter()
        .enumerate()
        .map(|(position, id)| Slot::new(id, position as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(ids: &[&str]) -> Vec<Slot> {
        ids.iter()
            .enumerate()
            .map(|(position, id)| Slot::new(*id, position as i64))
            .collect()
    }

    fn intent(entity: &str, from: &str, to: &str, index: usize) -> MoveIntent {
        MoveIntent {
            entity_id: entity.into(),
            source_parent_id: from.into(),
            target_parent_id: to.into(),
            target_index: index,
        }
    }

    fn planned(plan: MovePlan) -> PlannedMove {
        match plan {
            MovePlan::Move(planned) => planned,
            MovePlan::NoOp => panic!("expected a move"),
        }
    }

    #[test]
    fn drop_at_end_claims_sibling_count() {
        let plan = planned(plan_move(&slots(&["a", "b", "c"]), &intent("t", "A", "B", 3)));
        assert_eq!(plan.position, 3);
        assert!(plan.parent_changed);
        assert!(plan.sibling_shifts.is_empty());
    }

    #[test]
    fn drop_past_end_clamps() {
        let plan = planned(plan_move(&slots(&["a", "b"]), &intent("t", "A", "B", 17)));
        assert_eq!(plan.position, 2);
    }

    #[test]
    fn interior_drop_claims_index_and_shifts_followers() {
        let plan = planned(plan_move(&slots(&["a", "b", "c"]), &intent("t", "A", "B", 1)));
        assert_eq!(plan.position, 1);
        assert_eq!(plan.sibling_shifts, vec![Slot::new("b", 2), Slot::new("c", 3)]);
    }

    #[test]
    fn dropping_in_place_is_a_noop() {
        let plan = plan_move(&slots(&["a", "t", "c"]), &intent("t", "A", "A", 1));
        assert!(plan.is_noop());
    }

    #[test]
    fn reorder_within_parent_counts_without_the_entity() {
        // [t, a, b] -> drop t after b.
        let plan = planned(plan_move(&slots(&["t", "a", "b"]), &intent("t", "A", "A", 2)));
        assert_eq!(plan.position, 2);
        assert!(!plan.parent_changed);
        assert_eq!(plan.sibling_shifts, vec![Slot::new("a", 0), Slot::new("b", 1)]);
    }

    #[test]
    fn empty_target_claims_zero() {
        let plan = planned(plan_move(&[], &intent("t", "A", "B", 0)));
        assert_eq!(plan.position, 0);
    }

    #[test]
    fn dense_order_repairs_gaps_and_duplicates() {
        let siblings = vec![Slot::new("b", 4), Slot::new("a", 4), Slot::new("c", 9)];
        let dense = dense_order(&siblings, None);
        assert_eq!(
            dense,
            vec![Slot::new("a", 0), Slot::new("b", 1), Slot::new("c", 2)]
        );
    }

    #[test]
    fn partial_reorder_fills_around_named_entities() {
        let siblings = slots(&["t1", "t2", "t4"]);
        let settled = settle_order(&siblings, &[Slot::new("t4", 0), Slot::new("x9", 1)]);
        assert_eq!(
            settled,
            vec![Slot::new("t4", 0), Slot::new("t1", 1), Slot::new("t2", 2)]
        );
    }

    #[test]
    fn full_reorder_with_gaps_is_compacted() {
        let settled = settle_order(
            &slots(&["a", "b", "c"]),
            &[Slot::new("c", 0), Slot::new("a", 7), Slot::new("b", 3)],
        );
        assert_eq!(
            settled,
            vec![Slot::new("c", 0), Slot::new("b", 1), Slot::new("a", 2)]
        );
    }
}
