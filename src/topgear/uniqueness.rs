//! Advisory check for unique-equipped items selected more than once.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::item::{ItemId, MetadataMap, TrinketCandidate};

/// An item id selected more than once although only one copy can be worn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueConflict {
    pub item_id: ItemId,
    pub count: usize,
    pub names: Vec<String>,
}

impl UniqueConflict {
    pub fn message(&self) -> String {
        format!(
            "item {} is unique-equipped but selected {} times ({})",
            self.item_id,
            self.count,
            self.names.join(", ")
        )
    }
}

/// Ids appearing more than once among unique-equipped selections, ascending.
/// Does not block anything; pairing skips same-id pairs and normalization drops them.
pub fn find_unique_conflicts(selected: &[TrinketCandidate]) -> Vec<UniqueConflict> {
    let mut by_id: BTreeMap<ItemId, Vec<String>> = BTreeMap::new();
    for candidate in selected.iter().filter(|candidate| candidate.unique_equipped) {
        if let Some(id) = candidate.item_id {
            by_id.entry(id).or_default().push(candidate.name.clone());
        }
    }
    by_id
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(item_id, names)| UniqueConflict {
            item_id,
            count: names.len(),
            names,
        })
        .collect()
}

/// Copy `unique_equipped` from metadata onto candidates. Flags already set stay set.
pub fn apply_unique_flags(candidates: &mut [TrinketCandidate], metadata: &MetadataMap) {
    for candidate in candidates.iter_mut() {
        let flagged = candidate
            .item_id
            .and_then(|id| metadata.get(&id))
            .is_some_and(|meta| meta.unique_equipped);
        candidate.unique_equipped |= flagged;
    }
}

/// Two copies of the same item can never be worn together.
pub fn is_impossible_pair(left: &TrinketCandidate, right: &TrinketCandidate) -> bool {
    matches!((left.item_id, right.item_id), (Some(a), Some(b)) if a == b)
}
