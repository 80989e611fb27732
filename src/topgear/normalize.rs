//! Raw result rows to deduplicated candidate rows.

use std::collections::HashMap;

use serde::Serialize;

use crate::data::item::ItemRef;
use crate::data::report::RawResultRow;
use crate::topgear::pair_key::PairKey;
use crate::topgear::resolver::{resolve_pair_name, ResolveContext, Strategy};

pub const UNRESOLVED_LABEL: &str = "Unresolved item";

/// A normalized, scored two-item combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRow {
    pub pair_key: PairKey,
    /// Raw result name, or a synthesized name for injected rows.
    pub name: String,
    pub items: [ItemRef; 2],
    pub score: f64,
    pub is_equipped_pair: bool,
    /// `None` for unresolved names and injected rows.
    pub resolved_by: Option<Strategy>,
}

impl CandidateRow {
    pub fn is_resolved(&self) -> bool {
        self.items.iter().all(|item| item.item_id.is_some())
    }
}

/// Aggregate counts of what normalization dropped or merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub input_rows: usize,
    pub invalid_score: usize,
    pub same_item: usize,
    pub duplicates_merged: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedResults {
    /// One row per pair key, in first-seen order.
    pub rows: Vec<CandidateRow>,
    pub stats: NormalizeStats,
}

/// Filter, resolve and deduplicate raw rows. Per pair key the highest score
/// survives; on equal scores the first row seen is kept.
pub fn normalize_results(raw: &[RawResultRow], ctx: &ResolveContext<'_>) -> NormalizedResults {
    let mut stats = NormalizeStats {
        input_rows: raw.len(),
        ..NormalizeStats::default()
    };
    let mut rows: Vec<CandidateRow> = Vec::new();
    let mut slots: HashMap<PairKey, usize> = HashMap::new();

    for row in raw {
        let Some(score) = row.score.filter(|score| score.is_finite()) else {
            stats.invalid_score += 1;
            continue;
        };

        let resolution = resolve_pair_name(&row.name, ctx);
        let [left, right] = resolution.items;
        if let (Some(a), Some(b)) = (left.item_id, right.item_id) {
            if a == b {
                stats.same_item += 1;
                continue;
            }
        }
        if resolution.strategy.is_none() {
            stats.unresolved += 1;
        }

        let pair_key = PairKey::for_pair(&left, &right, &row.name);
        let candidate = CandidateRow {
            pair_key: pair_key.clone(),
            name: row.name.clone(),
            items: [with_placeholder(left), with_placeholder(right)],
            score,
            is_equipped_pair: false,
            resolved_by: resolution.strategy,
        };

        match slots.get(&pair_key) {
            Some(&index) => {
                stats.duplicates_merged += 1;
                if score > rows[index].score {
                    rows[index] = candidate;
                }
            }
            None => {
                slots.insert(pair_key, rows.len());
                rows.push(candidate);
            }
        }
    }

    tracing::debug!(
        input = stats.input_rows,
        kept = rows.len(),
        invalid_score = stats.invalid_score,
        same_item = stats.same_item,
        merged = stats.duplicates_merged,
        unresolved = stats.unresolved,
        "normalized result rows"
    );
    NormalizedResults { rows, stats }
}

fn with_placeholder(item: ItemRef) -> ItemRef {
    if !item.label.trim().is_empty() {
        return item;
    }
    match item.item_id {
        Some(id) => ItemRef::with_id(id, format!("Item {id}")),
        None => ItemRef::unresolved(UNRESOLVED_LABEL),
    }
}
