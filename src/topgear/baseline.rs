//! Keeps the currently equipped pair visible in the leaderboard.

use serde::Serialize;

use crate::data::item::{ItemId, TrinketCandidate};
use crate::topgear::normalize::CandidateRow;
use crate::topgear::pair_key::PairKey;
use crate::topgear::resolver::ResolveContext;

pub const BASELINE_ROW_NAME: &str = "Current gear";

/// What the injector did with the equipped pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineOutcome {
    /// A result row already covered the equipped pair and was flagged.
    MarkedExisting,
    /// No row covered it; one was added from the baseline score.
    Synthesized,
    /// The equipped pair is not known (fewer than two equipped ids, or the same id twice).
    NoEquippedPair,
    /// Equipped pair known but not simulated, and no baseline score was reported.
    NoBaselineScore,
}

/// Ids of the two equipped candidates, in slot order. `None` unless exactly two
/// equipped candidates carry distinct ids.
pub fn equipped_pair(candidates: &[TrinketCandidate]) -> Option<(ItemId, ItemId)> {
    let ids: Vec<Option<ItemId>> = candidates
        .iter()
        .filter(|candidate| candidate.is_equipped())
        .map(|candidate| candidate.item_id)
        .collect();
    match ids.as_slice() {
        [Some(first), Some(second)] if first != second => Some((*first, *second)),
        _ => None,
    }
}

/// Flag the row matching the equipped pair, or add one scored with the baseline.
/// An existing row keeps its own score.
pub fn inject_baseline(
    rows: &mut Vec<CandidateRow>,
    equipped: Option<(ItemId, ItemId)>,
    baseline_score: Option<f64>,
    ctx: &ResolveContext<'_>,
) -> BaselineOutcome {
    let Some((first, second)) = equipped.filter(|(a, b)| a != b) else {
        return BaselineOutcome::NoEquippedPair;
    };
    let key = PairKey::from_ids(first, second);

    if let Some(row) = rows.iter_mut().find(|row| row.pair_key == key) {
        row.is_equipped_pair = true;
        tracing::debug!(pair_key = %key, score = row.score, "equipped pair present in results");
        return BaselineOutcome::MarkedExisting;
    }

    let Some(score) = baseline_score.filter(|score| score.is_finite()) else {
        return BaselineOutcome::NoBaselineScore;
    };
    tracing::debug!(pair_key = %key, score, "synthesized equipped pair row");
    rows.push(CandidateRow {
        pair_key: key,
        name: BASELINE_ROW_NAME.to_string(),
        items: [ctx.item_ref(first), ctx.item_ref(second)],
        score,
        is_equipped_pair: true,
        resolved_by: None,
    });
    BaselineOutcome::Synthesized
}

#[cfg(test)]
mod tests {
    use crate::data::item::{ItemSource, MetadataMap};
    use crate::data::report::RawResultRow;
    use crate::topgear::normalize::normalize_results;

    use super::*;

    fn equipped(slot: &str, id: ItemId) -> TrinketCandidate {
        TrinketCandidate {
            name: format!("{slot}_Equipped_{id}"),
            slot: slot.to_string(),
            item_id: Some(id),
            override_config: format!("{slot}=,id={id}"),
            source: ItemSource::Equipped,
            unique_equipped: false,
        }
    }

    #[test]
    fn equipped_pair_needs_two_distinct_ids() {
        let both = [equipped("trinket1", 111111), equipped("trinket2", 222222)];
        assert_eq!(equipped_pair(&both), Some((111111, 222222)));
        assert_eq!(equipped_pair(&both[..1]), None);
        let twins = [equipped("trinket1", 111111), equipped("trinket2", 111111)];
        assert_eq!(equipped_pair(&twins), None);
    }

    #[test]
    fn synthesizes_missing_equipped_row() {
        let metadata = MetadataMap::new();
        let ctx = ResolveContext::new(&[], &metadata);
        let mut rows = normalize_results(&[RawResultRow::new("T_111111_VS_333333", 95000.0)], &ctx).rows;
        let outcome = inject_baseline(&mut rows, Some((111111, 222222)), Some(90000.0), &ctx);
        assert_eq!(outcome, BaselineOutcome::Synthesized);
        let injected = rows.last().expect("row injected");
        assert_eq!(injected.pair_key.as_str(), "111111-222222");
        assert_eq!(injected.score, 90000.0);
        assert!(injected.is_equipped_pair);
        assert_eq!(injected.name, BASELINE_ROW_NAME);
    }

    #[test]
    fn existing_row_keeps_its_own_score() {
        let metadata = MetadataMap::new();
        let ctx = ResolveContext::new(&[], &metadata);
        let mut rows = normalize_results(&[RawResultRow::new("T_222222_VS_111111", 91000.0)], &ctx).rows;
        let outcome = inject_baseline(&mut rows, Some((111111, 222222)), Some(90000.0), &ctx);
        assert_eq!(outcome, BaselineOutcome::MarkedExisting);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 91000.0);
        assert!(rows[0].is_equipped_pair);
    }

    #[test]
    fn nothing_injected_without_pair_or_score() {
        let metadata = MetadataMap::new();
        let ctx = ResolveContext::new(&[], &metadata);
        let mut rows = Vec::new();
        assert_eq!(
            inject_baseline(&mut rows, None, Some(1.0), &ctx),
            BaselineOutcome::NoEquippedPair
        );
        assert_eq!(
            inject_baseline(&mut rows, Some((1, 2)), None, &ctx),
            BaselineOutcome::NoBaselineScore
        );
        assert!(rows.is_empty());
    }
}
