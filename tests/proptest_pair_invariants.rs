//! Property tests for name resolution, pair keys, normalization and ranking.
//!
//! 1. Ids encoded in the canonical, dual-segment and slot-marker forms are
//!    recovered exactly and in encoding order.
//! 2. Pair keys do not depend on item order.
//! 3. Normalization keeps one row per key carrying the key's maximum score,
//!    and never keeps a same-item pair.
//! 4. Ranking is a pure function of its inputs; the reference mode only moves
//!    deltas.

use std::collections::HashMap;

use proptest::prelude::*;
use topgear::data::{ItemRef, MetadataMap, RawResultRow};
use topgear::topgear::{
    normalize_results, rank_rows, resolve_pair_name, CandidateRow, PairKey, ReferenceMode,
    ResolveContext, Strategy as Matcher,
};

fn item_id() -> impl Strategy<Value = u32> {
    100_000u32..=999_999
}

fn label() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,10}"
}

fn resolve(name: &str) -> ([Option<u32>; 2], Option<Matcher>) {
    let metadata = MetadataMap::new();
    let ctx = ResolveContext::new(&[], &metadata);
    let resolution = resolve_pair_name(name, &ctx);
    (
        [resolution.items[0].item_id, resolution.items[1].item_id],
        resolution.strategy,
    )
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Encodings round-trip ids in order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn canonical_encoding_recovers_ids(a in item_id(), b in item_id()) {
        let (ids, strategy) = resolve(&format!("T_{a}_VS_{b}"));
        prop_assert_eq!(ids, [Some(a), Some(b)]);
        prop_assert_eq!(strategy, Some(Matcher::CanonicalIdPair));
    }

    #[test]
    fn dual_segment_encoding_recovers_ids(
        a in item_id(),
        b in item_id(),
        noise in item_id(),
        left in label(),
        right in label(),
    ) {
        let name = format!("T_{left}_{noise}_{left}_{a}__{right}_{b}");
        let (ids, strategy) = resolve(&name);
        prop_assert_eq!(ids, [Some(a), Some(b)], "name {}", name);
        prop_assert_eq!(strategy, Some(Matcher::DualSegment));
    }

    #[test]
    fn slot_marker_encoding_recovers_ids(
        a in item_id(),
        b in item_id(),
        left in label(),
        right in label(),
    ) {
        let name = format!("set-trinket1-{left}-{a}-trinket2-{right}-{b}");
        let (ids, strategy) = resolve(&name);
        prop_assert_eq!(ids, [Some(a), Some(b)], "name {}", name);
        prop_assert_eq!(strategy, Some(Matcher::SlotMarkers));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Pair keys are symmetric
// ═════════════════════════════════════════════════════════════════════════

fn item_ref() -> impl Strategy<Value = ItemRef> {
    (proptest::option::of(item_id()), label()).prop_map(|(item_id, label)| ItemRef { item_id, label })
}

proptest! {
    #[test]
    fn pair_key_ignores_item_order(left in item_ref(), right in item_ref(), raw in ".{0,40}") {
        prop_assert_eq!(
            PairKey::for_pair(&left, &right, &raw),
            PairKey::for_pair(&right, &left, &raw)
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Normalization keeps the best row per key
// ═════════════════════════════════════════════════════════════════════════

const POOL: [u32; 5] = [111_111, 222_222, 333_333, 444_444, 555_555];

fn raw_rows() -> impl Strategy<Value = Vec<(usize, usize, f64, bool)>> {
    prop::collection::vec((0..POOL.len(), 0..POOL.len(), 0.0f64..1.0e6, any::<bool>()), 0..40)
}

fn to_raw(rows: &[(usize, usize, f64, bool)]) -> Vec<RawResultRow> {
    rows.iter()
        .map(|&(a, b, score, dual)| {
            let name = if dual {
                format!("T_x_{}__y_{}", POOL[a], POOL[b])
            } else {
                format!("T_{}_VS_{}", POOL[a], POOL[b])
            };
            RawResultRow::new(name, score)
        })
        .collect()
}

proptest! {
    #[test]
    fn one_row_per_key_with_max_score(rows in raw_rows()) {
        let metadata = MetadataMap::new();
        let ctx = ResolveContext::new(&[], &metadata);
        let out = normalize_results(&to_raw(&rows), &ctx);

        let mut expected: HashMap<PairKey, f64> = HashMap::new();
        for &(a, b, score, _) in &rows {
            if a == b {
                continue;
            }
            let best = expected.entry(PairKey::from_ids(POOL[a], POOL[b])).or_insert(score);
            *best = best.max(score);
        }

        prop_assert_eq!(out.rows.len(), expected.len());
        for row in &out.rows {
            prop_assert_eq!(Some(&row.score), expected.get(&row.pair_key));
            prop_assert_ne!(row.items[0].item_id, row.items[1].item_id);
        }
        let same_item = rows.iter().filter(|(a, b, _, _)| a == b).count();
        prop_assert_eq!(out.stats.same_item, same_item);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Ranking purity
// ═════════════════════════════════════════════════════════════════════════

fn candidate_rows() -> impl Strategy<Value = Vec<CandidateRow>> {
    prop::collection::vec((-1.0e5f64..1.0e6, any::<bool>()), 0..30).prop_map(|specs| {
        let equipped_at = specs.iter().position(|(_, equipped)| *equipped);
        specs
            .into_iter()
            .enumerate()
            .map(|(index, (score, _))| {
                let a = 100_000 + index as u32 * 2;
                CandidateRow {
                    pair_key: PairKey::from_ids(a, a + 1),
                    name: format!("T_{a}_VS_{}", a + 1),
                    items: [ItemRef::with_id(a, "A"), ItemRef::with_id(a + 1, "B")],
                    score,
                    is_equipped_pair: Some(index) == equipped_at,
                    resolved_by: None,
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn ranking_is_idempotent(rows in candidate_rows(), baseline in proptest::option::of(1.0f64..1.0e6)) {
        for mode in [ReferenceMode::Top, ReferenceMode::Equipped] {
            prop_assert_eq!(rank_rows(&rows, baseline, mode), rank_rows(&rows, baseline, mode));
        }
    }

    #[test]
    fn mode_switch_moves_only_deltas(rows in candidate_rows(), baseline in proptest::option::of(1.0f64..1.0e6)) {
        let top = rank_rows(&rows, baseline, ReferenceMode::Top);
        let equipped = rank_rows(&rows, baseline, ReferenceMode::Equipped);
        prop_assert_eq!(top.top_score, equipped.top_score);
        prop_assert_eq!(top.rows.len(), equipped.rows.len());
        for (t, e) in top.rows.iter().zip(&equipped.rows) {
            prop_assert_eq!(&t.row, &e.row);
            prop_assert_eq!(t.rank, e.rank);
            prop_assert_eq!(t.is_top, e.is_top);
            prop_assert_eq!(t.bar_fraction, e.bar_fraction);
            prop_assert!((0.0..=1.0).contains(&t.bar_fraction));
        }
        for pair in top.rows.windows(2) {
            prop_assert!(pair[0].row.score >= pair[1].row.score);
        }
    }

    #[test]
    fn zero_reference_nulls_every_delta(scores in prop::collection::vec(0.0f64..1.0e6, 0..20)) {
        let rows: Vec<CandidateRow> = scores
            .iter()
            .enumerate()
            .map(|(index, &score)| {
                let a = 200_000 + index as u32 * 2;
                CandidateRow {
                    pair_key: PairKey::from_ids(a, a + 1),
                    name: String::new(),
                    items: [ItemRef::with_id(a, "A"), ItemRef::with_id(a + 1, "B")],
                    score,
                    is_equipped_pair: false,
                    resolved_by: None,
                }
            })
            .collect();
        let board = rank_rows(&rows, Some(0.0), ReferenceMode::Equipped);
        prop_assert!(board.reference_score.is_none());
        prop_assert!(board.rows.iter().all(|r| r.delta.is_none() && r.delta_pct.is_none()));
    }
}
