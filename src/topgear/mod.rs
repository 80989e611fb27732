//! Result resolution and ranking for trinket pair sweeps.
//!
//! Flow: raw rows -> [normalize] (via [resolver] and [pair_key]) -> [baseline] ->
//! [ranking]. Nothing here does I/O; callers pass candidates and metadata in.

pub mod baseline;
pub mod export;
pub mod normalize;
pub mod pair_key;
pub mod profilesets;
pub mod ranking;
pub mod resolver;
pub mod uniqueness;

use serde_json::Value;

use crate::data::item::{MetadataMap, TrinketCandidate};
use crate::data::report::{extract_baseline_score, extract_result_rows, RawResultRow};

pub use baseline::{equipped_pair, inject_baseline, BaselineOutcome};
pub use export::{leaderboard_to_csv, ExportError};
pub use normalize::{normalize_results, CandidateRow, NormalizeStats, NormalizedResults};
pub use pair_key::{sanitize_name, PairKey};
pub use profilesets::{build_trinket_pair_profilesets, generate_profilesets, PairPlan, ProfilesetDef};
pub use ranking::{rank_rows, Leaderboard, ParseReferenceModeError, RankedRow, ReferenceMode};
pub use resolver::{resolve_pair_name, ResolveContext, Resolution, Strategy};
pub use uniqueness::{apply_unique_flags, find_unique_conflicts, UniqueConflict};

/// Normalized rows for one result set, ready to be ranked under any reference mode.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingSession {
    normalized: NormalizedResults,
    baseline_score: Option<f64>,
    baseline: BaselineOutcome,
}

impl RankingSession {
    /// Resolve, deduplicate and inject the equipped pair once.
    pub fn prepare(
        raw_rows: &[RawResultRow],
        baseline_score: Option<f64>,
        candidates: &[TrinketCandidate],
        metadata: &MetadataMap,
    ) -> Self {
        let ctx = ResolveContext::new(candidates, metadata);
        let mut normalized = normalize_results(raw_rows, &ctx);
        let baseline_score = baseline_score.filter(|score| score.is_finite());
        let baseline = inject_baseline(
            &mut normalized.rows,
            equipped_pair(candidates),
            baseline_score,
            &ctx,
        );
        Self {
            normalized,
            baseline_score,
            baseline,
        }
    }

    /// [RankingSession::prepare] over a simulator JSON report.
    pub fn from_report(report: &Value, candidates: &[TrinketCandidate], metadata: &MetadataMap) -> Self {
        Self::prepare(
            &extract_result_rows(report),
            extract_baseline_score(report),
            candidates,
            metadata,
        )
    }

    /// Rank without touching resolution state; repeatable for any mode.
    pub fn rank(&self, mode: ReferenceMode) -> Leaderboard {
        rank_rows(&self.normalized.rows, self.baseline_score, mode)
    }

    pub fn rows(&self) -> &[CandidateRow] {
        &self.normalized.rows
    }

    pub fn stats(&self) -> NormalizeStats {
        self.normalized.stats
    }

    pub fn baseline_score(&self) -> Option<f64> {
        self.baseline_score
    }

    pub fn baseline_outcome(&self) -> BaselineOutcome {
        self.baseline
    }
}
