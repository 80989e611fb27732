//! Ordering, reference score and per-row deltas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topgear::normalize::CandidateRow;

/// Which score deltas are measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMode {
    /// The rank-1 row.
    Top,
    /// The equipped pair, falling back to the baseline score.
    #[default]
    Equipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reference mode `{0}` (expected `top` or `equipped`)")]
pub struct ParseReferenceModeError(pub String);

impl FromStr for ReferenceMode {
    type Err = ParseReferenceModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "equipped" | "" => Ok(Self::Equipped),
            other => Err(ParseReferenceModeError(other.to_string())),
        }
    }
}

impl fmt::Display for ReferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Top => "top",
            Self::Equipped => "equipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    #[serde(flatten)]
    pub row: CandidateRow,
    /// 1-based; equal scores keep input order and still get distinct ranks.
    pub rank: usize,
    pub is_top: bool,
    pub delta: Option<f64>,
    pub delta_pct: Option<f64>,
    /// `score / top_score` clamped to `[0, 1]`.
    pub bar_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub reference: ReferenceMode,
    pub top_score: Option<f64>,
    /// `None` when the chosen reference is zero or unavailable.
    pub reference_score: Option<f64>,
    pub rows: Vec<RankedRow>,
}

impl Leaderboard {
    pub fn equipped_row(&self) -> Option<&RankedRow> {
        self.rows.iter().find(|ranked| ranked.row.is_equipped_pair)
    }
}

/// Sort descending by score and attach rank, reference deltas and bar width.
/// Pure over its inputs; switching `mode` changes only `delta` and `delta_pct`.
pub fn rank_rows(rows: &[CandidateRow], baseline_score: Option<f64>, mode: ReferenceMode) -> Leaderboard {
    let mut ordered: Vec<&CandidateRow> = rows.iter().collect();
    // sort_by is stable
    ordered.sort_by(|left, right| right.score.total_cmp(&left.score));

    let baseline_score = baseline_score.filter(|score| score.is_finite());
    let top_score = ordered.first().map(|row| row.score).or(baseline_score);
    let reference = match mode {
        ReferenceMode::Top => top_score,
        ReferenceMode::Equipped => ordered
            .iter()
            .find(|row| row.is_equipped_pair)
            .map(|row| row.score)
            .or(baseline_score),
    }
    .filter(|score| *score != 0.0);

    let ranked = ordered
        .into_iter()
        .enumerate()
        .map(|(index, row)| RankedRow {
            rank: index + 1,
            is_top: index == 0,
            delta: reference.map(|reference| row.score - reference),
            delta_pct: reference.map(|reference| (row.score / reference - 1.0) * 100.0),
            bar_fraction: bar_fraction(row.score, top_score),
            row: row.clone(),
        })
        .collect();

    Leaderboard {
        reference: mode,
        top_score,
        reference_score: reference,
        rows: ranked,
    }
}

fn bar_fraction(score: f64, top_score: Option<f64>) -> f64 {
    match top_score {
        Some(top) if top != 0.0 => {
            let fraction = score / top;
            if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}
