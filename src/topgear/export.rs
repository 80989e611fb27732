//! Leaderboard as CSV.

use serde::Serialize;
use thiserror::Error;

use crate::data::item::ItemId;
use crate::topgear::ranking::{Leaderboard, RankedRow};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Flush(String),
    #[error("csv output is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    rank: usize,
    pair_key: &'a str,
    left_id: Option<ItemId>,
    left_label: &'a str,
    right_id: Option<ItemId>,
    right_label: &'a str,
    score: f64,
    delta: Option<f64>,
    delta_pct: Option<f64>,
    bar_fraction: f64,
    is_top: bool,
    is_equipped_pair: bool,
}

impl<'a> From<&'a RankedRow> for CsvRecord<'a> {
    fn from(ranked: &'a RankedRow) -> Self {
        let [left, right] = &ranked.row.items;
        Self {
            rank: ranked.rank,
            pair_key: ranked.row.pair_key.as_str(),
            left_id: left.item_id,
            left_label: &left.label,
            right_id: right.item_id,
            right_label: &right.label,
            score: ranked.row.score,
            delta: ranked.delta,
            delta_pct: ranked.delta_pct,
            bar_fraction: ranked.bar_fraction,
            is_top: ranked.is_top,
            is_equipped_pair: ranked.row.is_equipped_pair,
        }
    }
}

/// One line per ranked row, header first. Null deltas become empty cells.
pub fn leaderboard_to_csv(board: &Leaderboard) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for ranked in &board.rows {
        writer.serialize(CsvRecord::from(ranked))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.error().to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
