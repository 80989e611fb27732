//! Narrow accessors over the simulator's JSON report.
//!
//! The report nests differently depending on how it was produced (a `sim`
//! wrapper or not) and result rows carry their score under one of several
//! fields. Every known shape is listed here and tried in order; nothing past
//! this module sees an untyped report.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const DEFAULT_ROW_NAME: &str = "set";

/// One profileset result as produced by the simulation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResultRow {
    pub name: String,
    /// Anything that is not a JSON number reads as `None`.
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<f64>,
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

impl RawResultRow {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score: Some(score),
        }
    }
}

/// Where the report keeps its players and profileset results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// `{ "sim": { "players": [...], "profilesets": { "results": [...] } } }`
    Nested,
    /// `{ "players": [...], "profilesets": { "results": [...] } }`
    Flat,
}

impl ReportLayout {
    pub const ALL: [Self; 2] = [Self::Nested, Self::Flat];

    fn results_pointer(self) -> &'static str {
        match self {
            Self::Nested => "/sim/profilesets/results",
            Self::Flat => "/profilesets/results",
        }
    }

    fn players_pointer(self) -> &'static str {
        match self {
            Self::Nested => "/sim/players",
            Self::Flat => "/players",
        }
    }
}

/// Field holding a result row's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreField {
    DpsMean,
    CollectedDpsMean,
    Mean,
}

impl ScoreField {
    const ALL: [Self; 3] = [Self::DpsMean, Self::CollectedDpsMean, Self::Mean];

    fn pointer(self) -> &'static str {
        match self {
            Self::DpsMean => "/dps/mean",
            Self::CollectedDpsMean => "/collected_data/dps/mean",
            Self::Mean => "/mean",
        }
    }
}

const NAME_FIELDS: [&str; 3] = ["name", "profileset", "profile"];

/// Profileset result rows in report order. Rows whose score is missing or not a
/// number keep `score: None`; the normalizer discards them.
pub fn extract_result_rows(report: &Value) -> Vec<RawResultRow> {
    let Some(results) = ReportLayout::ALL
        .iter()
        .find_map(|layout| report.pointer(layout.results_pointer()))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    results.iter().map(row_from_value).collect()
}

/// Score of the single-profile (non-profileset) run: the first player's mean DPS.
pub fn extract_baseline_score(report: &Value) -> Option<f64> {
    ReportLayout::ALL
        .iter()
        .find_map(|layout| report.pointer(layout.players_pointer()))
        .and_then(Value::as_array)
        .and_then(|players| players.first())
        .and_then(|player| player.pointer("/collected_data/dps/mean"))
        .and_then(Value::as_f64)
        .filter(|score| score.is_finite())
}

fn row_from_value(row: &Value) -> RawResultRow {
    let name = NAME_FIELDS
        .iter()
        .find_map(|field| row.get(*field).and_then(Value::as_str))
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_ROW_NAME)
        .to_string();
    // First present score field wins, even if it is not numeric.
    let score = ScoreField::ALL
        .iter()
        .find_map(|field| row.pointer(field.pointer()).filter(|v| !v.is_null()))
        .and_then(Value::as_f64);
    RawResultRow { name, score }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_layout_is_preferred() {
        let report = json!({
            "sim": {
                "players": [{ "collected_data": { "dps": { "mean": 90000.0 } } }],
                "profilesets": { "results": [{ "name": "T_111111_VS_222222", "mean": 95000.0 }] }
            },
            "profilesets": { "results": [{ "name": "ignored", "mean": 1.0 }] }
        });
        let rows = extract_result_rows(&report);
        assert_eq!(rows, vec![RawResultRow::new("T_111111_VS_222222", 95000.0)]);
        assert_eq!(extract_baseline_score(&report), Some(90000.0));
    }

    #[test]
    fn flat_layout_and_score_field_variants() {
        let report = json!({
            "players": [{ "collected_data": { "dps": { "mean": 1000.5 } } }],
            "profilesets": { "results": [
                { "name": "a", "dps": { "mean": 10.0 } },
                { "profileset": "b", "collected_data": { "dps": { "mean": 20.0 } } },
                { "profile": "c", "mean": 30 },
                { "name": "d", "mean": "fast" },
                { "mean": 40.0 }
            ] }
        });
        let rows = extract_result_rows(&report);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "set"]);
        let scores: Vec<Option<f64>> = rows.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![Some(10.0), Some(20.0), Some(30.0), None, Some(40.0)]);
        assert_eq!(extract_baseline_score(&report), Some(1000.5));
    }

    #[test]
    fn non_numeric_first_field_is_not_skipped() {
        let row = json!({ "name": "x", "dps": { "mean": "n/a" }, "mean": 5.0 });
        assert_eq!(row_from_value(&row).score, None);
    }

    #[test]
    fn supplied_rows_accept_non_numeric_scores() {
        let rows: Vec<RawResultRow> = serde_json::from_value(json!([
            { "name": "a", "score": 1.5 },
            { "name": "b", "score": "n/a" },
            { "name": "c", "score": null },
            { "name": "d" }
        ]))
        .expect("rows should deserialize");
        let scores: Vec<Option<f64>> = rows.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![Some(1.5), None, None, None]);
    }

    #[test]
    fn unknown_shapes_yield_nothing() {
        assert!(extract_result_rows(&json!({ "result": [] })).is_empty());
        assert_eq!(extract_baseline_score(&json!({ "sim": { "players": [] } })), None);
        assert_eq!(extract_baseline_score(&json!(null)), None);
    }
}
