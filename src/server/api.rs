use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::data::item::{index_metadata, ItemId, ItemMeta, ItemSource, MetadataMap, TrinketCandidate};
use crate::data::metadata::{candidate_ids, MetadataError};
use crate::data::profile::{
    extract_equipped_trinkets, extract_trinkets_all, item_id_from_override, override_slot,
    trinket_tail,
};
use crate::data::report::{extract_baseline_score, extract_result_rows, RawResultRow};
use crate::jobs::{JobError, JobState, SimInput};
use crate::server::AppState;
use crate::topgear::{
    apply_unique_flags, build_trinket_pair_profilesets, find_unique_conflicts,
    generate_profilesets, BaselineOutcome, Leaderboard, NormalizeStats, ProfilesetDef,
    RankedRow, RankingSession, ReferenceMode,
};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationErrorResponse {
    fn new(errors: Vec<ValidationIssue>) -> Self {
        Self {
            status: "error",
            message: "Validation failed",
            errors,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    Parse(serde_json::Error),
    #[error("Validation failed")]
    Validation(ValidationErrorResponse),
    #[error("job `{job_id}` is {status:?}; results are not available yet")]
    Pending { job_id: String, status: JobState },
    /// The collaborator's own message, passed through unchanged.
    #[error("{0}")]
    JobFailed(String),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("failed to encode response: {0}")]
    Encode(serde_json::Error),
}

fn validation(errors: Vec<ValidationIssue>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(ValidationErrorResponse::new(errors)))
    }
}

fn issue(field: &'static str, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        field,
        messages: vec![message.into()],
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(ApiError::Encode)
}

fn decode<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(ApiError::Parse)
}

/// Value of `key` in the query part of `path`, if present.
pub fn query_param<'a>(path: &'a str, key: &str) -> Option<&'a str> {
    let query = path.split_once('?').map_or("", |(_, query)| query);
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        (name.trim() == key).then(|| value.trim())
    })
}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "topgear-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseTrinketsRequest {
    pub simc_input: String,
    #[serde(default = "default_true")]
    pub include_equipped: bool,
}

fn default_true() -> bool {
    true
}

pub fn parse_trinkets_payload(body: &str) -> Result<String, ApiError> {
    let request: ParseTrinketsRequest = decode(body)?;
    encode(&extract_trinkets_all(&request.simc_input, request.include_equipped))
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuickSimRequest {
    pub simc_input: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedResponse {
    pub status: &'static str,
    pub job_id: String,
}

pub fn quick_sim_payload(state: &AppState, body: &str) -> Result<String, ApiError> {
    let request: QuickSimRequest = decode(body)?;
    let mut errors = Vec::new();
    if request.simc_input.trim().is_empty() {
        errors.push(issue("simc_input", "must not be empty"));
    }
    validation(errors)?;

    let job_id = state.jobs.submit(SimInput {
        simc_text: request.simc_input,
        extra_args: request.extra_args,
    })?;
    encode(&SubmittedResponse {
        status: "queued",
        job_id,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopGearRequest {
    pub base_profile: String,
    pub profilesets: Vec<ProfilesetDef>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

pub fn top_gear_payload(state: &AppState, body: &str) -> Result<String, ApiError> {
    let request: TopGearRequest = decode(body)?;
    let mut errors = Vec::new();
    if request.base_profile.trim().is_empty() {
        errors.push(issue("base_profile", "must not be empty"));
    }
    if request.profilesets.iter().all(|def| def.overrides.is_empty()) {
        errors.push(issue("profilesets", "at least one profileset needs overrides"));
    }
    validation(errors)?;

    let text = generate_profilesets(&request.base_profile, &request.profilesets);
    let job_id = state.jobs.submit(SimInput {
        simc_text: text,
        extra_args: request.extra_args,
    })?;
    encode(&SubmittedResponse {
        status: "queued",
        job_id,
    })
}

/// One selected trinket as sent by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct PairItemRequest {
    pub name: String,
    #[serde(rename = "override")]
    pub override_config: String,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    #[serde(default)]
    pub unique_equipped: Option<bool>,
    #[serde(default)]
    pub source: ItemSource,
}

impl PairItemRequest {
    fn into_candidate(self) -> TrinketCandidate {
        let item_id = self
            .item_id
            .or_else(|| item_id_from_override(&self.override_config));
        TrinketCandidate {
            slot: override_slot(&self.override_config).to_string(),
            name: self.name,
            item_id,
            override_config: self.override_config,
            source: self.source,
            unique_equipped: self.unique_equipped.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrinketPairsRequest {
    pub base_profile: String,
    pub items: Vec<PairItemRequest>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrinketPairsResponse {
    pub status: &'static str,
    pub job_id: String,
    pub pair_count: usize,
    pub skipped_equipped: usize,
    pub skipped_same_item: usize,
    /// No pair could be formed; one profileset per trinket was queued instead.
    pub singles_fallback: bool,
    pub warnings: Vec<String>,
}

pub fn trinket_pairs_payload(state: &AppState, body: &str) -> Result<String, ApiError> {
    let request: TrinketPairsRequest = decode(body)?;
    let max_items = state.config.max_pair_items;
    let mut errors = Vec::new();
    if request.base_profile.trim().is_empty() {
        errors.push(issue("base_profile", "must not be empty"));
    }
    if request.items.is_empty() {
        errors.push(issue("items", "select at least 1 trinket"));
    } else if request.items.len() > max_items {
        errors.push(issue("items", format!("too many trinkets selected (max {max_items})")));
    }
    validation(errors)?;

    let mut selected: Vec<TrinketCandidate> = request
        .items
        .into_iter()
        .map(PairItemRequest::into_candidate)
        .collect();
    fill_unique_flags(state, &mut selected);
    let warnings: Vec<String> = find_unique_conflicts(&selected)
        .iter()
        .map(|conflict| conflict.message())
        .collect();
    for warning in &warnings {
        tracing::warn!(%warning, "unique-equipped conflict in selection");
    }

    let plan = build_trinket_pair_profilesets(&request.base_profile, &selected);
    let job_id = state.jobs.submit(SimInput {
        simc_text: plan.text,
        extra_args: request.extra_args,
    })?;
    state.remember_trinkets(&job_id, job_candidates(&request.base_profile, selected));

    encode(&TrinketPairsResponse {
        status: "queued",
        job_id,
        pair_count: plan.pair_count,
        skipped_equipped: plan.skipped_equipped,
        skipped_same_item: plan.skipped_same_item,
        singles_fallback: plan.singles_fallback,
        warnings,
    })
}

/// Look up uniqueness for selections the client did not flag. Lookup failure
/// only loses the advisory warning.
fn fill_unique_flags(state: &AppState, selected: &mut [TrinketCandidate]) {
    let missing: BTreeSet<ItemId> = selected
        .iter()
        .filter(|candidate| !candidate.unique_equipped)
        .filter_map(|candidate| candidate.item_id)
        .collect();
    if missing.is_empty() {
        return;
    }
    match state.metadata.fetch_metadata(&missing) {
        Ok(found) => apply_unique_flags(selected, &index_metadata(found)),
        Err(err) => tracing::warn!(error = %err, "uniqueness lookup skipped"),
    }
}

/// Equipped items of the base actor followed by the selection, one entry per gear tail.
fn job_candidates(base_profile: &str, selected: Vec<TrinketCandidate>) -> Vec<TrinketCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    extract_equipped_trinkets(base_profile)
        .into_iter()
        .chain(selected)
        .filter(|candidate| seen.insert(trinket_tail(&candidate.override_config)))
        .collect()
}

pub fn job_status_payload(state: &AppState, job_id: &str) -> Result<String, ApiError> {
    let status = state.jobs.status(job_id)?;
    encode(&status)
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardResponse {
    pub status: &'static str,
    pub reference: ReferenceMode,
    pub top_score: Option<f64>,
    pub reference_score: Option<f64>,
    pub baseline: BaselineOutcome,
    pub stats: NormalizeStats,
    pub rows: Vec<RankedRow>,
}

impl LeaderboardResponse {
    pub fn new(session: &RankingSession, board: Leaderboard) -> Self {
        Self {
            status: "ok",
            reference: board.reference,
            top_score: board.top_score,
            reference_score: board.reference_score,
            baseline: session.baseline_outcome(),
            stats: session.stats(),
            rows: board.rows,
        }
    }
}

fn parse_reference(raw: Option<&str>) -> Result<ReferenceMode, ApiError> {
    match raw {
        None => Ok(ReferenceMode::default()),
        Some(raw) => raw.parse::<ReferenceMode>().map_err(|err| {
            ApiError::Validation(ValidationErrorResponse::new(vec![issue(
                "reference",
                err.to_string(),
            )]))
        }),
    }
}

pub fn job_leaderboard_payload(state: &AppState, job_id: &str, path: &str) -> Result<String, ApiError> {
    let reference = parse_reference(query_param(path, "reference"))?;
    let status = state.jobs.status(job_id)?;
    let report = match status.status {
        JobState::Finished => status.result.map(|output| output.json).unwrap_or(Value::Null),
        JobState::Failed => {
            return Err(ApiError::JobFailed(
                status.error.unwrap_or_else(|| "simulation failed".to_string()),
            ))
        }
        pending => {
            return Err(ApiError::Pending {
                job_id: job_id.to_string(),
                status: pending,
            })
        }
    };

    let candidates = state.trinkets_for(job_id);
    let ids = candidate_ids(&candidates);
    let metadata = if ids.is_empty() {
        MetadataMap::new()
    } else {
        index_metadata(state.metadata.fetch_metadata(&ids)?)
    };

    let session = RankingSession::from_report(&report, &candidates, &metadata);
    encode(&LeaderboardResponse::new(&session, session.rank(reference)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardRequest {
    #[serde(default)]
    pub report: Option<Value>,
    #[serde(default)]
    pub rows: Option<Vec<RawResultRow>>,
    #[serde(default)]
    pub baseline_score: Option<f64>,
    #[serde(default)]
    pub trinkets: Vec<TrinketCandidate>,
    #[serde(default)]
    pub metadata: Vec<ItemMeta>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Rank caller-supplied results. Uses only the metadata in the request.
pub fn leaderboard_payload(body: &str) -> Result<String, ApiError> {
    let request: LeaderboardRequest = decode(body)?;
    let mut errors = Vec::new();
    if request.report.is_none() && request.rows.is_none() {
        errors.push(issue("rows", "provide `rows` or a simulator `report`"));
    }
    let reference = match request.reference.as_deref().map(str::parse::<ReferenceMode>) {
        None => ReferenceMode::default(),
        Some(Ok(mode)) => mode,
        Some(Err(err)) => {
            errors.push(issue("reference", err.to_string()));
            ReferenceMode::default()
        }
    };
    validation(errors)?;

    let rows = match (&request.rows, &request.report) {
        (Some(rows), _) => rows.clone(),
        (None, Some(report)) => extract_result_rows(report),
        (None, None) => Vec::new(),
    };
    let baseline_score = request
        .baseline_score
        .or_else(|| request.report.as_ref().and_then(extract_baseline_score));
    let metadata = index_metadata(request.metadata);

    let session = RankingSession::prepare(&rows, baseline_score, &request.trinkets, &metadata);
    encode(&LeaderboardResponse::new(&session, session.rank(reference)))
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<ItemMeta>,
}

pub fn items_payload(state: &AppState, path: &str) -> Result<String, ApiError> {
    let raw = query_param(path, "ids").unwrap_or("");
    let mut ids = BTreeSet::new();
    let mut bad = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.parse::<ItemId>() {
            Ok(id) => {
                ids.insert(id);
            }
            Err(_) => bad.push(format!("`{part}` is not an item id")),
        }
    }
    if ids.is_empty() && bad.is_empty() {
        bad.push("at least one item id is required".to_string());
    }
    if !bad.is_empty() {
        return Err(ApiError::Validation(ValidationErrorResponse::new(vec![ValidationIssue {
            field: "ids",
            messages: bad,
        }])));
    }

    let items = state.metadata.fetch_metadata(&ids)?;
    encode(&ItemsResponse { items })
}
