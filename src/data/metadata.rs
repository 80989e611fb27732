//! Item display metadata lookup (name, icon, tooltip, uniqueness).
//!
//! [MetadataSource] is the collaborator seam; [WowheadSource] talks to the
//! public tooltip endpoints, [MetadataCache] keeps results for a TTL, and
//! [StaticMetadata] serves a fixed map for offline use and tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde_json::Value;
use thiserror::Error;

use crate::config::MetadataConfig;
use crate::data::item::{ItemId, ItemMeta, MetadataMap, TrinketCandidate};
use crate::parallel::WorkerPool;

const TOOLTIP_ENDPOINTS: [&str; 2] = [
    "https://nether.wowhead.com/tooltip/item/{id}?json",
    "https://www.wowhead.com/tooltip/item/{id}?json",
];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("item metadata unavailable for {attempted} item(s): {last_error}")]
    Unavailable { attempted: usize, last_error: String },
}

/// Fetch metadata for a set of ids. Ids the source does not know are simply
/// absent from the returned list.
pub trait MetadataSource: Send + Sync {
    fn fetch_metadata(&self, ids: &BTreeSet<ItemId>) -> Result<Vec<ItemMeta>, MetadataError>;
}

/// Fixed in-memory metadata.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    items: MetadataMap,
}

impl StaticMetadata {
    pub fn new(items: impl IntoIterator<Item = ItemMeta>) -> Self {
        Self {
            items: items.into_iter().map(|meta| (meta.id, meta)).collect(),
        }
    }
}

impl MetadataSource for StaticMetadata {
    fn fetch_metadata(&self, ids: &BTreeSet<ItemId>) -> Result<Vec<ItemMeta>, MetadataError> {
        Ok(ids.iter().filter_map(|id| self.items.get(id).cloned()).collect())
    }
}

/// Wowhead tooltip lookups over blocking HTTP, fanned out on a worker pool.
pub struct WowheadSource {
    agent: ureq::Agent,
    pool: WorkerPool,
}

enum LookupOutcome {
    Found(ItemMeta),
    Missing,
    Failed(String),
}

impl WowheadSource {
    pub fn new(config: &MetadataConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build();
        Self {
            agent,
            pool: WorkerPool::with_workers(config.workers),
        }
    }

    fn lookup(&self, id: ItemId) -> LookupOutcome {
        let mut last_error = None;
        for template in TOOLTIP_ENDPOINTS {
            let url = template.replace("{id}", &id.to_string());
            match self.agent.get(&url).call() {
                Ok(response) => match response.into_json::<Value>() {
                    Ok(body) => return LookupOutcome::Found(item_meta_from_tooltip(id, &body)),
                    Err(err) => {
                        tracing::debug!(id, %url, error = %err, "tooltip body was not json");
                    }
                },
                Err(ureq::Error::Status(code, _)) => {
                    tracing::debug!(id, %url, code, "tooltip endpoint returned error status");
                }
                Err(err) => {
                    tracing::debug!(id, %url, error = %err, "tooltip request failed");
                    last_error = Some(err.to_string());
                }
            }
        }
        match last_error {
            Some(err) => LookupOutcome::Failed(err),
            None => LookupOutcome::Missing,
        }
    }
}

impl MetadataSource for WowheadSource {
    fn fetch_metadata(&self, ids: &BTreeSet<ItemId>) -> Result<Vec<ItemMeta>, MetadataError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: Vec<ItemId> = ids.iter().copied().collect();
        let outcomes: Vec<LookupOutcome> =
            self.pool.install(|| wanted.par_iter().map(|&id| self.lookup(id)).collect());

        let mut found = Vec::new();
        let mut failures = 0usize;
        let mut last_error = String::new();
        for outcome in outcomes {
            match outcome {
                LookupOutcome::Found(meta) => found.push(meta),
                LookupOutcome::Missing => {}
                LookupOutcome::Failed(err) => {
                    failures += 1;
                    last_error = err;
                }
            }
        }
        if failures == wanted.len() {
            return Err(MetadataError::Unavailable {
                attempted: wanted.len(),
                last_error,
            });
        }
        if failures > 0 {
            tracing::warn!(failures, requested = wanted.len(), "some item lookups failed");
        }
        Ok(found)
    }
}

/// Build [ItemMeta] from a tooltip JSON body. Field names vary between endpoint versions.
pub fn item_meta_from_tooltip(id: ItemId, body: &Value) -> ItemMeta {
    let tooltip_html = first_text(body, &["tooltip", "tooltip_html"]);
    let unique_equipped = tooltip_html.as_deref().is_some_and(mentions_unique_equipped);

    ItemMeta {
        id,
        name: first_text(body, &["name", "title"]),
        icon: first_text(body, &["icon"]),
        quality: first_number(body, &["quality", "q"]),
        ilvl: first_number(body, &["ilvl", "level"]),
        tooltip_html,
        unique_equipped,
    }
}

fn first_text(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn first_number(body: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|key| body.get(*key).and_then(lenient_u32))
}

fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn mentions_unique_equipped(tooltip: &str) -> bool {
    tooltip.contains("Unique-Equipped") || tooltip.contains(">Unique<")
}

/// TTL cache in front of another source. Only misses are forwarded.
pub struct MetadataCache<S> {
    source: S,
    ttl: Duration,
    entries: Mutex<HashMap<ItemId, (Instant, ItemMeta)>>,
}

impl<S: MetadataSource> MetadataCache<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<S: MetadataSource> MetadataSource for MetadataCache<S> {
    fn fetch_metadata(&self, ids: &BTreeSet<ItemId>) -> Result<Vec<ItemMeta>, MetadataError> {
        let now = Instant::now();
        let mut hits = Vec::new();
        let mut misses = BTreeSet::new();
        {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for id in ids {
                match entries.get(id) {
                    Some((stored, meta)) if now.duration_since(*stored) < self.ttl => {
                        hits.push(meta.clone())
                    }
                    _ => {
                        misses.insert(*id);
                    }
                }
            }
        }
        if misses.is_empty() {
            return Ok(hits);
        }

        let fetched = self.source.fetch_metadata(&misses)?;
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for meta in &fetched {
                entries.insert(meta.id, (now, meta.clone()));
            }
        }
        hits.extend(fetched);
        hits.sort_by_key(|meta| meta.id);
        Ok(hits)
    }
}

/// Distinct ids of a candidate set.
pub fn candidate_ids(candidates: &[TrinketCandidate]) -> BTreeSet<ItemId> {
    candidates.iter().filter_map(|c| c.item_id).collect()
}
