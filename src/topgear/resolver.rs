//! Recovers which two items a profileset result name refers to.
//!
//! Result names have gone through several encodings, so resolution is an
//! ordered chain of independent matchers. Each returns a pair or nothing; the
//! first one that yields a pair wins. When all of them fail the row resolves to
//! two empty references and is kept as unresolved.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::data::item::{ItemId, ItemRef, MetadataMap, TrinketCandidate};
use crate::topgear::pair_key::sanitize_name;

/// Prefix of generated pair profileset names.
pub const PAIR_NAME_PREFIX: &str = "T_";
/// Separator between the two ids in the canonical `T_<id>_VS_<id>` encoding.
pub const PAIR_ID_DELIMITER: &str = "_VS_";
/// Separator between the two segments in the older `T_<a>__<b>` encoding.
pub const SEGMENT_DELIMITER: &str = "__";

const ITEM_ID_DIGITS: usize = 6;

fn canonical_pair_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"^{}(\d{{{digits}}}){}(\d{{{digits}}})$",
            regex_lite::escape(PAIR_NAME_PREFIX),
            regex_lite::escape(PAIR_ID_DELIMITER),
            digits = ITEM_ID_DIGITS,
        );
        Regex::new(&pattern).expect("canonical pair regex")
    })
}

fn slot_marker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)trinket([12])").expect("slot marker regex"))
}

/// Read-only lookup state for one resolution pass.
#[derive(Debug, Clone)]
pub struct ResolveContext<'a> {
    candidates: &'a [TrinketCandidate],
    metadata: &'a MetadataMap,
    known_ids: BTreeSet<ItemId>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(candidates: &'a [TrinketCandidate], metadata: &'a MetadataMap) -> Self {
        let known_ids = candidates
            .iter()
            .filter_map(|candidate| candidate.item_id)
            .chain(metadata.keys().copied())
            .collect();
        Self {
            candidates,
            metadata,
            known_ids,
        }
    }

    pub fn known_ids(&self) -> &BTreeSet<ItemId> {
        &self.known_ids
    }

    pub fn candidates(&self) -> &'a [TrinketCandidate] {
        self.candidates
    }

    /// Best label for an id: metadata name, else the matching candidate's
    /// simulator name turned into words, else `Item <id>`.
    pub fn label_for_id(&self, id: ItemId) -> String {
        if let Some(name) = self.metadata.get(&id).and_then(|meta| meta.display_name()) {
            return name.to_string();
        }
        self.candidates
            .iter()
            .find(|candidate| candidate.item_id == Some(id))
            .map(|candidate| fallback_label(&candidate.name))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| format!("Item {id}"))
    }

    pub fn item_ref(&self, id: ItemId) -> ItemRef {
        ItemRef::with_id(id, self.label_for_id(id))
    }
}

/// Matchers in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// `T_<6 digits>_VS_<6 digits>`.
    CanonicalIdPair,
    /// `T_<left>__<right>`, each side searched for its last 6-digit run.
    DualSegment,
    /// `trinket1 ... trinket2 ...` slot markers.
    SlotMarkers,
    /// First two distinct 6-digit runs anywhere in the name.
    FirstTwoIds,
    /// Known ids contained in the name. Left/right order is not meaningful.
    KnownIdScan,
    /// Sanitized candidate names contained in the name.
    LabelScan,
}

type Matcher = fn(&str, &ResolveContext<'_>) -> Option<[ItemRef; 2]>;

impl Strategy {
    pub const ORDER: [Self; 6] = [
        Self::CanonicalIdPair,
        Self::DualSegment,
        Self::SlotMarkers,
        Self::FirstTwoIds,
        Self::KnownIdScan,
        Self::LabelScan,
    ];

    fn matcher(self) -> Matcher {
        match self {
            Self::CanonicalIdPair => match_canonical_id_pair,
            Self::DualSegment => match_dual_segment,
            Self::SlotMarkers => match_slot_markers,
            Self::FirstTwoIds => match_first_two_ids,
            Self::KnownIdScan => match_known_ids,
            Self::LabelScan => match_candidate_labels,
        }
    }

    /// Whether left/right order of the result reflects the encoding.
    pub fn preserves_order(self) -> bool {
        !matches!(self, Self::KnownIdScan)
    }
}

/// Outcome of resolving one result name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub items: [ItemRef; 2],
    /// `None` when no matcher applied.
    pub strategy: Option<Strategy>,
}

impl Resolution {
    pub fn unresolved() -> Self {
        Self {
            items: [ItemRef::empty(), ItemRef::empty()],
            strategy: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.strategy.is_some()
    }
}

/// Resolve a result-row name into two item references.
pub fn resolve_pair_name(name: &str, ctx: &ResolveContext<'_>) -> Resolution {
    for strategy in Strategy::ORDER {
        if let Some(items) = (strategy.matcher())(name, ctx) {
            tracing::trace!(name, ?strategy, "resolved result name");
            return Resolution {
                items,
                strategy: Some(strategy),
            };
        }
    }
    tracing::debug!(name, "result name did not match any encoding");
    Resolution::unresolved()
}

fn match_canonical_id_pair(name: &str, ctx: &ResolveContext<'_>) -> Option<[ItemRef; 2]> {
    let caps = canonical_pair_pattern().captures(name.trim())?;
    let left = caps[1].parse::<ItemId>().ok()?;
    let right = caps[2].parse::<ItemId>().ok()?;
    Some([ctx.item_ref(left), ctx.item_ref(right)])
}

fn match_dual_segment(name: &str, ctx: &ResolveContext<'_>) -> Option<[ItemRef; 2]> {
    let trimmed = name.trim();
    let body = trimmed.strip_prefix(PAIR_NAME_PREFIX).unwrap_or(trimmed);
    let (left, right) = body.split_once(SEGMENT_DELIMITER)?;
    let (left, right) = (clean_segment(left), clean_segment(right));
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some([segment_ref(left, ctx), segment_ref(right, ctx)])
}

fn match_slot_markers(name: &str, ctx: &ResolveContext<'_>) -> Option<[ItemRef; 2]> {
    // (slot number, marker start, marker end)
    let markers: Vec<(u8, usize, usize)> = slot_marker_pattern()
        .captures_iter(name)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let slot = caps[1].parse::<u8>().ok()?;
            Some((slot, whole.start(), whole.end()))
        })
        .collect();
    let first = markers.iter().find(|(slot, _, _)| *slot == 1)?;
    let second = markers
        .iter()
        .find(|(slot, start, _)| *slot == 2 && *start >= first.2)?;
    let right_end = markers
        .iter()
        .find(|(_, start, _)| *start >= second.2)
        .map_or(name.len(), |(_, start, _)| *start);

    let left = clean_segment(&name[first.2..second.1]);
    let right = clean_segment(&name[second.2..right_end]);
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some([segment_ref(left, ctx), segment_ref(right, ctx)])
}

fn match_first_two_ids(name: &str, ctx: &ResolveContext<'_>) -> Option<[ItemRef; 2]> {
    let mut distinct: Vec<ItemId> = Vec::with_capacity(2);
    for id in six_digit_runs(name) {
        if !distinct.contains(&id) {
            distinct.push(id);
        }
        if distinct.len() == 2 {
            return Some([ctx.item_ref(distinct[0]), ctx.item_ref(distinct[1])]);
        }
    }
    None
}

fn match_known_ids(name: &str, ctx: &ResolveContext<'_>) -> Option<[ItemRef; 2]> {
    let mut hits = ctx
        .known_ids()
        .iter()
        .copied()
        .filter(|id| name.contains(&id.to_string()));
    let left = hits.next()?;
    let right = hits.next()?;
    Some([ctx.item_ref(left), ctx.item_ref(right)])
}

fn match_candidate_labels(name: &str, ctx: &ResolveContext<'_>) -> Option<[ItemRef; 2]> {
    let mut seen: Vec<String> = Vec::with_capacity(2);
    let mut refs: Vec<ItemRef> = Vec::with_capacity(2);
    for candidate in ctx.candidates() {
        if candidate.name.trim().is_empty() {
            continue;
        }
        let sanitized = sanitize_name(&candidate.name);
        if seen.contains(&sanitized) || !name.contains(&sanitized) {
            continue;
        }
        refs.push(match candidate.item_id {
            Some(id) => ctx.item_ref(id),
            None => ItemRef::unresolved(fallback_label(&candidate.name)),
        });
        seen.push(sanitized);
        if refs.len() == 2 {
            let right = refs.pop()?;
            let left = refs.pop()?;
            return Some([left, right]);
        }
    }
    None
}

fn segment_ref(segment: &str, ctx: &ResolveContext<'_>) -> ItemRef {
    match six_digit_runs(segment).last().copied() {
        Some(id) => ctx.item_ref(id),
        None => ItemRef::unresolved(fallback_label(segment)),
    }
}

fn is_delimiter(ch: char) -> bool {
    ch == '_' || ch == '-' || ch == '.' || ch.is_whitespace()
}

fn clean_segment(segment: &str) -> &str {
    segment.trim_matches(is_delimiter)
}

/// Maximal digit runs of exactly six digits, left to right.
pub fn six_digit_runs(text: &str) -> Vec<ItemId> {
    let bytes = text.as_bytes();
    let mut ids = Vec::new();
    let mut start = None;
    for (idx, byte) in bytes.iter().chain(std::iter::once(&b' ')).enumerate() {
        match (byte.is_ascii_digit(), start) {
            (true, None) => start = Some(idx),
            (false, Some(run_start)) => {
                if idx - run_start == ITEM_ID_DIGITS {
                    if let Ok(id) = text[run_start..idx].parse::<ItemId>() {
                        ids.push(id);
                    }
                }
                start = None;
            }
            _ => {}
        }
    }
    ids
}

/// Display label from a simulator-style name when no metadata name exists:
/// drops a trailing 6-digit id, then turns the remaining delimiters into
/// single spaces. The slot prefix stays so the two equipped items differ.
pub fn fallback_label(raw: &str) -> String {
    let trimmed = raw.trim_matches(is_delimiter);
    let without_id = strip_trailing_id(trimmed);
    without_id
        .split(is_delimiter)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_trailing_id(text: &str) -> &str {
    let digits_start = text.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if text.len() - digits_start == ITEM_ID_DIGITS {
        &text[..digits_start]
    } else {
        text
    }
}
