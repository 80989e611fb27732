//! Order-independent identity of a two-item combination.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::item::{ItemId, ItemRef};

/// Maximum length of a sanitized simulator identifier.
pub const MAX_SANITIZED_LEN: usize = 64;
const SANITIZED_FALLBACK: &str = "item";

/// Simulator-safe identifier: runs of anything but `[A-Za-z0-9_]` become `_`,
/// repeated underscores collapse, edges are trimmed, length is capped.
pub fn sanitize_name(raw: &str) -> String {
    let mut collapsed = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let ch = if ch.is_ascii_alphanumeric() || ch == '_' {
            ch
        } else {
            '_'
        };
        if ch == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(ch);
    }
    let capped: String = collapsed
        .trim_matches('_')
        .chars()
        .take(MAX_SANITIZED_LEN)
        .collect();
    if capped.is_empty() {
        SANITIZED_FALLBACK.to_string()
    } else {
        capped
    }
}

/// Dedup and baseline-matching key. Resolved pairs key as `"<low>-<high>"`;
/// anything else keys on the sanitized raw result name. Sanitized names never
/// contain `-`, so the two forms cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn from_ids(a: ItemId, b: ItemId) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{low}-{high}"))
    }

    pub fn from_raw_name(raw_name: &str) -> Self {
        Self(sanitize_name(raw_name))
    }

    pub fn for_pair(left: &ItemRef, right: &ItemRef, raw_name: &str) -> Self {
        match (left.item_id, right.item_id) {
            (Some(a), Some(b)) => Self::from_ids(a, b),
            _ => Self::from_raw_name(raw_name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
