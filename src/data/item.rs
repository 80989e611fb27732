//! Item identities shared by the profile parser, metadata lookup and the ranking engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Numeric item id as used by the simulator and item databases.
pub type ItemId = u32;

/// Metadata already known for the current view, keyed by item id.
pub type MetadataMap = HashMap<ItemId, ItemMeta>;

/// An item id plus a human label, independent of where the label came from.
/// `item_id` is `None` when resolution failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_id: Option<ItemId>,
    pub label: String,
}

impl ItemRef {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_id(item_id: ItemId, label: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id),
            label: label.into(),
        }
    }

    pub fn unresolved(label: impl Into<String>) -> Self {
        Self {
            item_id: None,
            label: label.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_id.is_none() && self.label.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Equipped,
    #[default]
    #[serde(alias = "bag", alias = "other")]
    Bags,
}

/// An item eligible for pairing, as parsed from the submitted profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrinketCandidate {
    /// Simulator-facing identifier (sanitized), distinct from the display label.
    pub name: String,
    #[serde(default)]
    pub slot: String,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    /// Gear line as emitted by the addon, e.g. `trinket1=,id=219314,bonus_id=10390`.
    #[serde(rename = "override", default)]
    pub override_config: String,
    #[serde(default)]
    pub source: ItemSource,
    #[serde(default)]
    pub unique_equipped: bool,
}

impl TrinketCandidate {
    pub fn is_equipped(&self) -> bool {
        self.source == ItemSource::Equipped
    }
}

/// Display metadata for one item id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    pub id: ItemId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub quality: Option<u32>,
    #[serde(default)]
    pub ilvl: Option<u32>,
    #[serde(default)]
    pub tooltip_html: Option<String>,
    #[serde(default)]
    pub unique_equipped: bool,
}

impl ItemMeta {
    /// Display name, if the source supplied a non-blank one.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }
}

/// Index a metadata list by id; later entries win.
pub fn index_metadata(items: impl IntoIterator<Item = ItemMeta>) -> MetadataMap {
    items.into_iter().map(|meta| (meta.id, meta)).collect()
}
