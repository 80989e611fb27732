pub mod item;
pub mod metadata;
pub mod profile;
pub mod report;

pub use item::{index_metadata, ItemId, ItemMeta, ItemRef, ItemSource, MetadataMap, TrinketCandidate};
pub use metadata::{MetadataCache, MetadataError, MetadataSource, StaticMetadata, WowheadSource};
pub use profile::{extract_trinkets_all, TrinketScan};
pub use report::{extract_baseline_score, extract_result_rows, RawResultRow};
