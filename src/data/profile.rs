//! Trinket candidates from a SimulationCraft addon export.
//!
//! Bag items live in the commented `### Gear from Bags` section as a
//! `# Label (ilvl)` line followed by `# trinket1=,id=...`; equipped items are the
//! uncommented `trinket1=` / `trinket2=` lines of the base actor.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::data::item::{ItemId, ItemSource, TrinketCandidate};
use crate::topgear::sanitize_name;

pub const TRINKET_SLOTS: [&str; 2] = ["trinket1", "trinket2"];

fn bags_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^###\s*Gear from Bags\s*$").expect("bags header regex"))
}

fn section_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^###\s+").expect("section header regex"))
}

fn bag_item_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\s*(.+?)\s*\(\d+\)\s*$").expect("bag label regex"))
}

fn bag_assignment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\s*(\w+)\s*=\s*(,.*)$").expect("bag assignment regex"))
}

fn equipped_assignment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(trinket[12])\s*=\s*(,.*)$").expect("equipped assignment regex")
    })
}

fn item_id_field() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[,=])id=(\d+)").expect("item id regex"))
}

/// Result of scanning a profile for trinkets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrinketScan {
    pub trinkets: Vec<TrinketCandidate>,
    pub include_equipped: bool,
}

/// `id=<digits>` from a gear line; `bonus_id=` does not count.
pub fn item_id_from_override(line: &str) -> Option<ItemId> {
    item_id_field()
        .captures(line)
        .and_then(|caps| caps[1].parse::<ItemId>().ok())
}

/// `"trinket1=,id=..."` -> `",id=..."`. Used as the identity of a concrete item roll.
pub fn trinket_tail(override_line: &str) -> String {
    let rhs = override_line
        .split_once('=')
        .map_or(override_line, |(_, rhs)| rhs)
        .trim();
    if rhs.starts_with(',') {
        rhs.to_string()
    } else {
        format!(",{rhs}")
    }
}

/// Slot named by an override line (`trinket1=...` -> `trinket1`).
pub fn override_slot(override_line: &str) -> &str {
    override_line
        .split_once('=')
        .map_or("", |(slot, _)| slot.trim())
}

/// Trinkets from the `### Gear from Bags` section.
pub fn extract_bag_trinkets(simc_text: &str) -> Vec<TrinketCandidate> {
    let mut results = Vec::new();
    let mut in_bags = false;
    let mut last_label: Option<String> = None;

    for line in simc_text.lines() {
        let line = line.trim_end();
        if bags_header().is_match(line) {
            in_bags = true;
            continue;
        }
        if !in_bags {
            continue;
        }
        if section_header().is_match(line) {
            break;
        }
        if let Some(caps) = bag_item_label().captures(line) {
            last_label = Some(caps[1].to_string());
            continue;
        }
        let Some(caps) = bag_assignment().captures(line) else {
            continue;
        };
        let slot = &caps[1];
        if !TRINKET_SLOTS.contains(&slot) {
            continue;
        }
        let override_config = format!("{slot}={}", &caps[2]);
        let item_id = item_id_from_override(&caps[2]);
        let id_text = item_id.map_or_else(|| "item".to_string(), |id| id.to_string());
        let label = last_label
            .clone()
            .unwrap_or_else(|| format!("{slot}_{id_text}"));

        results.push(TrinketCandidate {
            name: sanitize_name(&format!("{slot}_{label}_{id_text}")),
            slot: slot.to_string(),
            item_id,
            override_config,
            source: ItemSource::Bags,
            unique_equipped: false,
        });
    }

    results
}

/// Equipped trinkets: uncommented `trinket1=` / `trinket2=` lines.
pub fn extract_equipped_trinkets(simc_text: &str) -> Vec<TrinketCandidate> {
    simc_text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let caps = equipped_assignment().captures(line.trim_end())?;
            let slot = caps[1].to_string();
            let rhs = caps[2].to_string();
            let item_id = item_id_from_override(&rhs);
            let id_text = item_id.map_or_else(|| "item".to_string(), |id| id.to_string());
            Some(TrinketCandidate {
                name: sanitize_name(&format!("{slot}_Equipped_{id_text}")),
                override_config: format!("{slot}={rhs}"),
                slot,
                item_id,
                source: ItemSource::Equipped,
                unique_equipped: false,
            })
        })
        .collect()
}

/// Equipped (when requested) then bag trinkets, deduplicated by gear tail.
/// Equipped entries come first so a repeated roll keeps its equipped source.
pub fn extract_trinkets_all(simc_text: &str, include_equipped: bool) -> TrinketScan {
    let equipped = if include_equipped {
        extract_equipped_trinkets(simc_text)
    } else {
        Vec::new()
    };
    let mut seen: HashSet<String> = HashSet::new();
    let trinkets = equipped
        .into_iter()
        .chain(extract_bag_trinkets(simc_text))
        .filter(|candidate| seen.insert(trinket_tail(&candidate.override_config)))
        .collect();

    TrinketScan {
        trinkets,
        include_equipped,
    }
}

/// Equipped trinket tails `(trinket1, trinket2)` of the base actor.
pub fn equipped_trinket_tails(base_profile: &str) -> (Option<String>, Option<String>) {
    let mut first = None;
    let mut second = None;
    for candidate in extract_equipped_trinkets(base_profile) {
        let tail = trinket_tail(&candidate.override_config);
        match candidate.slot.as_str() {
            "trinket1" => first = Some(tail),
            _ => second = Some(tail),
        }
    }
    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"# SimC Addon 11.0.5-01
warrior="Tester"
level=80
spec=fury

trinket1=,id=219314,bonus_id=10390/6652
trinket2=,id=225577,bonus_id=10390
# trinket1=,id=999999 commented out

### Gear from Bags
#
# Treacherous Transmitter (636)
# trinket1=,id=221023,bonus_id=6652
#
# Signet of the Priory (639)
# trinket2=,id=219308,bonus_id=10390
#
# Some Ring (626)
# finger1=,id=215135
#
# Ara-Kara Sacbrood (639)
# trinket1=,id=219314,bonus_id=10390/6652
#
### Additional Character Info
# trinket1=,id=111111
"#;

    #[test]
    fn item_id_ignores_bonus_id() {
        assert_eq!(item_id_from_override(",bonus_id=10390,id=219314"), Some(219314));
        assert_eq!(item_id_from_override("trinket1=,id=219314,bonus_id=1"), Some(219314));
        assert_eq!(item_id_from_override(",bonus_id=10390"), None);
    }

    #[test]
    fn tail_is_normalized_with_leading_comma() {
        assert_eq!(trinket_tail("trinket1=,id=1"), ",id=1");
        assert_eq!(trinket_tail("trinket2= id=1"), ",id=1");
        assert_eq!(override_slot("trinket2=,id=1"), "trinket2");
    }

    #[test]
    fn bag_section_yields_only_trinket_slots() {
        let bags = extract_bag_trinkets(PROFILE);
        let names: Vec<&str> = bags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "trinket1_Treacherous_Transmitter_221023",
                "trinket2_Signet_of_the_Priory_219308",
                "trinket1_Ara_Kara_Sacbrood_219314",
            ]
        );
        assert!(bags.iter().all(|t| t.source == ItemSource::Bags));
        assert_eq!(bags[0].override_config, "trinket1=,id=221023,bonus_id=6652");
    }

    #[test]
    fn equipped_lines_skip_comments() {
        let equipped = extract_equipped_trinkets(PROFILE);
        assert_eq!(equipped.len(), 2);
        assert_eq!(equipped[0].name, "trinket1_Equipped_219314");
        assert_eq!(equipped[1].item_id, Some(225577));
        assert!(equipped.iter().all(TrinketCandidate::is_equipped));
    }

    #[test]
    fn all_trinkets_dedupe_by_tail_and_keep_equipped_source() {
        let scan = extract_trinkets_all(PROFILE, true);
        assert_eq!(scan.trinkets.len(), 4);
        let sacbrood: Vec<_> = scan
            .trinkets
            .iter()
            .filter(|t| t.item_id == Some(219314))
            .collect();
        assert_eq!(sacbrood.len(), 1);
        assert_eq!(sacbrood[0].source, ItemSource::Equipped);

        let bags_only = extract_trinkets_all(PROFILE, false);
        assert_eq!(bags_only.trinkets.len(), 3);
        assert!(!bags_only.include_equipped);
    }

    #[test]
    fn equipped_tails_follow_slots() {
        let (first, second) = equipped_trinket_tails(PROFILE);
        assert_eq!(first.as_deref(), Some(",id=219314,bonus_id=10390/6652"));
        assert_eq!(second.as_deref(), Some(",id=225577,bonus_id=10390"));
    }
}
