//! Profileset text for the simulator: generic overrides and the trinket pair sweep.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::item::{ItemId, TrinketCandidate};
use crate::data::profile::{equipped_trinket_tails, item_id_from_override, trinket_tail};
use crate::topgear::pair_key::sanitize_name;
use crate::topgear::resolver::{PAIR_ID_DELIMITER, PAIR_NAME_PREFIX};

/// One named profileset: the first override opens it, the rest append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilesetDef {
    #[serde(default = "default_profileset_name")]
    pub name: String,
    #[serde(default)]
    pub overrides: Vec<String>,
}

fn default_profileset_name() -> String {
    "noname".to_string()
}

/// Base profile, a blank line, then every definition that has overrides.
pub fn generate_profilesets(base_profile: &str, defs: &[ProfilesetDef]) -> String {
    let mut lines = vec![base_profile.trim().to_string(), String::new()];
    for def in defs {
        let Some((first, rest)) = def.overrides.split_first() else {
            continue;
        };
        let name = def.name.replace('.', "_");
        lines.push(format!("profileset.\"{name}\"={first}"));
        lines.extend(rest.iter().map(|opt| format!("profileset.\"{name}\"+={opt}")));
    }
    lines.join("\n") + "\n"
}

/// Generated pair sweep plus what was left out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairPlan {
    pub text: String,
    pub pair_count: usize,
    pub skipped_equipped: usize,
    pub skipped_same_item: usize,
    /// Set when no pair could be formed and single-item sets were emitted instead.
    pub singles_fallback: bool,
}

struct PairItem {
    name: String,
    tail: String,
    id: Option<ItemId>,
}

/// Canonical pair profileset name, `T_<left>_VS_<right>`; unknown ids print as 0.
pub fn pair_profileset_name(left: Option<ItemId>, right: Option<ItemId>) -> String {
    sanitize_name(&format!(
        "{PAIR_NAME_PREFIX}{}{PAIR_ID_DELIMITER}{}",
        left.unwrap_or(0),
        right.unwrap_or(0)
    ))
}

/// Every unordered pair of distinct trinket rolls as a profileset. The
/// equipped pair is left out since the base actor already simulates it, and
/// two copies of one item id are never paired.
pub fn build_trinket_pair_profilesets(base_profile: &str, items: &[TrinketCandidate]) -> PairPlan {
    let mut seen: HashSet<String> = HashSet::new();
    let unique: Vec<PairItem> = items
        .iter()
        .filter(|item| item.override_config.contains("trinket"))
        .filter_map(|item| {
            let tail = trinket_tail(&item.override_config);
            if !seen.insert(tail.clone()) {
                return None;
            }
            let id = item.item_id.or_else(|| item_id_from_override(&tail));
            Some(PairItem {
                name: sanitize_name(&item.name),
                tail,
                id,
            })
        })
        .collect();

    let equipped = match equipped_trinket_tails(base_profile) {
        (Some(first), Some(second)) => Some(HashSet::from([first, second])),
        _ => None,
    };

    let mut lines = vec![base_profile.trim().to_string(), String::new()];
    let mut plan = PairPlan {
        text: String::new(),
        pair_count: 0,
        skipped_equipped: 0,
        skipped_same_item: 0,
        singles_fallback: false,
    };

    for (i, left) in unique.iter().enumerate() {
        for right in &unique[i + 1..] {
            if let Some(equipped) = &equipped {
                if equipped.len() == 2
                    && equipped.contains(&left.tail)
                    && equipped.contains(&right.tail)
                {
                    plan.skipped_equipped += 1;
                    continue;
                }
            }
            if matches!((left.id, right.id), (Some(a), Some(b)) if a == b) {
                plan.skipped_same_item += 1;
                continue;
            }
            let name = pair_profileset_name(left.id, right.id);
            lines.push(format!("profileset.\"{name}\"=trinket1={}", left.tail));
            lines.push(format!("profileset.\"{name}\"+=trinket2={}", right.tail));
            plan.pair_count += 1;
        }
    }

    if plan.pair_count == 0 {
        plan.singles_fallback = true;
        for item in &unique {
            let name = sanitize_name(&format!("{PAIR_NAME_PREFIX}{}", item.name));
            lines.push(format!("profileset.\"{name}\"=trinket1={}", item.tail));
        }
    }

    tracing::debug!(
        items = unique.len(),
        pairs = plan.pair_count,
        skipped_equipped = plan.skipped_equipped,
        skipped_same_item = plan.skipped_same_item,
        "built trinket pair profilesets"
    );
    plan.text = lines.join("\n") + "\n";
    plan
}

#[cfg(test)]
mod tests {
    use crate::data::item::ItemSource;

    use super::*;

    const BASE: &str = "warrior=\"T\"\ntrinket1=,id=111111\ntrinket2=,id=222222\n";

    fn item(slot: &str, id: ItemId, extra: &str) -> TrinketCandidate {
        TrinketCandidate {
            name: format!("{slot}_Item_{id}"),
            slot: slot.to_string(),
            item_id: Some(id),
            override_config: format!("{slot}=,id={id}{extra}"),
            source: ItemSource::Bags,
            unique_equipped: false,
        }
    }

    #[test]
    fn overrides_append_after_the_first() {
        let text = generate_profilesets(
            "base\n",
            &[
                ProfilesetDef {
                    name: "a.b".to_string(),
                    overrides: vec!["x=1".to_string(), "y=2".to_string()],
                },
                ProfilesetDef {
                    name: "empty".to_string(),
                    overrides: Vec::new(),
                },
            ],
        );
        assert_eq!(text, "base\n\nprofileset.\"a_b\"=x=1\nprofileset.\"a_b\"+=y=2\n");
    }

    #[test]
    fn pairs_skip_equipped_and_same_item() {
        let items = vec![
            item("trinket1", 111111, ""),
            item("trinket2", 222222, ""),
            item("trinket1", 333333, ""),
            item("trinket1", 333333, ",bonus_id=1"),
            item("trinket1", 333333, ""),
        ];
        let plan = build_trinket_pair_profilesets(BASE, &items);
        // 4 distinct tails -> 6 pairs, minus the equipped pair and the 333333 twins
        assert_eq!(plan.pair_count, 4);
        assert_eq!(plan.skipped_equipped, 1);
        assert_eq!(plan.skipped_same_item, 1);
        assert!(!plan.singles_fallback);
        assert!(plan
            .text
            .contains("profileset.\"T_111111_VS_333333\"=trinket1=,id=111111\n"));
        assert!(plan
            .text
            .contains("profileset.\"T_111111_VS_333333\"+=trinket2=,id=333333\n"));
        assert!(!plan.text.contains("T_111111_VS_222222"));
    }

    #[test]
    fn single_items_fall_back_to_singles() {
        let plan = build_trinket_pair_profilesets(BASE, &[item("trinket1", 444444, "")]);
        assert_eq!(plan.pair_count, 0);
        assert!(plan.singles_fallback);
        assert!(plan
            .text
            .ends_with("profileset.\"T_trinket1_Item_444444\"=trinket1=,id=444444\n"));
    }

    #[test]
    fn pair_names_use_canonical_encoding() {
        assert_eq!(pair_profileset_name(Some(219314), Some(219308)), "T_219314_VS_219308");
        assert_eq!(pair_profileset_name(None, Some(1)), "T_0_VS_1");
    }
}
