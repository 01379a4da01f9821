use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Key of the structured hit point stat.
pub const HP_KEY: &str = "HP";

/// Ability scores rolled for every new character, in display order.
pub const ABILITY_KEYS: [&str; 6] = ["STR", "DEX", "CON", "INT", "WIS", "CHA"];

pub const STARTING_HP: i32 = 100;

pub const INVENTORY_CAPACITY: usize = 5;

pub const UNSET_NAME: &str = "(unnamed)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub max: i32,
}

impl HitPoints {
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn damage(&mut self, amount: i32) {
        self.current = self.current.saturating_sub(amount).max(0);
    }

    pub fn heal(&mut self, amount: i32) {
        self.current = self.current.saturating_add(amount).min(self.max);
    }
}

/// Character stats. Serialises as one flat object: `{"HP": {...}, "STR": 12, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(rename = "HP", default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<HitPoints>,

    #[serde(flatten)]
    pub scores: BTreeMap<String, i32>,
}

impl Stats {
    pub fn score(&self, key: &str) -> Option<i32> {
        self.scores.get(key).copied()
    }

    /// Scores with the six abilities first, then any extra stats by key.
    pub fn ordered_scores(&self) -> Vec<(&str, i32)> {
        let mut out: Vec<(&str, i32)> = ABILITY_KEYS
            .iter()
            .filter_map(|k| self.scores.get(*k).map(|v| (*k, *v)))
            .collect();

        out.extend(
            self.scores
                .iter()
                .filter(|(k, _)| !ABILITY_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), *v)),
        );
        out
    }
}

/// Ability modifier shown next to a changed stat: 10 -> "", 12 -> "+1", 8 -> "-1".
pub fn modifier_label(value: i32) -> String {
    let modifier = (i64::from(value) - 10).div_euclid(2);
    match modifier {
        0 => String::new(),
        m if m > 0 => format!("+{m}"),
        m => m.to_string(),
    }
}

/// Carried items, bounded by [`INVENTORY_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory(Vec<String>);

impl Inventory {
    pub fn items(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.0.len() >= INVENTORY_CAPACITY
    }

    /// Returns false when the bag is already full.
    pub fn add(&mut self, label: &str) -> bool {
        if self.is_full() {
            return false;
        }
        self.0.push(label.to_string());
        true
    }

    /// Removes every entry equal to `label`; returns how many were removed.
    pub fn remove(&mut self, label: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|item| item != label);
        before - self.0.len()
    }
}

impl From<Vec<String>> for Inventory {
    fn from(items: Vec<String>) -> Self {
        Self(items)
    }
}

/// The part of a slot that model directives are allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    #[serde(default = "unset_name")]
    pub name: String,

    #[serde(default)]
    pub stats: Stats,

    #[serde(default)]
    pub inventory: Inventory,

    /// Stat keys changed since character creation.
    #[serde(default)]
    pub modified: BTreeSet<String>,
}

impl Default for CharacterSheet {
    fn default() -> Self {
        Self {
            name: unset_name(),
            stats: Stats::default(),
            inventory: Inventory::default(),
            modified: BTreeSet::new(),
        }
    }
}

fn unset_name() -> String {
    UNSET_NAME.to_string()
}
