use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};

use crate::engine::action_budget::BudgetPolicy;
use crate::model::game_save::{SaveSlot, SlotId};
use crate::model::message::Turn;

pub const SLOTS_KEY: &str = "rpgGameSlots";
pub const ACTIVE_SLOT_KEY: &str = "rpgActiveSlotId";
pub const UI_SETTINGS_KEY: &str = "uiSettings";

/// String-keyed blob storage. Only single-key writes are atomic.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// One `<key>.json` file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating save directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// `<data dir>/kotodama_protocol`, or the working directory when the
    /// platform has no data directory.
    pub fn default_dir() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("kotodama_protocol");
        path
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        // Write then rename so a crash never leaves half a roster behind.
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, self.path(key)).with_context(|| format!("saving key {key}"))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing key {key}"))
            }
            _ => Ok(()),
        }
    }
}

/// In-process store, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Maps the slot roster to and from a [`KeyValueStore`].
pub struct SlotRepository<S> {
    store: S,
    policy: BudgetPolicy,
}

impl<S: KeyValueStore> SlotRepository<S> {
    pub fn new(store: S, policy: BudgetPolicy) -> Self {
        Self { store, policy }
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Missing or unreadable data is an empty roster, never an error.
    pub fn load_roster(&self) -> Vec<SaveSlot> {
        let Some(raw) = self.store.get(SLOTS_KEY) else {
            return Vec::new();
        };

        let records = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(records)) => records,
            Ok(_) => {
                tracing::warn!("saved roster is not a list, starting empty");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "saved roster is unreadable, starting empty");
                return Vec::new();
            }
        };

        records
            .into_iter()
            .filter_map(|record| match decode_slot(record, &self.policy) {
                Ok(slot) => Some(slot),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable save slot");
                    None
                }
            })
            .collect()
    }

    pub fn save_roster(&mut self, slots: &[SaveSlot]) -> Result<()> {
        let json = serde_json::to_string(slots)?;
        self.store.set(SLOTS_KEY, &json)
    }

    pub fn load_active_id(&self) -> Option<SlotId> {
        self.store.get(ACTIVE_SLOT_KEY)?.trim().trim_matches('"').parse().ok().map(SlotId)
    }

    pub fn save_active_id(&mut self, id: Option<SlotId>) -> Result<()> {
        match id {
            Some(id) => self.store.set(ACTIVE_SLOT_KEY, &id.to_string()),
            None => self.store.remove(ACTIVE_SLOT_KEY),
        }
    }
}

/// Decode one persisted slot record, upgrading legacy shapes first.
pub fn decode_slot(mut record: Value, policy: &BudgetPolicy) -> Result<SaveSlot> {
    let obj = record
        .as_object_mut()
        .context("save slot is not a JSON object")?;
    upgrade_legacy_record(obj, policy);

    let mut slot: SaveSlot = serde_json::from_value(record).context("decoding save slot")?;
    let budget = &mut slot.action_budget;
    budget.current = budget.current.min(budget.limit);
    Ok(slot)
}

/// Rewrite older record layouts into the current one, in place.
fn upgrade_legacy_record(obj: &mut Map<String, Value>, policy: &BudgetPolicy) {
    // Ids have been written both as numbers and as strings.
    let numeric_id = match obj.get("id") {
        Some(Value::String(id)) => id.trim().parse::<u64>().ok(),
        _ => None,
    };
    if let Some(id) = numeric_id {
        obj.insert("id".into(), json!(id));
    }

    if !obj.contains_key("actionBudget") {
        let budget = if let Some(daily) = obj.remove("dailyActions") {
            tracing::info!("upgrading dailyActions to actionBudget");
            budget_from_recovery_shape(&daily, policy)
        } else if let Some(actions) = obj.remove("actions") {
            tracing::info!("upgrading legacy actions record to actionBudget");
            if actions.get("lastUpdateTimestamp").is_some() {
                budget_from_timestamp_shape(&actions, policy)
            } else {
                budget_from_daily_count_shape(&actions, policy)
            }
        } else {
            json!({ "current": policy.initial, "limit": policy.limit, "lastRecovery": 0 })
        };
        obj.insert("actionBudget".into(), budget);
    }

    // Drop turns nobody can read instead of losing the whole slot.
    if let Some(Value::Array(turns)) = obj.get_mut("history") {
        let before = turns.len();
        turns.retain(|t| serde_json::from_value::<Turn>(t.clone()).is_ok());
        if turns.len() != before {
            tracing::warn!(dropped = before - turns.len(), "dropped malformed history turns");
        }
    }

    if matches!(obj.get("name"), Some(Value::Null)) {
        obj.remove("name");
    }
}

fn u32_field(value: &Value, key: &str) -> Option<u32> {
    value.get(key)?.as_u64().map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn millis_field(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// `{current, limit, lastRecovery}`
fn budget_from_recovery_shape(value: &Value, policy: &BudgetPolicy) -> Value {
    json!({
        "current": u32_field(value, "current").unwrap_or(policy.initial),
        "limit": u32_field(value, "limit").unwrap_or(policy.limit),
        "lastRecovery": millis_field(value, "lastRecovery"),
    })
}

/// `{lastUpdateTimestamp, current, limit}`
fn budget_from_timestamp_shape(value: &Value, policy: &BudgetPolicy) -> Value {
    json!({
        "current": u32_field(value, "current").unwrap_or(policy.initial),
        "limit": u32_field(value, "limit").unwrap_or(policy.limit),
        "lastRecovery": millis_field(value, "lastUpdateTimestamp"),
    })
}

/// `{date, count}`: `count` actions were spent on `date`.
fn budget_from_daily_count_shape(value: &Value, policy: &BudgetPolicy) -> Value {
    let used = u32_field(value, "count").unwrap_or(0);
    let last_recovery = value
        .get("date")
        .and_then(Value::as_str)
        .and_then(parse_legacy_date)
        .map(|d| d.timestamp_millis())
        .unwrap_or(0);

    json!({
        "current": policy.limit.saturating_sub(used),
        "limit": policy.limit,
        "lastRecovery": last_recovery,
    })
}

/// Accepts ISO dates ("2024-05-01") and browser date strings ("Wed May 01 2024").
fn parse_legacy_date(date: &str) -> Option<DateTime<Utc>> {
    let date = date.trim();
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%a %b %d %Y"))
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y/%m/%d"))
        .ok()?;
    let noon: NaiveDateTime = day.and_hms_opt(12, 0, 0)?;
    Some(noon.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scenario::ScenarioType;
    use chrono::TimeZone;

    fn repo() -> SlotRepository<MemoryStore> {
        SlotRepository::new(MemoryStore::default(), BudgetPolicy::default())
    }

    fn base_record() -> Value {
        json!({
            "id": 1715300000000u64,
            "name": "Aria",
            "stats": { "HP": { "current": 80, "max": 100 }, "STR": 14, "DEX": 9 },
            "history": [ { "role": "user", "parts": [ { "text": "rules" } ] } ],
            "inventory": ["Rope"],
            "modified": ["STR"],
            "scenarioType": "sf"
        })
    }

    #[test]
    fn empty_store_is_empty_roster() {
        assert!(repo().load_roster().is_empty());
        assert!(repo().load_active_id().is_none());
    }

    #[test]
    fn garbage_is_empty_roster() {
        let mut repo = repo();
        repo.store_mut().set(SLOTS_KEY, "{not json").unwrap();
        assert!(repo.load_roster().is_empty());
    }

    #[test]
    fn upgrades_daily_actions_key() {
        let mut record = base_record();
        record["dailyActions"] = json!({ "current": 7, "limit": 50, "lastRecovery": 1715300000000i64 });

        let slot = decode_slot(record, &BudgetPolicy::default()).unwrap();
        assert_eq!(slot.action_budget.current, 7);
        assert_eq!(slot.action_budget.last_recovery.timestamp_millis(), 1715300000000);
        assert_eq!(slot.scenario_type, ScenarioType::SciFi);
        assert_eq!(slot.sheet.name, "Aria");
        assert_eq!(slot.sheet.stats.score("STR"), Some(14));
    }

    #[test]
    fn upgrades_timestamp_actions_shape() {
        let mut record = base_record();
        record["actions"] = json!({ "lastUpdateTimestamp": 1715300000000i64, "current": 12, "limit": 50 });

        let slot = decode_slot(record, &BudgetPolicy::default()).unwrap();
        assert_eq!(slot.action_budget.current, 12);
        assert_eq!(slot.action_budget.last_recovery.timestamp_millis(), 1715300000000);
    }

    #[test]
    fn upgrades_daily_count_shape() {
        let mut record = base_record();
        record["actions"] = json!({ "date": "2024-05-01", "count": 30 });

        let slot = decode_slot(record, &BudgetPolicy::default()).unwrap();
        assert_eq!(slot.action_budget.current, 20);
        assert_eq!(
            slot.action_budget.last_recovery,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );

        let mut record = base_record();
        record["actions"] = json!({ "date": "Wed May 01 2024", "count": 3 });
        let slot = decode_slot(record, &BudgetPolicy::default()).unwrap();
        assert_eq!(slot.action_budget.current, 47);
    }

    #[test]
    fn missing_budget_gets_initial_allotment() {
        let slot = decode_slot(base_record(), &BudgetPolicy::default()).unwrap();
        assert_eq!(slot.action_budget.current, 50);
        assert_eq!(slot.action_budget.last_recovery.timestamp_millis(), 0);
    }

    #[test]
    fn over_limit_budget_is_clamped() {
        let mut record = base_record();
        record["actionBudget"] = json!({ "current": 90, "limit": 50, "lastRecovery": 0 });
        let slot = decode_slot(record, &BudgetPolicy::default()).unwrap();
        assert_eq!(slot.action_budget.current, 50);
    }

    #[test]
    fn string_ids_and_bad_turns_are_tolerated() {
        let mut record = base_record();
        record["id"] = json!("1715300000000");
        record["history"] = json!([
            { "role": "user", "parts": [ { "text": "rules" } ] },
            { "role": "model" },
            { "role": "model", "parts": [ { "text": "Welcome." } ] }
        ]);

        let slot = decode_slot(record, &BudgetPolicy::default()).unwrap();
        assert_eq!(slot.id, SlotId(1715300000000));
        assert_eq!(slot.history.len(), 2);
        assert_eq!(slot.history[1].text(), "Welcome.");
    }

    #[test]
    fn one_bad_slot_does_not_hide_the_others() {
        let mut repo = repo();
        let roster = json!([ base_record(), { "id": "not a number" }, 42 ]);
        repo.store_mut().set(SLOTS_KEY, &roster.to_string()).unwrap();

        let slots = repo.load_roster();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].sheet.inventory.items(), ["Rope".to_string()]);
    }

    #[test]
    fn roster_and_active_id_round_trip() {
        let mut repo = repo();
        let slot = decode_slot(base_record(), &BudgetPolicy::default()).unwrap();
        repo.save_roster(std::slice::from_ref(&slot)).unwrap();
        repo.save_active_id(Some(slot.id)).unwrap();

        assert_eq!(repo.load_roster(), vec![slot.clone()]);
        assert_eq!(repo.load_active_id(), Some(slot.id));

        repo.save_active_id(None).unwrap();
        assert!(repo.load_active_id().is_none());
    }

    #[test]
    fn file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStore::new(dir.path()).unwrap();
            store.set(SLOTS_KEY, "[]").unwrap();
            store.set(ACTIVE_SLOT_KEY, "12").unwrap();
            store.remove(ACTIVE_SLOT_KEY).unwrap();
            store.remove("never-written").unwrap();
        }
        let store = FileStore::new(dir.path()).unwrap();
        assert_eq!(store.get(SLOTS_KEY).as_deref(), Some("[]"));
        assert!(store.get(ACTIVE_SLOT_KEY).is_none());
    }
}
