use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde_json::Value;

use crate::engine::action_budget::BudgetLedger;
use crate::engine::slot_repository::{decode_slot, KeyValueStore, SlotRepository};
use crate::engine::transcript::slot_from_transcript;
use crate::model::game_save::{SaveSlot, SlotId};
use crate::model::game_state::{CharacterSheet, HitPoints, Stats, ABILITY_KEYS, STARTING_HP};
use crate::model::message::Turn;
use crate::model::scenario::ScenarioType;

pub const MAX_SAVE_SLOTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum StoreError {
    #[display("All {max} save slots are in use. Delete one first.")]
    SlotsFull { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// `replaced` is true when an existing slot with the same id was restored.
    Accepted { id: SlotId, replaced: bool },
    Rejected { reason: StoreError },
}

/// Owns the slot roster and the live copy of the slot being played.
pub struct GameStateStore<S> {
    repo: SlotRepository<S>,
    ledger: BudgetLedger,
    max_slots: usize,
    slots: Vec<SaveSlot>,
    active: Option<SaveSlot>,
}

impl<S: KeyValueStore> GameStateStore<S> {
    pub fn open(repo: SlotRepository<S>, ledger: BudgetLedger, max_slots: usize) -> Self {
        let slots = repo.load_roster();
        tracing::info!(slots = slots.len(), "save roster loaded");
        Self {
            repo,
            ledger,
            max_slots,
            slots,
            active: None,
        }
    }

    pub fn slots(&self) -> &[SaveSlot] {
        &self.slots
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.max_slots
    }

    pub fn active(&self) -> Option<&SaveSlot> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut SaveSlot> {
        self.active.as_mut()
    }

    /// Live slot and ledger together, for budget checks that mutate the slot.
    pub fn active_with_ledger(&mut self) -> Option<(&mut SaveSlot, &BudgetLedger)> {
        let ledger = &self.ledger;
        self.active.as_mut().map(|slot| (slot, ledger))
    }

    /// The slot that was being played when the store was last written.
    pub fn remembered_active_id(&self) -> Option<SlotId> {
        self.repo.load_active_id()
    }

    fn next_id(&self, now: DateTime<Utc>) -> SlotId {
        let stamp = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match self.slots.iter().map(|s| s.id.0).max() {
            Some(max) if stamp <= max => SlotId(max + 1),
            _ => SlotId(stamp),
        }
    }

    /// Roll a new character, prime its history with the scenario rulebook and
    /// make it the active slot.
    pub fn create_new_game(
        &mut self,
        scenario: ScenarioType,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Result<&SaveSlot, StoreError> {
        if self.is_full() {
            return Err(StoreError::SlotsFull { max: self.max_slots });
        }

        let stats = roll_stats(rng);
        let slot = SaveSlot {
            id: self.next_id(now),
            history: vec![Turn::user(priming_text(scenario.rulebook(), &stats))],
            sheet: CharacterSheet {
                stats,
                ..CharacterSheet::default()
            },
            action_budget: self.ledger.new_budget(now),
            scenario_type: scenario,
        };
        tracing::info!(slot = %slot.id, ?scenario, "new game created");

        self.slots.push(slot.clone());
        self.persist_roster();
        self.persist_active_id(Some(slot.id));

        Ok(&*self.active.insert(slot))
    }

    /// Copy a slot into live state and bring its action budget up to date.
    pub fn load_game(&mut self, id: SlotId, now: DateTime<Utc>) -> Option<&SaveSlot> {
        let Some(mut slot) = self.slots.iter().find(|s| s.id == id).cloned() else {
            tracing::warn!(slot = %id, "tried to load a slot that does not exist");
            return None;
        };

        self.ledger.reconcile(&mut slot.action_budget, now);
        tracing::info!(slot = %id, actions = slot.action_budget.current, "slot loaded");

        self.persist_active_id(Some(id));
        Some(&*self.active.insert(slot))
    }

    /// Write the live slot back into the roster and persist the whole roster.
    pub fn save_active_slot(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        match self.slots.iter_mut().find(|s| s.id == active.id) {
            Some(record) => *record = active.clone(),
            None => {
                tracing::warn!(slot = %active.id, "active slot missing from roster, re-adding it");
                self.slots.push(active.clone());
            }
        }
        self.persist_roster();
    }

    pub fn delete_slot(&mut self, id: SlotId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.id != id);
        let removed = self.slots.len() != before;

        if self.active.as_ref().is_some_and(|a| a.id == id) {
            self.active = None;
            self.persist_active_id(None);
        }
        self.persist_roster();

        if removed {
            tracing::info!(slot = %id, "slot deleted");
        }
        removed
    }

    /// Same id restores over the existing slot; anything else needs a free slot.
    pub fn import_slot(&mut self, slot: SaveSlot) -> ImportOutcome {
        let id = slot.id;

        if let Some(existing) = self.slots.iter_mut().find(|s| s.id == id) {
            *existing = slot.clone();
            if self.active.as_ref().is_some_and(|a| a.id == id) {
                self.active = Some(slot);
            }
            self.persist_roster();
            tracing::info!(slot = %id, "slot restored from import");
            return ImportOutcome::Accepted { id, replaced: true };
        }

        if self.is_full() {
            return ImportOutcome::Rejected {
                reason: StoreError::SlotsFull { max: self.max_slots },
            };
        }

        self.slots.push(slot);
        self.persist_roster();
        tracing::info!(slot = %id, "slot imported");
        ImportOutcome::Accepted { id, replaced: false }
    }

    /// Decode an exported record (legacy layouts included) and import it.
    pub fn import_record(&mut self, record: Value) -> anyhow::Result<ImportOutcome> {
        let slot = decode_slot(record, self.ledger.policy())?;
        anyhow::ensure!(!slot.history.is_empty(), "save data has no history");
        Ok(self.import_slot(slot))
    }

    /// Import a plain-text log as a brand new slot.
    pub fn import_transcript(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> ImportOutcome {
        let mut slot = slot_from_transcript(text, &self.ledger, now, rng);
        slot.id = self.next_id(now);
        self.import_slot(slot)
    }

    /// The reward path: top the live budget up by the configured amount.
    pub fn grant_reward(&mut self, now: DateTime<Utc>) -> Option<u32> {
        let amount = self.ledger.policy().reward_amount;
        let active = self.active.as_mut()?;
        self.ledger.reconcile(&mut active.action_budget, now);
        let granted = self.ledger.grant(&mut active.action_budget, amount);
        self.save_active_slot();
        Some(granted)
    }

    /// Suggested export file name, e.g. `Aria_20240510.json`.
    pub fn export_file_name(&self, today: NaiveDate) -> Option<String> {
        let active = self.active.as_ref()?;
        let stem: String = active
            .sheet
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let stem = if stem.trim_matches('_').is_empty() { "save".to_string() } else { stem };
        Some(format!("{}_{}.json", stem, today.format("%Y%m%d")))
    }

    /// Pretty JSON of the live slot together with its file name.
    pub fn export_active(&self, today: NaiveDate) -> Option<(String, String)> {
        let active = self.active.as_ref()?;
        let json = match serde_json::to_string_pretty(active) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "could not serialise the active slot");
                return None;
            }
        };
        Some((self.export_file_name(today)?, json))
    }

    fn persist_roster(&mut self) {
        if let Err(e) = self.repo.save_roster(&self.slots) {
            tracing::error!(error = %e, "failed to persist save slots");
        }
    }

    fn persist_active_id(&mut self, id: Option<SlotId>) {
        if let Err(e) = self.repo.save_active_id(id) {
            tracing::error!(error = %e, "failed to persist the active slot id");
        }
    }
}

fn roll_3d6(rng: &mut impl Rng) -> i32 {
    (0..3).map(|_| rng.gen_range(1..=6)).sum()
}

/// Six 3d6 ability scores and a full starting HP pool.
pub fn roll_stats(rng: &mut impl Rng) -> Stats {
    let scores: BTreeMap<String, i32> = ABILITY_KEYS
        .iter()
        .map(|key| (key.to_string(), roll_3d6(rng)))
        .collect();
    Stats {
        hp: Some(HitPoints::full(STARTING_HP)),
        scores,
    }
}

/// First user turn of every slot: the rulebook plus the rolled stats.
pub fn priming_text(rulebook: &str, stats: &Stats) -> String {
    let stats_json = serde_json::to_string(stats).unwrap_or_default();
    format!(
        "{}\n\nYour ability scores are {}. Taking them into account, act as the game master and start the game, following the rules strictly.",
        rulebook.trim_end(),
        stats_json
    )
}
