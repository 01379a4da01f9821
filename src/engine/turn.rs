use chrono::{DateTime, Utc};

use crate::engine::directive_parser::parse_response;
use crate::engine::game_store::GameStateStore;
use crate::engine::llm_client::NarrationError;
use crate::engine::slot_repository::KeyValueStore;
use crate::model::event_result::ParsedResponse;
use crate::model::game_save::SlotId;
use crate::model::message::Turn;
use crate::model::scenario::ScenarioType;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum TurnError {
    #[display("The narrator is still writing. Wait for the current turn to finish.")]
    TurnInFlight,
    #[display("No adventure is loaded.")]
    NoActiveSlot,
    #[display("Type an action first.")]
    EmptyCommand,
    #[display("{}", scenario.exhausted_notice())]
    OutOfActions { scenario: ScenarioType },
    #[display("The story is waiting on the narrator, not on you.")]
    InvalidHistory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Narrated(ParsedResponse),
    Failed(String),
}

/// Single-flight gate around narration calls.
///
/// `begin_turn`/`resume` hand out the history to send; the caller runs the
/// call wherever it likes and reports back through `complete_turn`.
#[derive(Debug, Default)]
pub struct TurnOrchestrator {
    in_flight: Option<SlotId>,
}

impl TurnOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn begin_turn<S: KeyValueStore>(
        &mut self,
        store: &mut GameStateStore<S>,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Turn>, TurnError> {
        if self.is_in_flight() {
            return Err(TurnError::TurnInFlight);
        }
        let (slot, ledger) = store.active_with_ledger().ok_or(TurnError::NoActiveSlot)?;

        let command = command.trim();
        if command.is_empty() {
            return Err(TurnError::EmptyCommand);
        }

        let scenario = slot.scenario_type;
        if scenario.consumes_actions() {
            if !ledger.has_remaining(&mut slot.action_budget, now) {
                return Err(TurnError::OutOfActions { scenario });
            }
            ledger.consume(&mut slot.action_budget);
        }

        slot.history.push(Turn::user(command));
        tracing::debug!(slot = %slot.id, actions = slot.action_budget.current, "player turn recorded");
        store.save_active_slot();

        self.start(store)
    }

    /// Ask for narration on a slot that is already waiting for one, e.g. a
    /// fresh game or a reload after an interrupted turn. Costs no action.
    pub fn resume<S: KeyValueStore>(
        &mut self,
        store: &mut GameStateStore<S>,
    ) -> Result<Vec<Turn>, TurnError> {
        if self.is_in_flight() {
            return Err(TurnError::TurnInFlight);
        }
        self.start(store)
    }

    fn start<S: KeyValueStore>(
        &mut self,
        store: &GameStateStore<S>,
    ) -> Result<Vec<Turn>, TurnError> {
        let slot = store.active().ok_or(TurnError::NoActiveSlot)?;
        if !slot.awaiting_narration() {
            return Err(TurnError::InvalidHistory);
        }
        self.in_flight = Some(slot.id);
        Ok(slot.history.clone())
    }

    pub fn complete_turn<S: KeyValueStore>(
        &mut self,
        store: &mut GameStateStore<S>,
        result: Result<String, NarrationError>,
    ) -> TurnOutcome {
        let Some(requested_for) = self.in_flight.take() else {
            tracing::warn!("narration result arrived with no turn in flight");
            return TurnOutcome::Failed("Unexpected narration result.".to_string());
        };

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(slot = %requested_for, error = %e, "narration failed");
                return TurnOutcome::Failed(e.to_string());
            }
        };

        let Some(slot) = store.active_mut().filter(|s| s.id == requested_for) else {
            tracing::warn!(slot = %requested_for, "slot closed before narration arrived, reply dropped");
            return TurnOutcome::Failed("The adventure was closed before the narrator replied.".to_string());
        };

        slot.history.push(Turn::model(text.as_str()));
        let parsed = parse_response(&text, &mut slot.sheet);
        store.save_active_slot();
        TurnOutcome::Narrated(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action_budget::{BudgetLedger, BudgetPolicy};
    use crate::engine::game_store::MAX_SAVE_SLOTS;
    use crate::engine::slot_repository::{MemoryStore, SlotRepository};
    use crate::model::message::Role;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap()
    }

    fn store_with(scenario: ScenarioType) -> GameStateStore<MemoryStore> {
        let policy = BudgetPolicy::default();
        let mut store = GameStateStore::open(
            SlotRepository::new(MemoryStore::default(), policy),
            BudgetLedger::new(policy),
            MAX_SAVE_SLOTS,
        );
        store
            .create_new_game(scenario, now(), &mut StdRng::seed_from_u64(1))
            .unwrap();
        store
    }

    /// Fresh game: answer the priming turn so the player can act.
    fn primed(scenario: ScenarioType) -> (GameStateStore<MemoryStore>, TurnOrchestrator) {
        let mut store = store_with(scenario);
        let mut turns = TurnOrchestrator::new();
        turns.resume(&mut store).unwrap();
        turns.complete_turn(&mut store, Ok("Welcome.\n[ACTION] Look around".into()));
        (store, turns)
    }

    #[test]
    fn new_game_resumes_without_spending() {
        let mut store = store_with(ScenarioType::Fantasy);
        let mut turns = TurnOrchestrator::new();
        let history = turns.resume(&mut store).unwrap();
        assert_eq!(history.len(), 1);
        assert!(turns.is_in_flight());
        assert_eq!(store.active().unwrap().action_budget.current, 50);
    }

    #[test]
    fn full_turn_applies_directives() {
        let (mut store, mut turns) = primed(ScenarioType::Fantasy);
        let str_before = store.active().unwrap().sheet.stats.score("STR").unwrap();

        let history = turns.begin_turn(&mut store, "  lift the boulder ", now()).unwrap();
        assert_eq!(history.last().unwrap().text(), "lift the boulder");
        assert_eq!(store.active().unwrap().action_budget.current, 49);

        let reply = "You heave.\n[STAT] STR +3\n[DAMAGE] 150\n[ITEM_ADD] Pebble\n[ACTION] Rest";
        let TurnOutcome::Narrated(parsed) = turns.complete_turn(&mut store, Ok(reply.into())) else {
            panic!("expected narration");
        };
        assert_eq!(parsed.narrative_text, "You heave.");
        assert_eq!(parsed.actions, vec!["Rest".to_string()]);
        assert_eq!(parsed.stat_changes.get("STR").map(String::as_str), Some("+3"));

        let slot = store.active().unwrap();
        assert_eq!(slot.sheet.stats.score("STR"), Some(str_before + 3));
        assert_eq!(slot.sheet.stats.hp.unwrap().current, 0);
        assert_eq!(slot.sheet.inventory.items(), ["Pebble".to_string()]);
        assert_eq!(slot.history.last().unwrap().role, Role::Model);
        assert_eq!(store.slots()[0].history.len(), slot.history.len());
    }

    #[test]
    fn second_submit_is_rejected_while_in_flight() {
        let (mut store, mut turns) = primed(ScenarioType::Fantasy);
        turns.begin_turn(&mut store, "go north", now()).unwrap();
        let err = turns.begin_turn(&mut store, "go south", now()).unwrap_err();
        assert_eq!(err, TurnError::TurnInFlight);

        let slot = store.active().unwrap();
        assert_eq!(slot.action_budget.current, 49);
        assert_eq!(slot.history.last().unwrap().text(), "go north");
    }

    #[test]
    fn failed_narration_keeps_player_turn() {
        let (mut store, mut turns) = primed(ScenarioType::Fantasy);
        turns.begin_turn(&mut store, "open the door", now()).unwrap();

        let outcome = turns.complete_turn(&mut store, Err(NarrationError::Provider("timeout".into())));
        assert_eq!(outcome, TurnOutcome::Failed("Narration failed: timeout".into()));
        assert!(!turns.is_in_flight());

        let slot = store.active().unwrap();
        assert_eq!(slot.history.last().unwrap().text(), "open the door");
        assert_eq!(slot.action_budget.current, 49);
        assert!(slot.awaiting_narration());

        // The player can retry without paying again.
        assert!(turns.resume(&mut store).is_ok());
    }

    #[test]
    fn trial_scenario_is_free() {
        let (mut store, mut turns) = primed(ScenarioType::Trial);
        store.active_mut().unwrap().action_budget.current = 0;
        turns.begin_turn(&mut store, "wave", now()).unwrap();
        assert_eq!(store.active().unwrap().action_budget.current, 0);
    }

    #[test]
    fn empty_budget_blocks_paid_scenarios() {
        let (mut store, mut turns) = primed(ScenarioType::SciFi);
        store.active_mut().unwrap().action_budget.current = 0;
        let err = turns.begin_turn(&mut store, "jack in", now()).unwrap_err();
        assert_eq!(err, TurnError::OutOfActions { scenario: ScenarioType::SciFi });
        assert!(!turns.is_in_flight());
        assert_eq!(store.active().unwrap().history.last().unwrap().role, Role::Model);
    }

    #[test]
    fn blank_command_and_missing_slot() {
        let (mut store, mut turns) = primed(ScenarioType::Fantasy);
        assert_eq!(turns.begin_turn(&mut store, "   ", now()), Err(TurnError::EmptyCommand));

        let id = store.active().unwrap().id;
        store.delete_slot(id);
        assert_eq!(turns.begin_turn(&mut store, "hello", now()), Err(TurnError::NoActiveSlot));
    }

    #[test]
    fn resume_needs_a_pending_player_turn() {
        let (mut store, mut turns) = primed(ScenarioType::Fantasy);
        assert_eq!(turns.resume(&mut store), Err(TurnError::InvalidHistory));
    }

    #[test]
    fn reply_for_a_closed_slot_is_dropped() {
        let mut store = store_with(ScenarioType::Fantasy);
        let mut turns = TurnOrchestrator::new();
        turns.resume(&mut store).unwrap();
        let id = store.active().unwrap().id;
        store.delete_slot(id);

        let outcome = turns.complete_turn(&mut store, Ok("Too late".into()));
        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        assert!(!turns.is_in_flight());
    }
}
