use std::fs;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

use crate::engine::directive_parser::preview_response;
use crate::engine::game_store::{GameStateStore, ImportOutcome};
use crate::engine::llm_client::{NarrationClient, NarrationError};
use crate::engine::protocol::{ActiveView, EngineCommand, EngineResponse, GameView, SlotSummary};
use crate::engine::slot_repository::KeyValueStore;
use crate::engine::turn::{TurnOrchestrator, TurnOutcome};
use crate::model::event_result::ParsedResponse;
use crate::model::game_save::SlotId;
use crate::model::message::{Message, Role, Turn};
use crate::model::scenario::ScenarioType;

pub struct Engine<S> {
    rx: Receiver<EngineCommand>,
    /// Handed to narration workers so their results come back through `rx`.
    loopback: Sender<EngineCommand>,
    tx: Sender<EngineResponse>,
    store: GameStateStore<S>,
    turns: TurnOrchestrator,
    client: Arc<dyn NarrationClient>,
    rng: StdRng,
    log: Vec<Message>,
    latest: ParsedResponse,
}

impl<S: KeyValueStore + 'static> Engine<S> {
    /// Start the engine on its own thread and return the UI's ends of the channels.
    pub fn spawn(
        store: GameStateStore<S>,
        client: Arc<dyn NarrationClient>,
    ) -> (Sender<EngineCommand>, Receiver<EngineResponse>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let loopback = cmd_tx.clone();

        thread::spawn(move || {
            let mut engine = Engine::new(cmd_rx, loopback, resp_tx, store, client);
            engine.run();
        });

        (cmd_tx, resp_rx)
    }
}

impl<S: KeyValueStore> Engine<S> {
    pub fn new(
        rx: Receiver<EngineCommand>,
        loopback: Sender<EngineCommand>,
        tx: Sender<EngineResponse>,
        store: GameStateStore<S>,
        client: Arc<dyn NarrationClient>,
    ) -> Self {
        Self {
            rx,
            loopback,
            tx,
            store,
            turns: TurnOrchestrator::new(),
            client,
            rng: StdRng::from_entropy(),
            log: Vec::new(),
            latest: ParsedResponse::default(),
        }
    }

    pub fn run(&mut self) {
        if let Some(id) = self.store.remembered_active_id() {
            self.enter_slot(id, Utc::now());
        }
        self.publish();

        while self.process_next() {}
        tracing::info!("engine stopped");
    }

    /// Block for one command and handle it. False once every sender is gone.
    pub fn process_next(&mut self) -> bool {
        match self.rx.recv() {
            Ok(cmd) => {
                self.handle(cmd);
                true
            }
            Err(_) => false,
        }
    }

    pub fn handle(&mut self, cmd: EngineCommand) {
        let now = Utc::now();
        match cmd {
            EngineCommand::NewGame(scenario) => {
                if self.ensure_idle() {
                    self.new_game(scenario, now);
                }
            }
            EngineCommand::LoadSlot(id) => {
                if self.ensure_idle() {
                    self.enter_slot(id, now);
                }
            }
            EngineCommand::DeleteSlot(id) => {
                if self.ensure_idle() && self.store.delete_slot(id) {
                    if self.store.active().is_none() {
                        self.log.clear();
                        self.latest = ParsedResponse::default();
                    }
                    self.notice("Save deleted.");
                }
            }
            EngineCommand::SubmitCommand(text) => self.submit(&text, now),
            EngineCommand::ImportFile(path) => {
                if self.ensure_idle() {
                    if let Err(e) = self.import_file(&path, now) {
                        tracing::warn!(path = %path.display(), error = %e, "import failed");
                        self.notice(format!("Import failed: {e:#}"));
                    }
                }
            }
            EngineCommand::ExportActive(path) => {
                if let Err(e) = self.export_active(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "export failed");
                    self.notice(format!("Export failed: {e:#}"));
                }
            }
            EngineCommand::ClaimActionReward => self.claim_reward(now),
            EngineCommand::Refresh => {
                if let Some((slot, ledger)) = self.store.active_with_ledger() {
                    ledger.reconcile(&mut slot.action_budget, now);
                }
            }
            EngineCommand::NarrationFinished(result) => self.finish_narration(result),
        }
        self.publish();
    }

    fn ensure_idle(&mut self) -> bool {
        if self.turns.is_in_flight() {
            self.notice("Wait for the narrator to finish first.");
            return false;
        }
        true
    }

    fn new_game(&mut self, scenario: ScenarioType, now: DateTime<Utc>) {
        match self.store.create_new_game(scenario, now, &mut self.rng).map(|slot| slot.id) {
            Ok(id) => self.enter_slot(id, now),
            Err(e) => self.notice(e.to_string()),
        }
    }

    /// Make a slot live and pick the story up where it stopped: re-show the
    /// last suggestions, or ask for the narration that never arrived.
    fn enter_slot(&mut self, id: SlotId, now: DateTime<Utc>) {
        let Some(slot) = self.store.load_game(id, now) else {
            self.notice("That save no longer exists.");
            return;
        };

        self.log = session_log(&slot.history);
        self.latest = match slot.history.last() {
            Some(turn) if turn.role == Role::Model => preview_response(turn.text()),
            _ => ParsedResponse::default(),
        };
        // The rest offer belongs to the reply that completed the scene, not to a reload.
        self.latest.scene_complete = false;

        if slot.awaiting_narration() {
            match self.turns.resume(&mut self.store) {
                Ok(history) => self.request_narration(history),
                Err(e) => self.log.push(Message::System(e.to_string())),
            }
        }
    }

    fn submit(&mut self, text: &str, now: DateTime<Utc>) {
        match self.turns.begin_turn(&mut self.store, text, now) {
            Ok(history) => {
                self.log.push(Message::User(text.trim().to_string()));
                self.latest = ParsedResponse::default();
                self.request_narration(history);
            }
            Err(e) => {
                tracing::debug!(error = %e, "turn rejected");
                self.log.push(Message::System(e.to_string()));
            }
        }
    }

    fn request_narration(&self, history: Vec<Turn>) {
        let client = Arc::clone(&self.client);
        let loopback = self.loopback.clone();
        thread::spawn(move || {
            let result = client.generate_narration(&history);
            let _ = loopback.send(EngineCommand::NarrationFinished(result));
        });
    }

    fn finish_narration(&mut self, result: Result<String, NarrationError>) {
        match self.turns.complete_turn(&mut self.store, result) {
            TurnOutcome::Narrated(parsed) => {
                if !parsed.narrative_text.is_empty() {
                    self.log.push(Message::Narration(parsed.narrative_text.clone()));
                }
                if let Some(name) = &parsed.name {
                    self.log.push(Message::System(format!("Registered as {name}.")));
                }
                if parsed.scene_complete {
                    self.log.push(Message::System(
                        "Scene complete. You may take a rest to recover actions.".to_string(),
                    ));
                }
                self.latest = parsed;
            }
            TurnOutcome::Failed(message) => self.log.push(Message::System(message)),
        }
    }

    fn claim_reward(&mut self, now: DateTime<Utc>) {
        if !self.latest.scene_complete {
            self.notice("A rest can only be taken once a scene is complete.");
            return;
        }
        match self.store.grant_reward(now) {
            Some(granted) => {
                self.latest.scene_complete = false;
                self.log.push(Message::System(format!("You rest and recover {granted} actions.")));
            }
            None => self.notice("No adventure is loaded."),
        }
    }

    fn import_file(&mut self, path: &Path, now: DateTime<Utc>) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !matches!(extension.as_deref(), Some("json" | "txt")) {
            bail!("only .json saves and .txt transcripts can be imported");
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;

        let outcome = if extension.as_deref() == Some("json") {
            let record: Value = serde_json::from_str(&contents).context("not a valid save file")?;
            self.store.import_record(record)?
        } else {
            self.store.import_transcript(&contents, now, &mut self.rng)
        };

        match outcome {
            ImportOutcome::Accepted { id, replaced } => {
                self.enter_slot(id, now);
                self.notice(if replaced { "Save restored." } else { "Save imported." });
            }
            ImportOutcome::Rejected { reason } => self.notice(reason.to_string()),
        }
        Ok(())
    }

    fn export_active(&mut self, path: &Path) -> Result<()> {
        let Some((_, json)) = self.store.export_active(Local::now().date_naive()) else {
            bail!("no adventure is loaded");
        };
        fs::write(path, json).with_context(|| format!("could not write {}", path.display()))?;
        tracing::info!(path = %path.display(), "save exported");
        self.notice(format!("Exported to {}", path.display()));
        Ok(())
    }

    fn notice(&self, text: impl Into<String>) {
        let _ = self.tx.send(EngineResponse::Notice(text.into()));
    }

    fn publish(&self) {
        let _ = self.tx.send(EngineResponse::State(Box::new(self.view())));
    }

    fn view(&self) -> GameView {
        let today = Local::now().date_naive();
        GameView {
            slots: self
                .store
                .slots()
                .iter()
                .map(|s| SlotSummary {
                    id: s.id,
                    name: s.sheet.name.clone(),
                    scenario: s.scenario_type,
                    actions: s.action_budget.current,
                    turns: s.history.len(),
                })
                .collect(),
            max_slots: self.store.max_slots(),
            active: self.store.active().map(|slot| ActiveView {
                id: slot.id,
                scenario: slot.scenario_type,
                sheet: slot.sheet.clone(),
                budget: slot.action_budget,
                log: self.log.clone(),
                actions: self.latest.actions.clone(),
                stat_changes: self.latest.stat_changes.clone(),
                reward_available: self.latest.scene_complete,
                export_file_name: self.store.export_file_name(today).unwrap_or_default(),
            }),
            busy: self.turns.is_in_flight(),
        }
    }
}

/// Rebuild the visible log from stored history. The priming turn is hidden
/// and narration is shown without its directive tags.
fn session_log(history: &[Turn]) -> Vec<Message> {
    history
        .iter()
        .skip(1)
        .filter_map(|turn| match turn.role {
            Role::User => Some(Message::User(turn.text().to_string())),
            Role::Model => {
                let text = preview_response(turn.text()).narrative_text;
                (!text.is_empty()).then_some(Message::Narration(text))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action_budget::{BudgetLedger, BudgetPolicy};
    use crate::engine::game_store::MAX_SAVE_SLOTS;
    use crate::engine::slot_repository::{MemoryStore, SlotRepository};
    use crate::engine::turn::TurnError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, NarrationError>>>,
    }

    impl NarrationClient for ScriptedClient {
        fn generate_narration(&self, _history: &[Turn]) -> Result<String, NarrationError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(NarrationError::EmptyResponse))
        }
    }

    fn engine(replies: &[&str]) -> (Engine<MemoryStore>, Receiver<EngineResponse>) {
        let policy = BudgetPolicy::default();
        let store = GameStateStore::open(
            SlotRepository::new(MemoryStore::default(), policy),
            BudgetLedger::new(policy),
            MAX_SAVE_SLOTS,
        );
        let client = ScriptedClient {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
        };
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let engine = Engine::new(cmd_rx, cmd_tx, resp_tx, store, Arc::new(client));
        (engine, resp_rx)
    }

    fn latest_view(rx: &Receiver<EngineResponse>) -> GameView {
        let mut view = None;
        while let Ok(resp) = rx.try_recv() {
            if let EngineResponse::State(v) = resp {
                view = Some(*v);
            }
        }
        view.expect("engine published a view")
    }

    fn notices(rx: &Receiver<EngineResponse>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|r| match r {
                EngineResponse::Notice(n) => Some(n),
                EngineResponse::State(_) => None,
            })
            .collect()
    }

    #[test]
    fn new_game_narrates_opening() {
        let (mut engine, rx) = engine(&["The road is quiet.\n[ACTION] Walk on\n[ACTION] Camp"]);
        engine.handle(EngineCommand::NewGame(ScenarioType::Fantasy));
        assert!(latest_view(&rx).busy);

        assert!(engine.process_next());
        let view = latest_view(&rx);
        assert!(!view.busy);
        let active = view.active.unwrap();
        assert_eq!(active.log, vec![Message::Narration("The road is quiet.".into())]);
        assert_eq!(active.actions, vec!["Walk on".to_string(), "Camp".to_string()]);
        assert_eq!(active.budget.current, 50);
        assert_eq!(view.slots.len(), 1);
    }

    #[test]
    fn submit_while_busy_is_reported_inline() {
        let (mut engine, rx) = engine(&["Hello.", "You walk."]);
        engine.handle(EngineCommand::NewGame(ScenarioType::Fantasy));
        engine.process_next();

        engine.handle(EngineCommand::SubmitCommand("walk".into()));
        engine.handle(EngineCommand::SubmitCommand("run".into()));
        let view = latest_view(&rx);
        assert!(view.busy);
        let log = view.active.unwrap().log;
        assert_eq!(log[log.len() - 2], Message::User("walk".into()));
        assert_eq!(log[log.len() - 1], Message::System(TurnError::TurnInFlight.to_string()));

        engine.process_next();
        let view = latest_view(&rx);
        assert_eq!(view.active.unwrap().budget.current, 49);
    }

    #[test]
    fn reload_shows_last_actions_without_reapplying() {
        let (mut engine, rx) = engine(&["Gate.\n[STAT] STR +2\n[ACTION] Knock"]);
        engine.handle(EngineCommand::NewGame(ScenarioType::Fantasy));
        engine.process_next();
        let first = latest_view(&rx).active.unwrap();
        let str_after = first.sheet.stats.score("STR");

        engine.handle(EngineCommand::LoadSlot(first.id));
        let reloaded = latest_view(&rx).active.unwrap();
        assert_eq!(reloaded.sheet.stats.score("STR"), str_after);
        assert_eq!(reloaded.actions, vec!["Knock".to_string()]);
        assert_eq!(reloaded.log, vec![Message::Narration("Gate.".into())]);
    }

    #[test]
    fn reward_needs_a_completed_scene() {
        let (mut engine, rx) = engine(&["The end.\n[SHOW_AD_BUTTON]"]);
        engine.handle(EngineCommand::ClaimActionReward);
        assert_eq!(notices(&rx).len(), 1);

        engine.handle(EngineCommand::NewGame(ScenarioType::Trial));
        engine.process_next();
        assert!(latest_view(&rx).active.unwrap().reward_available);

        engine.handle(EngineCommand::ClaimActionReward);
        let active = latest_view(&rx).active.unwrap();
        assert!(!active.reward_available);
        assert_eq!(
            active.log.last(),
            Some(&Message::System("You rest and recover 0 actions.".into()))
        );
    }

    #[test]
    fn reloading_does_not_offer_the_rest_again() {
        let (mut engine, rx) = engine(&["The end.\n[SHOW_AD_BUTTON]"]);
        engine.handle(EngineCommand::NewGame(ScenarioType::Fantasy));
        engine.process_next();
        engine.store.active_mut().unwrap().action_budget.current = 0;
        engine.store.save_active_slot();
        let id = engine.store.active().unwrap().id;

        for _ in 0..5 {
            engine.handle(EngineCommand::ClaimActionReward);
            engine.handle(EngineCommand::LoadSlot(id));
        }

        let active = latest_view(&rx).active.unwrap();
        assert!(!active.reward_available);
        assert_eq!(active.budget.current, BudgetPolicy::default().reward_amount);
        assert_eq!(engine.store.slots()[0].action_budget.current, active.budget.current);
    }

    #[test]
    fn dropped_directives_stay_out_of_the_log() {
        let reply = "Loot everywhere.\n[ITEM_ADD] rope\n[ITEM_ADD] lamp\n[ITEM_ADD] map\n\
                     [ITEM_ADD] coin\n[ITEM_ADD] dagger\n[ITEM_ADD] shield\n[STAT] LUCK +3";
        let (mut engine, rx) = engine(&[reply]);
        engine.handle(EngineCommand::NewGame(ScenarioType::Fantasy));
        engine.process_next();

        let active = latest_view(&rx).active.unwrap();
        assert_eq!(active.log, vec![Message::Narration("Loot everywhere.".into())]);
        assert_eq!(active.sheet.inventory.len(), 5);
        assert!(active.sheet.stats.score("LUCK").is_none());
    }

    #[test]
    fn slot_changes_wait_for_narration() {
        let (mut engine, rx) = engine(&["Hi."]);
        engine.handle(EngineCommand::NewGame(ScenarioType::Fantasy));
        engine.handle(EngineCommand::NewGame(ScenarioType::SciFi));
        assert_eq!(notices(&rx), vec!["Wait for the narrator to finish first.".to_string()]);
        engine.process_next();
        assert_eq!(latest_view(&rx).slots.len(), 1);
    }

    #[test]
    fn imports_transcripts_and_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("log.txt");
        fs::write(&txt, "Dawn.\n> stretch\nYou feel fine.").unwrap();
        let csv = dir.path().join("log.csv");
        fs::write(&csv, "a,b").unwrap();

        let (mut engine, rx) = engine(&[]);
        engine.handle(EngineCommand::ImportFile(txt));
        assert_eq!(notices(&rx), vec!["Save imported.".to_string()]);
        let imported = engine.store.active().expect("imported slot is live");
        assert_eq!(imported.history.len(), 4);
        assert!(!engine.turns.is_in_flight());

        engine.handle(EngineCommand::ImportFile(csv));
        let rejected = notices(&rx);
        assert!(rejected[0].starts_with("Import failed"));
        assert_eq!(engine.store.slots().len(), 1);
    }

    #[test]
    fn export_writes_the_live_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");

        let (mut engine, _rx) = engine(&["Hi."]);
        engine.handle(EngineCommand::NewGame(ScenarioType::Guild));
        engine.process_next();
        engine.handle(EngineCommand::ExportActive(path.clone()));

        let written: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["scenarioType"], "guildKURAGE");
        assert_eq!(written["history"].as_array().unwrap().len(), 2);
    }
}
