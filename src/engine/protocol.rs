use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::engine::llm_client::NarrationError;
use crate::model::action_budget::ActionBudget;
use crate::model::game_save::SlotId;
use crate::model::game_state::CharacterSheet;
use crate::model::message::Message;
use crate::model::scenario::ScenarioType;

pub enum EngineCommand {
    NewGame(ScenarioType),
    LoadSlot(SlotId),
    DeleteSlot(SlotId),
    SubmitCommand(String),
    /// `.json` save record or `.txt` transcript.
    ImportFile(PathBuf),
    ExportActive(PathBuf),
    ClaimActionReward,
    Refresh,
    /// Posted by the narration worker, never by the UI.
    NarrationFinished(Result<String, NarrationError>),
}

pub enum EngineResponse {
    State(Box<GameView>),
    /// Transient message for a toast or status line.
    Notice(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotSummary {
    pub id: SlotId,
    pub name: String,
    pub scenario: ScenarioType,
    pub actions: u32,
    pub turns: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveView {
    pub id: SlotId,
    pub scenario: ScenarioType,
    pub sheet: CharacterSheet,
    pub budget: ActionBudget,
    pub log: Vec<Message>,
    /// Suggested commands from the latest narration.
    pub actions: Vec<String>,
    /// Stat deltas from the latest narration, for highlighting.
    pub stat_changes: BTreeMap<String, String>,
    /// The latest narration closed a scene; a rest reward can be claimed.
    pub reward_available: bool,
    pub export_file_name: String,
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameView {
    pub slots: Vec<SlotSummary>,
    pub max_slots: usize,
    pub active: Option<ActiveView>,
    /// A narration call is outstanding; input should be disabled.
    pub busy: bool,
}
