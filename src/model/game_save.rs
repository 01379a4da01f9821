use serde::{Deserialize, Serialize};

use crate::model::action_budget::ActionBudget;
use crate::model::game_state::CharacterSheet;
use crate::model::message::{Role, Turn};
use crate::model::scenario::ScenarioType;

/// Creation-ordered slot identifier (epoch milliseconds at creation).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct SlotId(pub u64);

/// One saved adventure, exactly as it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSlot {
    pub id: SlotId,

    #[serde(flatten)]
    pub sheet: CharacterSheet,

    #[serde(default)]
    pub history: Vec<Turn>,

    pub action_budget: ActionBudget,

    #[serde(default)]
    pub scenario_type: ScenarioType,
}

impl SaveSlot {
    pub fn last_turn_role(&self) -> Option<Role> {
        self.history.last().map(|t| t.role)
    }

    /// The narrator has not answered the latest user turn yet.
    pub fn awaiting_narration(&self) -> bool {
        self.last_turn_role() == Some(Role::User)
    }
}
