use serde::{Deserialize, Serialize};

const FANTASY_RULEBOOK: &str = include_str!("../../assets/rulebooks/fantasy.txt");
const SCI_FI_RULEBOOK: &str = include_str!("../../assets/rulebooks/sci_fi.txt");
const GUILD_RULEBOOK: &str = include_str!("../../assets/rulebooks/guild.txt");
const TRIAL_RULEBOOK: &str = include_str!("../../assets/rulebooks/trial.txt");

/// Words that only show up in sci-fi transcripts.
pub const SCI_FI_KEYWORDS: [&str; 4] = ["NEO-TOKYO", "callsign", "the Matrix", "data medium"];

/// Which rulebook primed a slot. The serialized names match existing saves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioType {
    #[default]
    #[serde(rename = "fantasy")]
    Fantasy,
    #[serde(rename = "sf")]
    SciFi,
    #[serde(rename = "guildKURAGE")]
    Guild,
    #[serde(rename = "testS")]
    Trial,
}

impl ScenarioType {
    /// Order in which scenarios are offered on the new-game screen.
    pub const ALL: [ScenarioType; 4] = [
        ScenarioType::Trial,
        ScenarioType::Guild,
        ScenarioType::Fantasy,
        ScenarioType::SciFi,
    ];

    pub fn rulebook(self) -> &'static str {
        match self {
            ScenarioType::Fantasy => FANTASY_RULEBOOK,
            ScenarioType::SciFi => SCI_FI_RULEBOOK,
            ScenarioType::Guild => GUILD_RULEBOOK,
            ScenarioType::Trial => TRIAL_RULEBOOK,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ScenarioType::Fantasy => "A World of Sword and Sorcery",
            ScenarioType::SciFi => "A Future Run by Machines",
            ScenarioType::Guild => "Take a Job at the Guild",
            ScenarioType::Trial => "Quick Trial",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ScenarioType::Fantasy => {
                "Search a cursed forest for the Core that holds your lost memories."
            }
            ScenarioType::SciFi => {
                "Hunt through a vast cyber city for the data medium that holds your past."
            }
            ScenarioType::Guild => "Something new has been pinned to the guild's job board today.",
            ScenarioType::Trial => {
                "A wolf is caught in a trap in the woods. What will you do? A short taste of the narrator."
            }
        }
    }

    /// Shown when the player runs out of daily actions.
    pub fn exhausted_notice(self) -> &'static str {
        match self {
            ScenarioType::SciFi => {
                "Your neural link needs to cool down. Actions recharge every morning at 04:00 (JST)."
            }
            ScenarioType::Guild => {
                "The guild hall has closed its doors for the night. Come back after 04:00 (JST)."
            }
            _ => "Your strength is spent for today. Actions recover every morning at 04:00 (JST).",
        }
    }

    /// Trial runs are free: their turns do not draw on the action budget.
    pub fn consumes_actions(self) -> bool {
        !matches!(self, ScenarioType::Trial)
    }
}
