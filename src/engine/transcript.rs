//! Rebuild a save slot from a plain-text adventure log.
//!
//! Lines starting with `"> "` are the player's commands, every other
//! non-blank line is narration.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;

use crate::engine::action_budget::BudgetLedger;
use crate::engine::game_store::roll_stats;
use crate::model::game_save::{SaveSlot, SlotId};
use crate::model::game_state::CharacterSheet;
use crate::model::message::Turn;
use crate::model::scenario::{ScenarioType, SCI_FI_KEYWORDS};

const PLAYER_PREFIX: &str = "> ";

/// Narrator lines that confirm the player's chosen name.
const REGISTRATION_MARKERS: [&str; 3] = ["a fine name", "registration complete", "callsign accepted"];

static QUOTED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[「"“]([^」"”]+)[」"”]"#).expect("valid regex"));

pub fn detect_scenario(text: &str) -> ScenarioType {
    if SCI_FI_KEYWORDS.iter().any(|k| text.contains(k)) {
        ScenarioType::SciFi
    } else {
        ScenarioType::Fantasy
    }
}

fn extract_name(text: &str) -> Option<String> {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            REGISTRATION_MARKERS.iter().any(|m| lower.contains(m))
        })
        .find_map(|line| QUOTED_NAME.captures(line))
        .map(|c| c[1].trim().to_string())
        .filter(|name| !name.is_empty())
}

/// The slot id is provisional; the store assigns a fresh one on import.
pub fn slot_from_transcript(
    text: &str,
    ledger: &BudgetLedger,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> SaveSlot {
    let scenario = detect_scenario(text);

    let mut history = vec![Turn::user(scenario.rulebook())];
    history.extend(text.lines().filter_map(|line| {
        let line = line.trim_end_matches('\r');
        if let Some(command) = line.strip_prefix(PLAYER_PREFIX) {
            Some(Turn::user(command))
        } else if !line.trim().is_empty() {
            Some(Turn::model(line))
        } else {
            None
        }
    }));

    let name = extract_name(text)
        .unwrap_or_else(|| format!("(from transcript) {}", now.format("%Y-%m-%d %H:%M")));

    SaveSlot {
        id: SlotId(u64::try_from(now.timestamp_millis()).unwrap_or(0)),
        sheet: CharacterSheet {
            name,
            stats: roll_stats(rng),
            ..CharacterSheet::default()
        },
        history,
        action_budget: ledger.new_budget(now),
        scenario_type: scenario,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action_budget::BudgetPolicy;
    use crate::model::message::Role;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn build(text: &str) -> SaveSlot {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap();
        slot_from_transcript(
            text,
            &BudgetLedger::new(BudgetPolicy::default()),
            now,
            &mut StdRng::seed_from_u64(3),
        )
    }

    #[test]
    fn splits_player_and_narrator_lines() {
        let slot = build("The gate creaks open.\n\n> walk in\nA goblin waits.\r\n> greet it\n");
        let roles: Vec<Role> = slot.history.iter().map(|t| t.role).collect();
        assert_eq!(roles, [Role::User, Role::Model, Role::User, Role::Model, Role::User]);
        assert_eq!(slot.history[0].text(), ScenarioType::Fantasy.rulebook());
        assert_eq!(slot.history[2].text(), "walk in");
        assert_eq!(slot.history[3].text(), "A goblin waits.");
        assert!(slot.awaiting_narration());
    }

    #[test]
    fn sci_fi_keywords_pick_the_sci_fi_rulebook() {
        let slot = build("Rain over NEO-TOKYO.\n> check messages");
        assert_eq!(slot.scenario_type, ScenarioType::SciFi);
        assert_eq!(slot.history[0].text(), ScenarioType::SciFi.rulebook());
    }

    #[test]
    fn name_comes_from_registration_line() {
        let slot = build("Tell me your name.\n> Aria\n\"Aria\"... a fine name, traveller.");
        assert_eq!(slot.sheet.name, "Aria");

        let slot = build("Registration complete: 「ZERO」.");
        assert_eq!(slot.sheet.name, "ZERO");
    }

    #[test]
    fn unnamed_transcripts_are_labelled() {
        let slot = build("Nothing but fog.");
        assert_eq!(slot.sheet.name, "(from transcript) 2024-05-10 03:00");
        assert_eq!(slot.action_budget.current, 50);
        assert_eq!(slot.sheet.stats.scores.len(), 6);
    }
}
