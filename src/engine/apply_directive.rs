use crate::model::directive::{Directive, StatOp};
use crate::model::event_result::DirectiveOutcome;
use crate::model::game_state::{CharacterSheet, HP_KEY};

/// Apply one directive to the character sheet, returning the outcome.
///
/// Nothing here fails loudly: a directive that cannot apply is reported as
/// `Ignored` and the sheet is left untouched.
pub fn apply_directive(sheet: &mut CharacterSheet, directive: &Directive) -> DirectiveOutcome {
    match directive {
        Directive::SetName { name } => {
            sheet.name = name.clone();
            DirectiveOutcome::Applied
        }

        Directive::ModifyStat { key, op, amount } => {
            // HP is structured and only moves through DAMAGE / HEAL.
            let Some(value) = sheet.stats.scores.get_mut(key) else {
                let reason = if key == HP_KEY {
                    "HP changes through DAMAGE and HEAL".to_string()
                } else {
                    format!("Unknown stat '{}'", key)
                };
                return DirectiveOutcome::Ignored { reason };
            };

            let old = *value;
            *value = match op {
                StatOp::Add => old.saturating_add(*amount),
                StatOp::Subtract => old.saturating_sub(*amount),
                StatOp::Set => *amount,
            };

            if *value != old {
                sheet.modified.insert(key.clone());
            }
            DirectiveOutcome::Applied
        }

        Directive::Damage { amount } => match sheet.stats.hp.as_mut() {
            Some(hp) => {
                hp.damage(*amount);
                DirectiveOutcome::Applied
            }
            None => no_hit_points(),
        },

        Directive::Heal { amount } => match sheet.stats.hp.as_mut() {
            Some(hp) => {
                hp.heal(*amount);
                DirectiveOutcome::Applied
            }
            None => no_hit_points(),
        },

        Directive::AddItem { label } => {
            if sheet.inventory.add(label) {
                DirectiveOutcome::Applied
            } else {
                DirectiveOutcome::Ignored {
                    reason: format!("Inventory full, dropped '{}'", label),
                }
            }
        }

        Directive::RemoveItem { label } => {
            if sheet.inventory.remove(label) > 0 {
                DirectiveOutcome::Applied
            } else {
                DirectiveOutcome::Ignored {
                    reason: format!("'{}' is not in the inventory", label),
                }
            }
        }
    }
}

fn no_hit_points() -> DirectiveOutcome {
    DirectiveOutcome::Ignored {
        reason: "Character has no HP".to_string(),
    }
}
