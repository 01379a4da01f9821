use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::directive::Directive;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectiveOutcome {
    Applied,
    /// Recognised but dropped (unknown stat, full bag, missing item...).
    Ignored { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveApplication {
    pub directive: Directive,
    pub outcome: DirectiveOutcome,
}

/// Everything one narration reply produced, after its directives were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub narrative_text: String,
    pub actions: Vec<String>,
    /// Signed display deltas ("+3", "-1") for stats changed by this reply.
    pub stat_changes: BTreeMap<String, String>,
    pub scene_complete: bool,
    /// Set when a `[NAME]` tag renamed the player.
    pub name: Option<String>,
    pub effects: Vec<DirectiveApplication>,
}
