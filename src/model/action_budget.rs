use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-slot daily action allowance.
///
/// `current` never exceeds `limit`. `last_recovery` is the last time recovery
/// was evaluated, not the last time it granted anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBudget {
    pub current: u32,
    pub limit: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_recovery: DateTime<Utc>,
}

impl ActionBudget {
    pub fn new(current: u32, limit: u32, last_recovery: DateTime<Utc>) -> Self {
        Self {
            current: current.min(limit),
            limit,
            last_recovery,
        }
    }
}
