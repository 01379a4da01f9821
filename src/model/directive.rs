use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatOp {
    Add,
    Subtract,
    Set,
}

impl StatOp {
    /// `+`, `-`, `=` or nothing (absolute set).
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "+" => StatOp::Add,
            "-" => StatOp::Subtract,
            _ => StatOp::Set,
        }
    }
}

/// A state change requested by the narrator through a bracket tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    SetName { name: String },
    ModifyStat { key: String, op: StatOp, amount: i32 },
    Damage { amount: i32 },
    Heal { amount: i32 },
    AddItem { label: String },
    RemoveItem { label: String },
}

impl Directive {
    pub fn short_name(&self) -> &'static str {
        match self {
            Directive::SetName { .. } => "SetName",
            Directive::ModifyStat { .. } => "ModifyStat",
            Directive::Damage { .. } => "Damage",
            Directive::Heal { .. } => "Heal",
            Directive::AddItem { .. } => "AddItem",
            Directive::RemoveItem { .. } => "RemoveItem",
        }
    }
}
