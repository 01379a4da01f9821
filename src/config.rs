use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::action_budget::BudgetPolicy;
use crate::engine::game_store::MAX_SAVE_SLOTS;

pub const APP_DIR: &str = "kotodama_protocol";
pub const PROXY_URL_ENV: &str = "KOTODAMA_PROXY_URL";
pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Serverless proxy that forwards `{history}` to the model.
    pub proxy_url: Option<String>,
    /// Used for direct `generateContent` calls when no proxy is configured.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            api_key: None,
            model: "gemini-1.5-flash-latest".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub narration: NarrationConfig,
    pub budget: BudgetPolicy,
    pub max_slots: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            narration: NarrationConfig::default(),
            budget: BudgetPolicy::default(),
            max_slots: MAX_SAVE_SLOTS,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push("config.json");
        path
    }

    /// Missing file means defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&text)?;
        if config.max_slots == 0 {
            config.max_slots = MAX_SAVE_SLOTS;
        }
        Ok(config)
    }

    /// File, then `.env`/process environment on top.
    pub fn load() -> Self {
        let path = Self::default_path();
        let mut config = match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(PROXY_URL_ENV) {
            self.narration.proxy_url = Some(url);
        }
        if let Some(key) = non_empty(GEMINI_KEY_ENV) {
            self.narration.api_key = Some(key);
        }
    }
}
