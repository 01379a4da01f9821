mod config;
mod engine;
mod model;
mod ui;

use std::path::Path;
use std::sync::Arc;

use config::AppConfig;
use engine::action_budget::BudgetLedger;
use engine::engine::Engine;
use engine::game_store::GameStateStore;
use engine::llm_client::{HttpNarrationClient, NarrationClient};
use engine::slot_repository::{FileStore, KeyValueStore, MemoryStore, SlotRepository};

/// Saves on disk when possible; otherwise the session still runs, unsaved.
fn open_store(dir: &Path) -> Box<dyn KeyValueStore> {
    match FileStore::new(dir) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "save directory unusable, progress will not be kept");
            Box::new(MemoryStore::default())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::load();
    let data_dir = FileStore::default_dir();
    tracing::info!(data_dir = %data_dir.display(), "starting");

    let store = GameStateStore::open(
        SlotRepository::new(open_store(&data_dir), config.budget),
        BudgetLedger::new(config.budget),
        config.max_slots,
    );
    let client: Arc<dyn NarrationClient> = Arc::new(HttpNarrationClient::new(&config.narration)?);
    let (cmd_tx, resp_rx) = Engine::spawn(store, client);
    let prefs = open_store(&data_dir);

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 780.0])
            .with_min_inner_size([760.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Kotodama Protocol",
        options,
        Box::new(move |_cc| Ok(Box::new(ui::app::KotodamaApp::new(cmd_tx, resp_rx, prefs)))),
    )
    .map_err(|e| anyhow::anyhow!("window closed with an error: {e}"))
}
