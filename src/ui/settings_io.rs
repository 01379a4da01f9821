use crate::engine::slot_repository::{KeyValueStore, UI_SETTINGS_KEY};
use crate::ui::settings::UiSettings;

pub fn load_settings(store: &impl KeyValueStore) -> UiSettings {
    store
        .get(UI_SETTINGS_KEY)
        .and_then(|s| match serde_json::from_str(&s) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(error = %e, "ui settings unreadable, using defaults");
                None
            }
        })
        .unwrap_or_default()
}

pub fn save_settings(store: &mut impl KeyValueStore, settings: &UiSettings) {
    let json = match serde_json::to_string_pretty(settings) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "could not serialise ui settings");
            return;
        }
    };
    if let Err(e) = store.set(UI_SETTINGS_KEY, &json) {
        tracing::warn!(error = %e, "could not save ui settings");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::slot_repository::MemoryStore;
    use crate::ui::settings::Speaker;
    use egui::Color32;

    #[test]
    fn settings_survive_a_round_trip() {
        let mut store = MemoryStore::default();
        let mut settings = UiSettings { ui_scale: 1.5, ..UiSettings::default() };
        settings.set_color(Speaker::User, Color32::from_rgb(1, 2, 3));
        save_settings(&mut store, &settings);

        assert_eq!(load_settings(&store), settings);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let mut store = MemoryStore::default();
        store.set(UI_SETTINGS_KEY, "not json").unwrap();
        assert_eq!(load_settings(&store), UiSettings::default());

        store.set(UI_SETTINGS_KEY, r#"{"ui_scale": 1.25}"#).unwrap();
        let partial = load_settings(&store);
        assert_eq!(partial.ui_scale, 1.25);
        assert_eq!(partial.speaker_colors.len(), 3);
    }
}
