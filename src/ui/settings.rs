use egui::Color32;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::message::Message;

pub const MIN_SCALE: f32 = 0.75;
pub const MAX_SCALE: f32 = 2.0;

/// Who a log bubble belongs to. Each speaker has its own colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Narrator,
    System,
}

impl Speaker {
    pub const ALL: [Speaker; 3] = [Speaker::User, Speaker::Narrator, Speaker::System];

    pub fn of(msg: &Message) -> Self {
        match msg {
            Message::User(_) => Speaker::User,
            Message::Narration(_) => Speaker::Narrator,
            Message::System(_) => Speaker::System,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Narrator => "Narrator",
            Speaker::System => "System",
        }
    }

    fn default_color(self) -> [u8; 4] {
        match self {
            Speaker::User => [40, 70, 120, 255],
            Speaker::Narrator => [40, 90, 60, 255],
            Speaker::System => [80, 80, 80, 255],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UiSettings {
    pub ui_scale: f32,
    pub log_text_size: f32,
    pub speaker_colors: BTreeMap<Speaker, [u8; 4]>,

    /// Show the modifier next to stats that have never changed.
    pub show_all_modifiers: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            ui_scale: 1.0,
            log_text_size: 15.0,
            speaker_colors: Speaker::ALL.iter().map(|s| (*s, s.default_color())).collect(),
            show_all_modifiers: false,
        }
    }
}

impl UiSettings {
    /// Hand-edited files can carry any number here.
    pub fn effective_scale(&self) -> f32 {
        if self.ui_scale.is_finite() {
            self.ui_scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            1.0
        }
    }

    pub fn color(&self, speaker: Speaker) -> Color32 {
        let [r, g, b, a] = self
            .speaker_colors
            .get(&speaker)
            .copied()
            .unwrap_or_else(|| speaker.default_color());
        Color32::from_rgba_unmultiplied(r, g, b, a)
    }

    pub fn set_color(&mut self, speaker: Speaker, color: Color32) {
        self.speaker_colors.insert(speaker, color.to_srgba_unmultiplied());
    }

    pub fn reset_colors(&mut self) {
        self.speaker_colors = UiSettings::default().speaker_colors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_speaker_uses_its_default() {
        let mut settings = UiSettings::default();
        settings.speaker_colors.clear();
        assert_eq!(settings.color(Speaker::Narrator), Color32::from_rgb(40, 90, 60));
    }

    #[test]
    fn scale_is_clamped() {
        let mut settings = UiSettings { ui_scale: 9.0, ..UiSettings::default() };
        assert_eq!(settings.effective_scale(), MAX_SCALE);
        settings.ui_scale = f32::NAN;
        assert_eq!(settings.effective_scale(), 1.0);
    }

    #[test]
    fn reset_restores_every_speaker() {
        let mut settings = UiSettings::default();
        settings.set_color(Speaker::User, Color32::from_rgb(1, 2, 3));
        settings.speaker_colors.remove(&Speaker::System);
        settings.reset_colors();
        assert_eq!(settings, UiSettings::default());
    }

    #[test]
    fn colours_are_keyed_by_speaker_name() {
        let json = serde_json::to_value(UiSettings::default()).unwrap();
        assert_eq!(json["speaker_colors"]["Narrator"], serde_json::json!([40, 90, 60, 255]));
    }
}
