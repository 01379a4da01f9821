use eframe::egui;
use egui::Layout;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::engine::protocol::{ActiveView, EngineCommand, EngineResponse, GameView};
use crate::engine::slot_repository::KeyValueStore;
use crate::model::game_save::SlotId;
use crate::model::message::Message;
use crate::ui::settings::{Speaker, UiSettings, MAX_SCALE, MIN_SCALE};
use crate::ui::settings_io::{load_settings, save_settings};
use crate::ui::{center_panel, left_panel, right_panel};

const NOTICE_SECONDS: f64 = 4.0;
/// How often the engine is asked to re-check the daily reset.
const REFRESH_EVERY: Duration = Duration::from_secs(60);

/* =========================
   UI State
   ========================= */

#[derive(Default)]
pub struct UiState {
    pub input_text: String,
    pub view: GameView,
    /// Transient notice and the frame time it appeared.
    pub notice: Option<(String, f64)>,
    pub should_auto_scroll: bool,
    pub show_settings: bool,
    pub pending_delete: Option<SlotId>,
}

impl UiState {
    pub fn active(&self) -> Option<&ActiveView> {
        self.view.active.as_ref()
    }
}

/* =========================
   App
   ========================= */

pub struct KotodamaApp {
    pub ui: UiState,
    pub settings: UiSettings,
    prefs: Box<dyn KeyValueStore>,
    last_refresh: Instant,

    cmd_tx: mpsc::Sender<EngineCommand>,
    resp_rx: mpsc::Receiver<EngineResponse>,
}

impl KotodamaApp {
    pub fn new(
        cmd_tx: mpsc::Sender<EngineCommand>,
        resp_rx: mpsc::Receiver<EngineResponse>,
        prefs: Box<dyn KeyValueStore>,
    ) -> Self {
        Self {
            ui: UiState::default(),
            settings: load_settings(&prefs),
            prefs,
            last_refresh: Instant::now(),
            cmd_tx,
            resp_rx,
        }
    }

    pub fn send_command(&self, cmd: EngineCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("engine thread is gone");
        }
    }

    fn drain_responses(&mut self, now: f64) {
        while let Ok(resp) = self.resp_rx.try_recv() {
            match resp {
                EngineResponse::State(view) => {
                    let old_len = self.ui.active().map_or(0, |a| a.log.len());
                    let new_len = view.active.as_ref().map_or(0, |a| a.log.len());
                    self.ui.should_auto_scroll |= new_len != old_len;
                    self.ui.view = *view;
                }
                EngineResponse::Notice(text) => self.ui.notice = Some((text, now)),
            }
        }
    }

    pub fn draw_message(&self, ui: &mut egui::Ui, msg: &Message) {
        let bg = self.settings.color(Speaker::of(msg));
        let size = self.settings.log_text_size;
        let (right, text) = match msg {
            Message::User(t) => (true, format!("> {t}")),
            Message::Narration(t) | Message::System(t) => (false, t.clone()),
        };

        ui.add_space(6.0);

        if right {
            ui.with_layout(Layout::right_to_left(egui::Align::TOP), |ui| {
                bubble(ui, bg, size, &text);
            });
        } else {
            bubble(ui, bg, size, &text);
        }
    }

    fn draw_notice(&mut self, ctx: &egui::Context, now: f64) {
        let Some((text, shown_at)) = &self.ui.notice else {
            return;
        };
        if now - shown_at > NOTICE_SECONDS {
            self.ui.notice = None;
            return;
        }
        egui::TopBottomPanel::top("notice").show(ctx, |ui| {
            ui.label(egui::RichText::new(text.as_str()).strong());
        });
    }

    fn draw_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.ui.show_settings;
        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("UI Scale");
                ui.add(egui::Slider::new(&mut self.settings.ui_scale, MIN_SCALE..=MAX_SCALE));
                ui.label("Log text size");
                ui.add(egui::Slider::new(&mut self.settings.log_text_size, 10.0..=28.0));

                ui.separator();
                for speaker in Speaker::ALL {
                    let mut color = self.settings.color(speaker);
                    ui.horizontal(|ui| {
                        ui.label(speaker.label());
                        if ui.color_edit_button_srgba(&mut color).changed() {
                            self.settings.set_color(speaker, color);
                        }
                    });
                }
                if ui.small_button("Reset colours").clicked() {
                    self.settings.reset_colors();
                }

                ui.separator();
                ui.checkbox(&mut self.settings.show_all_modifiers, "Show modifiers for every stat");
            });
        self.ui.show_settings = open;
    }
}

/* =========================
   egui App
   ========================= */

impl eframe::App for KotodamaApp {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        ctx.set_pixels_per_point(self.settings.effective_scale());
        let now = ctx.input(|i| i.time);
        let before = self.settings.clone();

        self.drain_responses(now);

        if self.last_refresh.elapsed() >= REFRESH_EVERY {
            self.last_refresh = Instant::now();
            self.send_command(EngineCommand::Refresh);
        }

        self.draw_notice(ctx, now);
        left_panel::draw_left_panel(ctx, self);
        right_panel::draw_right_panel(ctx, self);
        center_panel::draw_center_panel(ctx, self);
        if self.ui.show_settings {
            self.draw_settings_window(ctx);
        }

        if self.settings != before {
            save_settings(&mut self.prefs, &self.settings);
        }

        // Engine replies arrive on another thread; keep polling.
        let poll = if self.ui.view.busy || self.ui.notice.is_some() {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(500)
        };
        ctx.request_repaint_after(poll);
    }
}

/* =========================
   UI Helpers
   ========================= */

pub fn bubble(ui: &mut egui::Ui, color: egui::Color32, size: f32, text: &str) {
    egui::Frame::new()
        .fill(color)
        .corner_radius(egui::CornerRadius::same(8))
        .inner_margin(egui::Margin::symmetric(10, 6))
        .show(ui, |ui| {
            ui.label(egui::RichText::new(text).size(size).color(egui::Color32::WHITE));
        });
}
