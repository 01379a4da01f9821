use eframe::egui;

use super::app::KotodamaApp;
use crate::engine::protocol::{ActiveView, EngineCommand};
use crate::model::game_state::{modifier_label, INVENTORY_CAPACITY};
use crate::ui::settings::UiSettings;

const CHANGED: egui::Color32 = egui::Color32::from_rgb(230, 180, 60);

pub fn draw_right_panel(ctx: &egui::Context, app: &mut KotodamaApp) {
    egui::SidePanel::right("right")
        .resizable(true)
        .default_width(280.0)
        .min_width(220.0)
        .show(ctx, |ui| {
            let Some(active) = app.ui.active() else {
                ui.label("No adventure loaded.");
                return;
            };

            let mut claim = false;
            egui::ScrollArea::vertical().show(ui, |ui| {
                draw_character(ui, active, &app.settings);
                ui.separator();
                claim = draw_budget(ui, active, app.ui.view.busy);
            });

            if claim {
                app.send_command(EngineCommand::ClaimActionReward);
            }
        });
}

/* =========================
   Character UI
   ========================= */

fn draw_character(ui: &mut egui::Ui, active: &ActiveView, settings: &UiSettings) {
    let sheet = &active.sheet;

    ui.heading(sheet.name.as_str());
    ui.label(egui::RichText::new(active.scenario.title()).small());

    if let Some(hp) = sheet.stats.hp {
        ui.add_space(4.0);
        let fraction = if hp.max > 0 { hp.current as f32 / hp.max as f32 } else { 0.0 };
        ui.add(egui::ProgressBar::new(fraction).text(format!("HP {}/{}", hp.current, hp.max)));
    }

    ui.collapsing("Stats", |ui| {
        egui::Grid::new("stats_grid").num_columns(3).striped(true).show(ui, |ui| {
            for (key, value) in sheet.stats.ordered_scores() {
                let delta = active.stat_changes.get(key);
                let mut name = egui::RichText::new(key);
                if delta.is_some() {
                    name = name.color(CHANGED).strong();
                }
                ui.label(name);
                ui.label(value.to_string());

                let show_modifier = settings.show_all_modifiers || sheet.modified.contains(key);
                let mut extra = if show_modifier { modifier_label(value) } else { String::new() };
                if let Some(delta) = delta {
                    extra = format!("{extra} ({delta})").trim().to_string();
                }
                ui.label(extra);
                ui.end_row();
            }
        });
    });

    ui.collapsing(
        format!("Inventory ({}/{})", sheet.inventory.len(), INVENTORY_CAPACITY),
        |ui| {
            if sheet.inventory.is_empty() {
                ui.label("Empty");
            } else {
                for item in sheet.inventory.items() {
                    ui.label(format!("• {item}"));
                }
            }
        },
    );
}

/* =========================
   Action budget UI
   ========================= */

/// Returns true when the rest reward was requested.
fn draw_budget(ui: &mut egui::Ui, active: &ActiveView, busy: bool) -> bool {
    let budget = &active.budget;

    ui.label(egui::RichText::new("Actions").strong());
    if !active.scenario.consumes_actions() {
        ui.label("This scenario does not use actions.");
        return false;
    }

    let fraction = if budget.limit > 0 { budget.current as f32 / budget.limit as f32 } else { 0.0 };
    ui.add(egui::ProgressBar::new(fraction).text(format!("{}/{}", budget.current, budget.limit)));
    if budget.current == 0 {
        ui.label(egui::RichText::new(active.scenario.exhausted_notice()).small());
    }

    if active.reward_available {
        ui.add_space(4.0);
        return ui
            .add_enabled(!busy, egui::Button::new("Take a rest"))
            .on_hover_text("Recover a few actions now that the scene is over.")
            .clicked();
    }
    false
}
