use eframe::egui;

use super::app::KotodamaApp;
use crate::engine::protocol::{EngineCommand, SlotSummary};
use crate::model::scenario::ScenarioType;

pub fn draw_left_panel(ctx: &egui::Context, app: &mut KotodamaApp) {
    egui::SidePanel::left("left")
        .resizable(false)
        .default_width(220.0)
        .show(ctx, |ui| {
            let busy = app.ui.view.busy;
            let full = app.ui.view.slots.len() >= app.ui.view.max_slots;

            ui.horizontal(|ui| {
                ui.heading("Adventures");
                ui.label(format!("{}/{}", app.ui.view.slots.len(), app.ui.view.max_slots));
            });
            ui.separator();

            egui::ScrollArea::vertical()
                .max_height(ui.available_height() * 0.45)
                .show(ui, |ui| {
                    if app.ui.view.slots.is_empty() {
                        ui.label("No saves yet.");
                    }
                    let slots = app.ui.view.slots.clone();
                    for slot in &slots {
                        draw_slot_row(ui, app, slot, busy);
                    }
                });

            ui.separator();
            ui.label(egui::RichText::new("New adventure").strong());
            ui.add_enabled_ui(!full && !busy, |ui| {
                for scenario in ScenarioType::ALL {
                    if ui
                        .button(scenario.title())
                        .on_hover_text(scenario.description())
                        .clicked()
                    {
                        app.send_command(EngineCommand::NewGame(scenario));
                    }
                }
            });
            if full {
                ui.label(egui::RichText::new("All slots are in use.").small());
            }

            ui.separator();
            ui.horizontal(|ui| {
                if ui.add_enabled(!busy, egui::Button::new("Import…")).clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Save or transcript", &["json", "txt"])
                        .pick_file()
                    {
                        app.send_command(EngineCommand::ImportFile(path));
                    }
                }

                let export_name = app.ui.active().map(|a| a.export_file_name.clone());
                if ui.add_enabled(export_name.is_some(), egui::Button::new("Export…")).clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .set_file_name(export_name.unwrap_or_default())
                        .add_filter("Save", &["json"])
                        .save_file()
                    {
                        app.send_command(EngineCommand::ExportActive(path));
                    }
                }
            });

            ui.separator();
            if ui.button("Settings").clicked() {
                app.ui.show_settings = !app.ui.show_settings;
            }
        });
}

fn draw_slot_row(ui: &mut egui::Ui, app: &mut KotodamaApp, slot: &SlotSummary, busy: bool) {
    let is_active = app.ui.active().is_some_and(|a| a.id == slot.id);

    ui.horizontal(|ui| {
        let label = format!(
            "{}\n{} · {} actions",
            slot.name,
            slot.scenario.title(),
            slot.actions
        );
        let row = ui.add_enabled(!busy, egui::Button::selectable(is_active, label));
        if row.clicked() && !is_active {
            app.send_command(EngineCommand::LoadSlot(slot.id));
        }

        if ui.add_enabled(!busy, egui::Button::new("🗑").small()).clicked() {
            app.ui.pending_delete = Some(slot.id);
        }
    });

    if app.ui.pending_delete == Some(slot.id) {
        ui.horizontal(|ui| {
            ui.label("Delete this save?");
            if ui.small_button("Yes").clicked() {
                app.send_command(EngineCommand::DeleteSlot(slot.id));
                app.ui.pending_delete = None;
            }
            if ui.small_button("No").clicked() {
                app.ui.pending_delete = None;
            }
        });
    }
}
