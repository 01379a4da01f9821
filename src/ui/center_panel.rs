use eframe::egui;

use super::app::KotodamaApp;
use crate::engine::protocol::EngineCommand;

pub fn draw_center_panel(ctx: &egui::Context, app: &mut KotodamaApp) {
    let input_id = egui::Id::new("command_input_box");
    let busy = app.ui.view.busy;
    let has_game = app.ui.active().is_some();

    // ---------- Input bar ----------
    egui::TopBottomPanel::bottom("command_input").show(ctx, |ui| {
        let mut send_now: Option<String> = None;

        // Suggested actions from the last narration
        if let Some(active) = app.ui.active() {
            if !active.actions.is_empty() {
                ui.add_enabled_ui(!busy, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        for action in &active.actions {
                            if ui.button(action).clicked() {
                                send_now = Some(action.clone());
                            }
                        }
                    });
                });
                ui.separator();
            }
        }

        ui.add_enabled_ui(has_game && !busy, |ui| {
            ui.horizontal(|ui| {
                let hint = if busy { "The narrator is writing…" } else { "What do you do?" };
                let response = ui.add_sized(
                    [ui.available_width() - 60.0, 48.0],
                    egui::TextEdit::multiline(&mut app.ui.input_text)
                        .id(input_id)
                        .hint_text(hint)
                        .lock_focus(true),
                );

                // Enter sends, Shift+Enter breaks the line
                if response.has_focus()
                    && ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift)
                {
                    send_now = Some(app.ui.input_text.clone());
                }

                if ui.button("Send").clicked() {
                    send_now = Some(app.ui.input_text.clone());
                }
            });
        });

        if let Some(text) = send_now {
            let text = text.trim().to_string();
            if !text.is_empty() {
                app.send_command(EngineCommand::SubmitCommand(text));
                app.ui.input_text.clear();
            }
            ui.memory_mut(|m| m.request_focus(input_id));
        }
    });

    // ---------- Adventure log ----------
    egui::CentralPanel::default().show(ctx, |ui| {
        let Some(active) = app.ui.active() else {
            ui.centered_and_justified(|ui| {
                ui.label("Start a new adventure or load a save from the left.");
            });
            return;
        };

        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .stick_to_bottom(app.ui.should_auto_scroll)
            .show(ui, |ui| {
                for msg in &active.log {
                    app.draw_message(ui, msg);
                }
                if busy {
                    ui.add_space(6.0);
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("The narrator is writing…");
                    });
                }
            });
    });

    app.ui.should_auto_scroll = false;
}
