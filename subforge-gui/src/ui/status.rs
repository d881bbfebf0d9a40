//! Status bar at the bottom of the window.

use eframe::egui::{self, RichText};

use crate::app::SubForgeApp;
use crate::ui::colors;

/// Render the status bar.
pub fn render(app: &SubForgeApp, ui: &mut egui::Ui) {
    let muted = colors::muted(ui.visuals());

    ui.horizontal(|ui| {
        // Status message
        if let Some((msg, _)) = &app.status_message {
            ui.label(RichText::new(msg).size(11.0).color(muted));
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let count = app.status.installed_assets.len();
            ui.label(
                RichText::new(format!(
                    "{} model{}",
                    count,
                    if count == 1 { "" } else { "s" }
                ))
                .size(11.0)
                .color(muted),
            );
            ui.separator();

            let engine = if app.status.dependency_built {
                "whisper.cpp ready"
            } else if app.status.dependency_installed {
                "whisper.cpp not built"
            } else {
                "whisper.cpp not installed"
            };
            ui.label(RichText::new(engine).size(11.0).color(muted));

            if let Some(op) = app.active_operation() {
                ui.separator();
                ui.spinner();
                ui.label(RichText::new(op.to_string()).size(11.0).color(muted));
            }
        });
    });
}
