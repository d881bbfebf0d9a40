//! Top menu bar.

use eframe::egui::{self, RichText};
use subforge_core::engine::repo_url;
use subforge_core::{RepoMirror, Theme};

use crate::app::{SubForgeApp, View};
use crate::ui::colors;

/// Render the top menu bar.
pub fn render(app: &mut SubForgeApp, ui: &mut egui::Ui, ctx: &egui::Context) {
    egui::menu::bar(ui, |ui| {
        ui.label(RichText::new("SubForge").strong().size(15.0));
        ui.separator();

        // File menu
        ui.menu_button("File", |ui| {
            if ui.button("Refresh Status").clicked() {
                app.refresh_status();
                ui.close_menu();
            }
            if ui
                .add_enabled(!app.is_busy(), egui::Button::new("Check OpenAI Whisper CLI"))
                .clicked()
            {
                app.check_openai_whisper();
                ui.close_menu();
            }

            ui.separator();

            if ui.button("Quit").clicked() {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });

        // Edit menu
        ui.menu_button("Edit", |ui| {
            if ui.button("Settings...").clicked() {
                app.show_settings = true;
                ui.close_menu();
            }
        });

        // View menu
        ui.menu_button("View", |ui| {
            if ui
                .radio(app.view == View::Models, "Engine & Models")
                .clicked()
            {
                app.view = View::Models;
                ui.close_menu();
            }
            if ui
                .radio(app.view == View::Providers, "Translation Providers")
                .clicked()
            {
                app.view = View::Providers;
                ui.close_menu();
            }

            ui.separator();

            let dark_mode = app.settings.theme == Theme::Dark;
            if ui.checkbox(&mut { dark_mode }, "Dark Mode").changed() {
                let theme = if dark_mode { Theme::Light } else { Theme::Dark };
                app.set_theme(ctx, theme);
            }
        });

        // Help menu
        ui.menu_button("Help", |ui| {
            if ui.button("whisper.cpp on GitHub").clicked() {
                app.open_url(repo_url(RepoMirror::Github));
                ui.close_menu();
            }
        });

        // Right-aligned page switch
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            for (view, label) in [
                (View::Providers, "Providers"),
                (View::Models, "Models"),
            ] {
                let selected = app.view == view;
                let text = if selected {
                    RichText::new(label).color(colors::ACCENT).strong()
                } else {
                    RichText::new(label)
                };
                if ui.selectable_label(selected, text).clicked() {
                    app.view = view;
                }
            }
        });
    });
}
