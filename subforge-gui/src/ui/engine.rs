//! whisper.cpp engine card: install, build, uninstall and live progress.

use eframe::egui::{self, RichText, Rounding, Vec2};
use subforge_core::engine::ENGINE_REVISION;
use subforge_core::{Operation, RepoMirror};

use crate::app::SubForgeApp;
use crate::ui::{colors, section};

/// Render the engine card.
pub fn render(app: &mut SubForgeApp, ui: &mut egui::Ui) {
    let muted = colors::muted(ui.visuals());
    let busy = app.is_busy();

    section(ui, "whisper.cpp");

    egui::Frame::none()
        .fill(colors::card_bg(ui.visuals()))
        .stroke(egui::Stroke::new(1.0, colors::border(ui.visuals())))
        .rounding(Rounding::same(8.0))
        .inner_margin(12.0)
        .show(ui, |ui| {
            ui.set_width(ui.available_width());

            // -----------------------------------------------------------------
            // State
            // -----------------------------------------------------------------
            ui.horizontal(|ui| {
                ui.label("Status:");
                let (text, color) = if app.status.dependency_built {
                    ("Ready", colors::SUCCESS)
                } else if app.status.dependency_installed {
                    ("Installed, not built", colors::WARNING)
                } else {
                    ("Not installed", colors::ERROR)
                };
                ui.label(RichText::new(text).color(color).strong());

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        RichText::new(ENGINE_REVISION)
                            .size(11.0)
                            .color(muted),
                    );
                });
            });

            if let Some(platform) = app.manager.capabilities().platform {
                ui.label(
                    RichText::new(format!(
                        "{} · {} build",
                        platform,
                        app.manager.capabilities().acceleration.display_name()
                    ))
                    .size(11.0)
                    .color(muted),
                );
            } else {
                ui.label(
                    RichText::new("Unsupported platform, a CPU build will be attempted")
                        .size(11.0)
                        .color(colors::WARNING),
                );
            }

            ui.add_space(8.0);

            // -----------------------------------------------------------------
            // Actions
            // -----------------------------------------------------------------
            ui.horizontal(|ui| {
                if !app.status.dependency_installed {
                    ui.label("Source:");
                    egui::ComboBox::from_id_salt("repo_mirror")
                        .selected_text(app.settings.repo_mirror.as_str())
                        .show_ui(ui, |ui| {
                            for mirror in RepoMirror::all() {
                                if ui
                                    .selectable_value(
                                        &mut app.settings.repo_mirror,
                                        *mirror,
                                        mirror.as_str(),
                                    )
                                    .changed()
                                {
                                    app.save_settings();
                                }
                            }
                        });

                    if ui
                        .add_enabled(!busy, primary_button("Install"))
                        .clicked()
                    {
                        app.install_engine();
                    }
                } else {
                    if !app.status.dependency_built
                        && ui.add_enabled(!busy, primary_button("Build")).clicked()
                    {
                        app.build_engine();
                    }

                    if ui
                        .add_enabled(
                            !busy,
                            egui::Button::new(RichText::new("Uninstall").color(colors::ERROR))
                                .rounding(Rounding::same(8.0)),
                        )
                        .clicked()
                    {
                        app.uninstall_engine();
                    }
                }
            });

            render_progress(app, ui, muted);
        });
}

fn primary_button(label: &str) -> egui::Button<'static> {
    egui::Button::new(RichText::new(label.to_string()).strong())
        .fill(colors::ACCENT)
        .rounding(Rounding::same(8.0))
        .min_size(Vec2::new(90.0, 26.0))
}

fn render_progress(app: &SubForgeApp, ui: &mut egui::Ui, muted: egui::Color32) {
    match app.active_operation() {
        Some(Operation::Install(mirror)) => {
            ui.add_space(8.0);
            match &app.progress.fetch {
                Some((phase, fraction)) => {
                    ui.add(
                        egui::ProgressBar::new(*fraction)
                            .show_percentage()
                            .text(format!("{phase} ({mirror})")),
                    );
                }
                None => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(RichText::new(format!("Cloning from {mirror}...")).color(muted));
                    });
                }
            }
        }
        Some(Operation::Build) => {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Compiling...");
            });
            if let Some(line) = &app.progress.last_output {
                ui.label(RichText::new(line).monospace().size(11.0).color(muted));
            }
        }
        Some(Operation::Uninstall) => {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Removing...");
            });
        }
        _ => {
            if let Some(Err(error)) = &app.last_result {
                ui.add_space(8.0);
                ui.label(RichText::new(error).color(colors::ERROR).size(12.0));
            }
        }
    }
}
