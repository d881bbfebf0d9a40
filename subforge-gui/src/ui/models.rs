//! Model table: download, delete, import and manual download links.

use eframe::egui::{self, RichText, Rounding};
use subforge_core::engine::get_all_model_definitions;
use subforge_core::{ModelMirror, Operation};

use crate::app::SubForgeApp;
use crate::ui::{colors, section};

/// One row of the table.
struct Row {
    name: String,
    size: Option<u32>,
    english_only: bool,
}

/// Catalog models first, then imported ones.
fn rows(app: &SubForgeApp) -> Vec<Row> {
    let mut rows: Vec<Row> = get_all_model_definitions()
        .iter()
        .map(|m| Row {
            name: m.name.to_string(),
            size: Some(m.size_mb),
            english_only: m.english_only,
        })
        .collect();

    for name in &app.status.installed_assets {
        if !rows.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
            rows.push(Row {
                name: name.clone(),
                size: None,
                english_only: false,
            });
        }
    }
    rows
}

/// Render the model section.
pub fn render(app: &mut SubForgeApp, ui: &mut egui::Ui) {
    let muted = colors::muted(ui.visuals());

    section(ui, "Models");

    ui.horizontal(|ui| {
        ui.label("Download from:");
        egui::ComboBox::from_id_salt("model_mirror")
            .selected_text(app.settings.model_mirror.as_str())
            .show_ui(ui, |ui| {
                for mirror in ModelMirror::all() {
                    if ui
                        .selectable_value(&mut app.settings.model_mirror, *mirror, mirror.as_str())
                        .changed()
                    {
                        app.save_settings();
                    }
                }
            });
    });

    if !app.status.dependency_installed {
        ui.label(
            RichText::new("Install whisper.cpp before downloading models")
                .size(11.0)
                .color(muted)
                .italics(),
        );
    }

    ui.add_space(8.0);

    let can_act = app.status.dependency_installed && !app.is_busy();
    let downloading = match app.active_operation() {
        Some(Operation::Download { asset, .. }) => Some(asset.clone()),
        _ => None,
    };

    let mut action: Option<Operation> = None;
    let mut selected_model: Option<String> = None;

    egui::Grid::new("models_grid")
        .num_columns(4)
        .striped(true)
        .spacing([16.0, 6.0])
        .show(ui, |ui| {
            ui.label(RichText::new("Model").strong());
            ui.label(RichText::new("Size").strong());
            ui.label(RichText::new("Status").strong());
            ui.label(RichText::new("").strong());
            ui.end_row();

            for row in rows(app) {
                let installed = app.status.has_asset(&row.name);
                let in_use = app.settings.model.eq_ignore_ascii_case(&row.name);

                // Name (click to select for transcription)
                let mut label = RichText::new(&row.name);
                if in_use {
                    label = label.strong().color(colors::ACCENT);
                }
                let response = ui.selectable_label(in_use, label);
                let response = if row.english_only {
                    response.on_hover_text("English only")
                } else {
                    response
                };
                if response.clicked() && installed {
                    selected_model = Some(row.name.clone());
                }

                ui.label(
                    RichText::new(match row.size {
                        Some(mb) if mb >= 1000 => format!("{:.1} GB", mb as f32 / 1000.0),
                        Some(mb) => format!("{mb} MB"),
                        None => "imported".to_string(),
                    })
                    .color(muted),
                );

                // Status
                if downloading.as_deref() == Some(row.name.as_str()) {
                    let percent = app
                        .progress
                        .download
                        .as_ref()
                        .map(|(_, p)| *p)
                        .unwrap_or(0.0);
                    ui.add(
                        egui::ProgressBar::new(percent / 100.0)
                            .desired_width(140.0)
                            .text(format!("{percent:.1}%")),
                    );
                } else if installed {
                    ui.label(RichText::new("Installed").color(colors::SUCCESS));
                } else {
                    ui.label(RichText::new("Not downloaded").color(muted));
                }

                // Actions
                ui.horizontal(|ui| {
                    if installed {
                        if ui
                            .add_enabled(
                                can_act,
                                egui::Button::new(RichText::new("Delete").color(colors::ERROR))
                                    .rounding(Rounding::same(6.0)),
                            )
                            .clicked()
                        {
                            action = Some(Operation::Delete(row.name.clone()));
                        }
                    } else if ui
                        .add_enabled(
                            can_act,
                            egui::Button::new("Download").rounding(Rounding::same(6.0)),
                        )
                        .clicked()
                    {
                        action = Some(Operation::Download {
                            asset: row.name.clone(),
                            mirror: app.settings.model_mirror,
                        });
                    }

                    if row.size.is_some() {
                        ui.menu_button("Links", |ui| {
                            render_manual_links(app, ui, &row.name);
                        });
                    }
                });
                ui.end_row();
            }
        });

    // Apply after the grid (avoids borrow conflict)
    if let Some(model) = selected_model {
        app.settings.model = model;
        app.save_settings();
    }
    if let Some(operation) = action {
        app.start(operation);
    }

    ui.add_space(12.0);
    render_import(app, ui, muted);
}

/// Manual download links with copy and open buttons.
fn render_manual_links(app: &mut SubForgeApp, ui: &mut egui::Ui, name: &str) {
    ui.label(
        RichText::new(format!("Place the files in {}", app.status.models_dir.display()))
            .size(11.0)
            .color(colors::muted(ui.visuals())),
    );

    for (label, url) in app.manual_download_urls(name) {
        ui.horizontal(|ui| {
            ui.label(label);
            if ui.small_button("Copy").on_hover_text(&url).clicked() {
                ui.ctx().copy_text(url.clone());
                app.set_status(&format!("Copied {label} link"));
                ui.close_menu();
            }
            if ui.small_button("Open").clicked() {
                app.open_url(&url);
                ui.close_menu();
            }
        });
    }
}

fn render_import(app: &mut SubForgeApp, ui: &mut egui::Ui, muted: egui::Color32) {
    ui.label(RichText::new("Import a model").strong());
    ui.horizontal(|ui| {
        ui.add(
            egui::TextEdit::singleline(&mut app.import_path)
                .hint_text("/path/to/ggml-<name>.bin")
                .desired_width(360.0),
        );
        let enabled = app.status.dependency_installed && !app.is_busy();
        if ui
            .add_enabled(enabled, egui::Button::new("Import").rounding(Rounding::same(6.0)))
            .clicked()
        {
            app.import_model();
        }
    });
    ui.label(
        RichText::new("Or drop a ggml-<name>.bin file onto the window")
            .size(11.0)
            .color(muted),
    );
}
