//! Settings dialog.

use eframe::egui::{self, RichText, Rounding, Vec2};
use subforge_core::config::MAX_CONCURRENT_TASKS;
use subforge_core::{srt_file_name, Settings, SrtSaveOption, Theme, TranslateContent};

use crate::app::SubForgeApp;
use crate::ui::{apply_theme, colors, section};

/// Active tab in the settings dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsTab {
    #[default]
    General,
    Subtitles,
    Appearance,
}

/// Languages offered in the pickers, as (code, name).
const LANGUAGES: &[(&str, &str)] = &[
    ("auto", "Auto detect"),
    ("en", "English"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
];

fn language_name(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// Render the settings dialog.
pub fn render(app: &mut SubForgeApp, ctx: &egui::Context) {
    egui::Window::new("Settings")
        .collapsible(false)
        .resizable(false)
        .default_width(520.0)
        .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
        .show(ctx, |ui| {
            let muted = colors::muted(ui.visuals());

            ui.spacing_mut().item_spacing = Vec2::new(8.0, 12.0);

            // -----------------------------------------------------------------
            // Tabs
            // -----------------------------------------------------------------
            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing.x = 0.0;
                for (tab, label) in [
                    (SettingsTab::General, "  General  "),
                    (SettingsTab::Subtitles, "  Subtitles  "),
                    (SettingsTab::Appearance, "  Appearance  "),
                ] {
                    let selected = app.settings_tab == tab;
                    let response = ui.selectable_label(selected, RichText::new(label).size(14.0));
                    if response.clicked() {
                        app.settings_tab = tab;
                    }
                }
            });
            ui.separator();

            // -----------------------------------------------------------------
            // Tab content
            // -----------------------------------------------------------------
            let scroll_max = (ui.available_height() - 80.0).max(200.0);
            egui::ScrollArea::vertical()
                .max_height(scroll_max)
                .show(ui, |ui| match app.settings_tab {
                    SettingsTab::General => render_general_tab(app, ui, muted),
                    SettingsTab::Subtitles => render_subtitles_tab(app, ui, muted),
                    SettingsTab::Appearance => render_appearance_tab(app, ui, ctx),
                });

            // -----------------------------------------------------------------
            // Footer (always visible)
            // -----------------------------------------------------------------
            ui.add_space(24.0);
            ui.separator();

            ui.horizontal(|ui| {
                if ui
                    .add_sized(
                        Vec2::new(100.0, 30.0),
                        egui::Button::new(RichText::new("Save").strong())
                            .fill(colors::ACCENT)
                            .rounding(Rounding::same(8.0)),
                    )
                    .clicked()
                {
                    app.save_settings();
                    app.show_settings = false;
                }

                if ui
                    .add_sized(
                        Vec2::new(100.0, 30.0),
                        egui::Button::new("Cancel").rounding(Rounding::same(8.0)),
                    )
                    .clicked()
                {
                    // Reload settings to discard changes
                    app.settings = Settings::load(&app.db);
                    apply_theme(ctx, app.settings.theme);
                    app.show_settings = false;
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        RichText::new(format!("v{}", subforge_core::VERSION))
                            .size(11.0)
                            .color(muted),
                    );
                });
            });
        });
}

fn language_select(ui: &mut egui::Ui, id: &str, value: &mut String, allow_auto: bool) {
    egui::ComboBox::from_id_salt(id)
        .selected_text(language_name(value).to_string())
        .show_ui(ui, |ui| {
            for (code, name) in LANGUAGES {
                if *code == "auto" && !allow_auto {
                    continue;
                }
                ui.selectable_value(value, code.to_string(), *name);
            }
        });
}

fn render_general_tab(app: &mut SubForgeApp, ui: &mut egui::Ui, muted: egui::Color32) {
    section(ui, "Languages");

    ui.horizontal(|ui| {
        ui.label("Spoken language:");
        language_select(ui, "source_language", &mut app.settings.source_language, true);
    });
    ui.horizontal(|ui| {
        ui.label("Translate to:");
        language_select(ui, "target_language", &mut app.settings.target_language, false);
    });

    ui.add_space(16.0);
    section(ui, "Transcription");

    ui.horizontal(|ui| {
        ui.label("Model:");
        let installed = app.status.installed_assets.clone();
        egui::ComboBox::from_id_salt("model_select")
            .selected_text(app.settings.model.clone())
            .show_ui(ui, |ui| {
                if installed.is_empty() {
                    ui.label(
                        RichText::new("Download a model first")
                            .color(muted)
                            .italics(),
                    );
                }
                for name in installed {
                    ui.selectable_value(&mut app.settings.model, name.clone(), name);
                }
            });
    });
    if !app.status.has_asset(&app.settings.model) {
        ui.label(
            RichText::new(format!("{} is not downloaded yet", app.settings.model))
                .size(11.0)
                .color(colors::WARNING),
        );
    }

    ui.horizontal(|ui| {
        ui.label("Parallel tasks:");
        ui.add(egui::Slider::new(
            &mut app.settings.max_concurrent_tasks,
            1..=MAX_CONCURRENT_TASKS,
        ));
    });

    ui.add_space(16.0);
    section(ui, "Translation");

    ui.horizontal(|ui| {
        ui.label("Provider:");
        let providers: Vec<(String, String)> = app
            .providers
            .all()
            .iter()
            .map(|p| (p.id.clone(), p.name.clone()))
            .collect();
        let selected = providers
            .iter()
            .find(|(id, _)| *id == app.settings.translate_provider)
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| app.settings.translate_provider.clone());
        egui::ComboBox::from_id_salt("provider_select")
            .selected_text(selected)
            .show_ui(ui, |ui| {
                for (id, name) in providers {
                    ui.selectable_value(&mut app.settings.translate_provider, id, name);
                }
            });
    });

    ui.horizontal(|ui| {
        ui.label("Subtitle content:");
        egui::ComboBox::from_id_salt("translate_content")
            .selected_text(app.settings.translate_content.to_string())
            .show_ui(ui, |ui| {
                for content in TranslateContent::all() {
                    ui.selectable_value(
                        &mut app.settings.translate_content,
                        *content,
                        content.to_string(),
                    );
                }
            });
    });
}

fn render_subtitles_tab(app: &mut SubForgeApp, ui: &mut egui::Ui, muted: egui::Color32) {
    let settings = &mut app.settings;

    section(ui, "Source subtitle");
    save_option_editor(
        ui,
        "source_save",
        &mut settings.source_srt_save_option,
        &mut settings.custom_source_srt_file_name,
    );

    ui.add_space(16.0);
    section(ui, "Translated subtitle");
    save_option_editor(
        ui,
        "target_save",
        &mut settings.target_srt_save_option,
        &mut settings.custom_target_srt_file_name,
    );

    ui.add_space(16.0);
    section(ui, "Preview");

    let values = [
        ("fileName", "interview"),
        ("sourceLanguage", settings.source_language.as_str()),
        ("targetLanguage", settings.target_language.as_str()),
        ("model", settings.model.as_str()),
    ];
    for (label, option, language, template) in [
        (
            "Source",
            settings.source_srt_save_option,
            settings.source_language.as_str(),
            settings.custom_source_srt_file_name.as_str(),
        ),
        (
            "Translated",
            settings.target_srt_save_option,
            settings.target_language.as_str(),
            settings.custom_target_srt_file_name.as_str(),
        ),
    ] {
        ui.horizontal(|ui| {
            ui.label(format!("{label}:"));
            match srt_file_name(option, "interview", language, template, &values) {
                Ok(name) => ui.label(RichText::new(format!("{name}.srt")).monospace()),
                Err(e) => ui.label(RichText::new(e.to_string()).color(colors::ERROR)),
            };
        });
    }
    ui.label(
        RichText::new("Templates may use ${fileName}, ${sourceLanguage}, ${targetLanguage} and ${model}")
            .size(11.0)
            .color(muted),
    );
}

fn save_option_editor(
    ui: &mut egui::Ui,
    id: &str,
    option: &mut SrtSaveOption,
    template: &mut String,
) {
    ui.horizontal(|ui| {
        ui.label("Save as:");
        egui::ComboBox::from_id_salt(id)
            .selected_text(option.to_string())
            .show_ui(ui, |ui| {
                for candidate in SrtSaveOption::all() {
                    ui.selectable_value(option, *candidate, candidate.to_string());
                }
            });
    });
    if *option == SrtSaveOption::Custom {
        ui.horizontal(|ui| {
            ui.label("Template:");
            ui.add(egui::TextEdit::singleline(template).desired_width(280.0));
        });
    }
}

fn render_appearance_tab(app: &mut SubForgeApp, ui: &mut egui::Ui, ctx: &egui::Context) {
    section(ui, "Appearance");

    ui.horizontal(|ui| {
        ui.label("Theme:");
        ui.add_space(8.0);

        for theme in Theme::all() {
            if ui
                .selectable_label(app.settings.theme == *theme, theme.to_string())
                .clicked()
                && app.settings.theme != *theme
            {
                app.settings.theme = *theme;
                apply_theme(ctx, *theme);
            }
        }
    });
}
