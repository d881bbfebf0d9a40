//! Translation provider editor.

use eframe::egui::{self, RichText, Rounding, Vec2};
use subforge_core::config::ProviderKind;

use crate::app::{ProviderCheck, SubForgeApp};
use crate::ui::{colors, section};

/// Editable fields of a provider row.
#[derive(Clone, Copy)]
enum Field {
    ApiKey,
    ApiSecret,
    ApiUrl,
    ModelName,
    Prompt,
}

/// Render the provider page.
pub fn render(app: &mut SubForgeApp, ui: &mut egui::Ui) {
    let muted = colors::muted(ui.visuals());
    let mut changed = false;
    let mut remove: Option<String> = None;
    let mut test: Option<String> = None;

    // -------------------------------------------------------------------------
    // Vendor APIs
    // -------------------------------------------------------------------------
    section(ui, "API providers");
    egui::Grid::new("api_providers")
        .num_columns(4)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            ui.label(RichText::new("Provider").strong());
            ui.label(RichText::new("Key").strong());
            ui.label(RichText::new("Secret").strong());
            ui.label("");
            ui.end_row();

            for id in ids(app, ProviderKind::Api) {
                ui.label(name_of(app, &id));
                changed |= secret_field(app, ui, &id, Field::ApiKey);
                changed |= secret_field(app, ui, &id, Field::ApiSecret);
                if check_cell(app, ui, &id) {
                    test = Some(id.clone());
                }
                ui.end_row();
            }
        });

    ui.add_space(16.0);

    // -------------------------------------------------------------------------
    // Local services
    // -------------------------------------------------------------------------
    section(ui, "Local providers");
    egui::Grid::new("local_providers")
        .num_columns(5)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            ui.label(RichText::new("Provider").strong());
            ui.label(RichText::new("Address").strong());
            ui.label(RichText::new("Model").strong());
            ui.label(RichText::new("Prompt").strong());
            ui.label("");
            ui.end_row();

            for id in ids(app, ProviderKind::Local) {
                ui.label(name_of(app, &id));
                changed |= text_field(app, ui, &id, Field::ApiUrl);
                changed |= text_field(app, ui, &id, Field::ModelName);
                changed |= text_field(app, ui, &id, Field::Prompt);
                if check_cell(app, ui, &id) {
                    test = Some(id.clone());
                }
                ui.end_row();
            }
        });

    ui.add_space(16.0);

    // -------------------------------------------------------------------------
    // OpenAI-compatible
    // -------------------------------------------------------------------------
    section(ui, "OpenAI-compatible providers");
    egui::Grid::new("openai_providers")
        .num_columns(7)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            ui.label(RichText::new("Provider").strong());
            ui.label(RichText::new("Address").strong());
            ui.label(RichText::new("API token").strong());
            ui.label(RichText::new("Model").strong());
            ui.label(RichText::new("Prompt").strong());
            ui.label("");
            ui.label("");
            ui.end_row();

            for id in ids(app, ProviderKind::OpenAi) {
                ui.label(name_of(app, &id));
                changed |= text_field(app, ui, &id, Field::ApiUrl);
                changed |= secret_field(app, ui, &id, Field::ApiKey);
                changed |= text_field(app, ui, &id, Field::ModelName);
                changed |= text_field(app, ui, &id, Field::Prompt);
                if check_cell(app, ui, &id) {
                    test = Some(id.clone());
                }
                if ui
                    .button(RichText::new("Remove").color(colors::ERROR))
                    .clicked()
                {
                    remove = Some(id.clone());
                }
                ui.end_row();
            }
        });

    if changed {
        app.save_providers();
    }
    if let Some(id) = test {
        app.test_provider(&id);
    }
    if let Some(id) = remove {
        app.provider_checks.remove(&id);
        app.remove_provider(&id);
    }

    ui.add_space(12.0);
    render_new_provider(app, ui, muted);
}

fn ids(app: &SubForgeApp, kind: ProviderKind) -> Vec<String> {
    app.providers.of_kind(kind).map(|p| p.id.clone()).collect()
}

fn name_of(app: &SubForgeApp, id: &str) -> String {
    app.providers
        .get(id)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

/// "Test" button plus the outcome of the last check. Returns true when clicked.
fn check_cell(app: &SubForgeApp, ui: &mut egui::Ui, id: &str) -> bool {
    let check = app.provider_checks.get(id);
    ui.horizontal(|ui| {
        let running = matches!(check, Some(ProviderCheck::Running));
        let clicked = ui
            .add_enabled(!running, egui::Button::new("Test"))
            .on_hover_text("Translate a sample sentence with this provider")
            .clicked();
        match check {
            Some(ProviderCheck::Running) => {
                ui.spinner();
            }
            Some(ProviderCheck::Passed(text)) => {
                ui.label(RichText::new(text).color(colors::SUCCESS));
            }
            Some(ProviderCheck::Failed(e)) => {
                ui.label(RichText::new("Failed").color(colors::ERROR))
                    .on_hover_text(e);
            }
            None => {}
        }
        clicked
    })
    .inner
}

fn field_mut<'a>(app: &'a mut SubForgeApp, id: &str, field: Field) -> Option<&'a mut String> {
    let provider = app.providers.get_mut(id)?;
    Some(match field {
        Field::ApiKey => &mut provider.api_key,
        Field::ApiSecret => &mut provider.api_secret,
        Field::ApiUrl => &mut provider.api_url,
        Field::ModelName => &mut provider.model_name,
        Field::Prompt => &mut provider.prompt,
    })
}

/// Plain text field. Returns true when edited.
fn text_field(app: &mut SubForgeApp, ui: &mut egui::Ui, id: &str, field: Field) -> bool {
    let multiline = matches!(field, Field::Prompt);
    let Some(value) = field_mut(app, id, field) else {
        ui.label("");
        return false;
    };
    let edit = if multiline {
        egui::TextEdit::multiline(value).desired_rows(2)
    } else {
        egui::TextEdit::singleline(value)
    };
    ui.add(edit.desired_width(180.0)).changed()
}

/// Masked field with a show/hide toggle. Returns true when edited.
fn secret_field(app: &mut SubForgeApp, ui: &mut egui::Ui, id: &str, field: Field) -> bool {
    let key = format!("{id}_{}", field_key(field));
    let mut revealed = app.revealed_secrets.contains(&key);

    let changed = ui
        .horizontal(|ui| {
            let changed = match field_mut(app, id, field) {
                Some(value) => ui
                    .add(
                        egui::TextEdit::singleline(value)
                            .password(!revealed)
                            .desired_width(160.0),
                    )
                    .changed(),
                None => false,
            };
            if ui
                .small_button(if revealed { "Hide" } else { "Show" })
                .clicked()
            {
                revealed = !revealed;
            }
            changed
        })
        .inner;

    if revealed {
        app.revealed_secrets.insert(key);
    } else {
        app.revealed_secrets.remove(&key);
    }
    changed
}

fn field_key(field: Field) -> &'static str {
    match field {
        Field::ApiKey => "apiKey",
        Field::ApiSecret => "apiSecret",
        Field::ApiUrl => "apiUrl",
        Field::ModelName => "modelName",
        Field::Prompt => "prompt",
    }
}

fn render_new_provider(app: &mut SubForgeApp, ui: &mut egui::Ui, muted: egui::Color32) {
    ui.label(RichText::new("Add an OpenAI-compatible provider").strong());

    egui::Grid::new("new_provider")
        .num_columns(2)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            let form = &mut app.new_provider;
            for (label, value, hint) in [
                ("Name", &mut form.name, "DeepSeek"),
                ("Address", &mut form.api_url, "https://api.deepseek.com"),
                ("API token", &mut form.api_key, "sk-..."),
                ("Model", &mut form.model_name, "deepseek-chat"),
            ] {
                ui.label(label);
                ui.add(
                    egui::TextEdit::singleline(value)
                        .hint_text(hint)
                        .desired_width(260.0),
                );
                ui.end_row();
            }
        });

    ui.horizontal(|ui| {
        let ready = !app.new_provider.name.trim().is_empty()
            && !app.new_provider.api_url.trim().is_empty();
        if ui
            .add_enabled(
                ready,
                egui::Button::new(RichText::new("Add").strong())
                    .fill(colors::ACCENT)
                    .rounding(Rounding::same(8.0))
                    .min_size(Vec2::new(80.0, 26.0)),
            )
            .clicked()
        {
            app.add_provider();
        }
        ui.label(
            RichText::new("The id is the lowercased name and must be unique")
                .size(11.0)
                .color(muted),
        );
    });
}
