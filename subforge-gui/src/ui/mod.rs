//! UI components for SubForge.

pub mod engine;
pub mod menu;
pub mod models;
pub mod providers;
pub mod settings;
pub mod status;

use eframe::egui;
use subforge_core::Theme;

/// Apply the visuals for `theme`.
pub fn apply_theme(ctx: &egui::Context, theme: Theme) {
    let visuals = match theme {
        Theme::Dark => egui::Visuals::dark(),
        Theme::Light => egui::Visuals::light(),
    };
    ctx.set_visuals(visuals);
}

/// Section heading with a separator below.
pub fn section(ui: &mut egui::Ui, title: &str) {
    ui.heading(title);
    ui.separator();
}

// Theme-aware colors for the UI
pub mod colors {
    use eframe::egui::{Color32, Visuals};

    /// Primary action buttons (same for both themes)
    pub const ACCENT: Color32 = Color32::from_rgb(59, 130, 246); // Blue

    /// Success green
    pub const SUCCESS: Color32 = Color32::from_rgb(34, 197, 94);

    /// Error red
    pub const ERROR: Color32 = Color32::from_rgb(239, 68, 68);

    /// Warning amber
    pub const WARNING: Color32 = Color32::from_rgb(245, 158, 11);

    /// Get card background based on theme
    pub fn card_bg(visuals: &Visuals) -> Color32 {
        if visuals.dark_mode {
            Color32::from_rgb(40, 40, 45)
        } else {
            Color32::from_rgb(245, 245, 250)
        }
    }

    /// Get muted text color based on theme
    pub fn muted(visuals: &Visuals) -> Color32 {
        if visuals.dark_mode {
            Color32::from_rgb(156, 163, 175)
        } else {
            Color32::from_rgb(100, 100, 110)
        }
    }

    /// Get border color based on theme
    pub fn border(visuals: &Visuals) -> Color32 {
        if visuals.dark_mode {
            Color32::from_rgb(70, 70, 75)
        } else {
            Color32::from_rgb(200, 200, 210)
        }
    }
}
