//! SubForge GUI Application
//!
//! Desktop control panel for the whisper.cpp engine, its models and the
//! subtitle translation settings.

mod app;
mod ui;

use eframe::egui;

fn main() -> eframe::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("subforge=debug".parse().unwrap())
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting SubForge v{}", subforge_core::VERSION);

    // Create tokio runtime for async operations
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let _guard = runtime.enter();

    // Window configuration
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 720.0])
            .with_min_inner_size([760.0, 520.0])
            .with_title("SubForge"),
        renderer: eframe::Renderer::Glow,
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "SubForge",
        options,
        Box::new(|cc| Ok(Box::new(app::SubForgeApp::new(cc, runtime)))),
    )
}
