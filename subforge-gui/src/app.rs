//! Main application state and update loop.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use eframe::egui;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use subforge_core::config::{ProviderConfig, DEFAULT_PROVIDER};
use subforge_core::engine::{auxiliary_model_url, primary_model_url};
use subforge_core::{
    check_provider, default_data_root, event_channel, run_operation, Database, EngineManager,
    EventReceiver, LifecycleEvent, Operation, Providers, Settings, SystemStatus, Theme,
};

use crate::ui;
use crate::ui::settings::SettingsTab;

// =============================================================================
// Operation State
// =============================================================================

/// The lifecycle operation currently running, if any.
pub struct ActiveOperation {
    pub operation: Operation,
    rx: EventReceiver,
}

/// Progress reported by the running operation.
#[derive(Debug, Clone, Default)]
pub struct OperationProgress {
    /// Clone phase and fraction.
    pub fetch: Option<(String, f32)>,
    /// Download label and percent.
    pub download: Option<(String, f32)>,
    /// Most recent compiler line.
    pub last_output: Option<String>,
}

/// Form for a new OpenAI-compatible provider.
#[derive(Debug, Clone, Default)]
pub struct NewProviderForm {
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    pub model_name: String,
}

/// Result of a provider connectivity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCheck {
    Running,
    Passed(String),
    Failed(String),
}

type ProviderCheckResult = (String, Result<String, String>);

/// Main page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Models,
    Providers,
}

// =============================================================================
// Application State
// =============================================================================

/// Main application state.
pub struct SubForgeApp {
    /// Tokio runtime for async operations.
    pub runtime: Runtime,

    /// Database connection.
    pub db: Database,

    /// User settings.
    pub settings: Settings,

    /// Translation providers.
    pub providers: Providers,

    // -------------------------------------------------------------------------
    // Engine
    // -------------------------------------------------------------------------
    pub manager: Arc<EngineManager>,

    /// Last published engine status.
    pub status: SystemStatus,

    active: Option<ActiveOperation>,

    pub progress: OperationProgress,

    /// Outcome of the last finished operation.
    pub last_result: Option<Result<String, String>>,

    // -------------------------------------------------------------------------
    // UI State
    // -------------------------------------------------------------------------
    pub view: View,

    /// Show settings dialog.
    pub show_settings: bool,

    pub settings_tab: SettingsTab,

    /// Path typed into the model import field.
    pub import_path: String,

    pub new_provider: NewProviderForm,

    /// `<provider>_<field>` keys whose secrets are shown in clear text.
    pub revealed_secrets: HashSet<String>,

    /// Latest connectivity check per provider id.
    pub provider_checks: HashMap<String, ProviderCheck>,
    check_tx: mpsc::UnboundedSender<ProviderCheckResult>,
    check_rx: mpsc::UnboundedReceiver<ProviderCheckResult>,

    /// Status message.
    pub status_message: Option<(String, chrono::DateTime<chrono::Utc>)>,
}

impl SubForgeApp {
    /// Create a new application instance.
    pub fn new(cc: &eframe::CreationContext<'_>, runtime: Runtime) -> Self {
        info!("Initializing SubForgeApp");

        let db = open_database();

        let settings = Settings::load(&db);
        debug!(?settings, "Loaded settings");

        let providers = Providers::load(&db);
        debug!(count = providers.all().len(), "Loaded translation providers");

        let manager = Arc::new(EngineManager::new(default_data_root()));
        let status = manager.status();
        info!(
            installed = status.dependency_installed,
            built = status.dependency_built,
            models = status.installed_assets.len(),
            "Engine status"
        );

        ui::apply_theme(&cc.egui_ctx, settings.theme);
        let (check_tx, check_rx) = mpsc::unbounded_channel();

        let mut style = (*cc.egui_ctx.style()).clone();
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        cc.egui_ctx.set_style(style);

        Self {
            runtime,
            db,
            settings,
            providers,
            manager,
            status,
            active: None,
            progress: OperationProgress::default(),
            last_result: None,
            view: View::default(),
            show_settings: false,
            settings_tab: SettingsTab::default(),
            import_path: String::new(),
            new_provider: NewProviderForm::default(),
            revealed_secrets: HashSet::new(),
            provider_checks: HashMap::new(),
            check_tx,
            check_rx,
            status_message: None,
        }
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Whether a lifecycle operation is running.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_operation(&self) -> Option<&Operation> {
        self.active.as_ref().map(|a| &a.operation)
    }

    /// Starts `operation` unless another one is running.
    pub fn start(&mut self, operation: Operation) {
        if let Some(active) = &self.active {
            let msg = format!("Please wait: {} is still running", active.operation);
            self.set_status(&msg);
            return;
        }

        info!(%operation, "Starting operation");
        self.progress = OperationProgress::default();
        self.last_result = None;

        let (tx, rx) = event_channel();
        let _guard = self.runtime.enter();
        // The task reports through the channel; its handle is not needed.
        drop(run_operation(self.manager.clone(), operation.clone(), tx));

        self.active = Some(ActiveOperation { operation, rx });
    }

    pub fn install_engine(&mut self) {
        self.start(Operation::Install(self.settings.repo_mirror));
    }

    pub fn build_engine(&mut self) {
        self.start(Operation::Build);
    }

    pub fn uninstall_engine(&mut self) {
        self.start(Operation::Uninstall);
    }

    pub fn download_model(&mut self, name: &str) {
        self.start(Operation::Download {
            asset: name.to_string(),
            mirror: self.settings.model_mirror,
        });
    }

    pub fn delete_model(&mut self, name: &str) {
        self.start(Operation::Delete(name.to_string()));
    }

    /// Imports the model file named in the import field.
    pub fn import_model(&mut self) {
        let path = self.import_path.trim();
        if path.is_empty() {
            self.set_status("Enter the path of a ggml-<name>.bin file");
            return;
        }
        let path = PathBuf::from(path);
        self.import_path.clear();
        self.start(Operation::Import(path));
    }

    /// Looks for the Python `whisper` CLI.
    pub fn check_openai_whisper(&mut self) {
        self.start(Operation::CheckOpenAiWhisper);
    }

    /// Manual download links for a model on the selected mirror.
    pub fn manual_download_urls(&self, name: &str) -> Vec<(&'static str, String)> {
        let mirror = self.settings.model_mirror;
        let mut urls = vec![("Model", primary_model_url(name, mirror))];
        if self.manager.capabilities().requires_auxiliary {
            urls.push(("Core ML encoder", auxiliary_model_url(name, mirror)));
        }
        urls
    }

    /// Re-reads the engine status from disk.
    pub fn refresh_status(&mut self) {
        self.status = self.manager.status();
    }

    /// Process events from the running operation.
    pub fn process_events(&mut self, ctx: &egui::Context) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let mut events = Vec::new();
        let mut disconnected = false;
        loop {
            match active.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if !events.is_empty() {
            ctx.request_repaint();
        }

        for event in events {
            match event {
                LifecycleEvent::Started { id, operation } => {
                    debug!(%id, %operation, "Operation started");
                }

                LifecycleEvent::FetchProgress { phase, fraction } => {
                    self.progress.fetch = Some((phase, fraction));
                }

                LifecycleEvent::ProcessOutput(line) => {
                    self.progress.last_output = Some(line);
                }

                LifecycleEvent::DownloadProgress { label, percent } => {
                    self.progress.download = Some((label, percent));
                }

                LifecycleEvent::Completed { summary } => {
                    info!(%summary, "Operation completed");
                    self.set_status(&summary);
                    self.last_result = Some(Ok(summary));
                }

                LifecycleEvent::Failed { error } => {
                    error!(%error, "Operation failed");
                    self.set_status(&format!("Error: {error}"));
                    self.last_result = Some(Err(error));
                }

                LifecycleEvent::StatusChanged(status) => {
                    self.status = status;
                    self.active = None;
                }
            }
        }

        // The task ended without publishing a status
        if disconnected {
            if let Some(active) = self.active.take() {
                warn!(operation = %active.operation, "Operation channel closed unexpectedly");
                self.refresh_status();
            }
        }
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Adds the provider described by the form.
    pub fn add_provider(&mut self) {
        let form = std::mem::take(&mut self.new_provider);
        let provider =
            ProviderConfig::openai(&form.name, &form.api_url, &form.api_key, &form.model_name);
        match self.providers.add(provider) {
            Ok(()) => {
                info!(provider = %form.name, "Added translation provider");
                self.save_providers();
            }
            Err(e) => {
                self.set_status(&e.to_string());
                self.new_provider = form;
            }
        }
    }

    pub fn remove_provider(&mut self, id: &str) {
        match self.providers.remove(id) {
            Ok(removed) => {
                info!(provider = %removed.id, "Removed translation provider");
                if self.settings.translate_provider == removed.id {
                    self.settings.translate_provider = DEFAULT_PROVIDER.to_string();
                    self.save_settings();
                }
                self.save_providers();
            }
            Err(e) => self.set_status(&e.to_string()),
        }
    }

    /// Translates a sample sentence with provider `id` in the background.
    pub fn test_provider(&mut self, id: &str) {
        let Some(provider) = self.providers.get(id).cloned() else {
            return;
        };
        let source = self.settings.source_language.clone();
        let source = if source == "auto" { "en".to_string() } else { source };
        let target = self.settings.target_language.clone();
        let tx = self.check_tx.clone();

        info!(provider = %provider.id, "Checking translation provider");
        self.provider_checks
            .insert(provider.id.clone(), ProviderCheck::Running);

        self.runtime.spawn(async move {
            let result = check_provider(&provider, &source, &target)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send((provider.id, result));
        });
    }

    /// Collects finished provider checks.
    pub fn process_provider_checks(&mut self, ctx: &egui::Context) {
        while let Ok((id, result)) = self.check_rx.try_recv() {
            let check = match result {
                Ok(text) => ProviderCheck::Passed(text),
                Err(e) => {
                    warn!(provider = %id, error = %e, "Provider check failed");
                    ProviderCheck::Failed(e)
                }
            };
            self.provider_checks.insert(id, check);
            ctx.request_repaint();
        }
    }

    /// Save providers to the database.
    pub fn save_providers(&mut self) {
        if let Err(e) = self.providers.save(&self.db) {
            error!("Failed to save providers: {}", e);
            self.set_status("Failed to save translation providers");
        }
    }

    // =========================================================================
    // Misc
    // =========================================================================

    /// Set a status message.
    pub fn set_status(&mut self, msg: &str) {
        self.status_message = Some((msg.to_string(), chrono::Utc::now()));
    }

    /// Clear old status messages.
    pub fn clear_old_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if chrono::Utc::now() - *time > chrono::Duration::seconds(5) {
                self.status_message = None;
            }
        }
    }

    /// Save settings to the database.
    pub fn save_settings(&mut self) {
        self.settings.validate();
        if let Err(e) = self.settings.save(&self.db) {
            error!("Failed to save settings: {}", e);
            self.set_status("Failed to save settings");
        } else {
            self.set_status("Settings saved");
        }
    }

    /// Switch theme and persist it.
    pub fn set_theme(&mut self, ctx: &egui::Context, theme: Theme) {
        self.settings.theme = theme;
        ui::apply_theme(ctx, theme);
        self.save_settings();
    }

    /// Model files dropped onto the window are imported.
    pub fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });

        let Some(path) = dropped.into_iter().next() else {
            return;
        };

        if self.is_busy() {
            self.set_status("Please wait for the current operation to finish");
            return;
        }
        info!(path = %path.display(), "Importing dropped model file");
        self.start(Operation::Import(path));
    }

    /// Open a URL in the system browser.
    pub fn open_url(&mut self, url: &str) {
        if let Err(e) = webbrowser::open(url) {
            warn!(url, error = %e, "Failed to open browser");
            self.set_status(&format!("Could not open browser: {e}"));
        }
    }
}

/// Opens the settings database, falling back to an in-memory one.
fn open_database() -> Database {
    match open_and_migrate(Database::open()) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {:#}", e);
            open_and_migrate(Database::open_in_memory())
                .expect("Failed to create in-memory database")
        }
    }
}

fn open_and_migrate(db: anyhow::Result<Database>) -> anyhow::Result<Database> {
    let db = db?;
    db.migrate()?;
    Ok(db)
}

impl eframe::App for SubForgeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Drain lifecycle events
        self.process_events(ctx);
        self.process_provider_checks(ctx);
        self.handle_dropped_files(ctx);
        self.clear_old_status();

        // Top panel with menu
        egui::TopBottomPanel::top("menu_panel").show(ctx, |ui| {
            ui::menu::render(self, ui, ctx);
        });

        // Status bar at bottom
        egui::TopBottomPanel::bottom("status_panel")
            .max_height(24.0)
            .show(ctx, |ui| {
                ui::status::render(self, ui);
            });

        // Settings modal if open
        if self.show_settings {
            ui::settings::render(self, ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| match self.view {
                View::Models => {
                    ui::engine::render(self, ui);
                    ui.add_space(16.0);
                    ui::models::render(self, ui);
                }
                View::Providers => ui::providers::render(self, ui),
            });
        });

        // Keep polling while an operation runs
        let checking = self
            .provider_checks
            .values()
            .any(|c| *c == ProviderCheck::Running);
        if self.is_busy() || checking || self.status_message.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}
