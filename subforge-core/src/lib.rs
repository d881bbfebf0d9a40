//! SubForge Core Library
//!
//! This crate provides the core functionality for SubForge, a desktop
//! subtitle generator built on whisper.cpp. It includes:
//!
//! - whisper.cpp lifecycle: clone, build, model download, import, removal
//! - Configuration management (settings, translation providers)
//! - Database layer for settings and providers
//! - `${name}` templates for subtitle file names and prompts
//! - Translation clients for LLM-backed providers

pub mod config;
pub mod db;
pub mod engine;
pub mod template;
pub mod translate;

// Re-exports for convenience
pub use config::{
    ProviderConfig, ProviderKind, Providers, Settings, SrtSaveOption, Theme, TranslateContent,
    DEFAULT_MODEL,
};
pub use db::Database;

// Re-export engine
pub use engine::{
    default_data_root, event_channel, run_operation, EngineManager, EventReceiver, EventSender,
    ImportOutcome, LifecycleError, LifecycleEvent, ModelMirror, Operation, RepoMirror,
    SystemStatus,
};

// Re-export templates
pub use template::{render_template, srt_file_name, TemplateError};

// Re-export translation
pub use translate::{check_provider, translator_for, TranslateError, Translator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
