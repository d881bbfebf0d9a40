//! Configuration module for SubForge.
//!
//! Manages application settings and translation providers stored in SQLite.

mod providers;
mod settings;

pub use providers::{
    default_providers, ProviderConfig, ProviderError, ProviderKind, Providers, DEFAULT_PROMPT,
};
pub use settings::{
    Settings, SrtSaveOption, Theme, TranslateContent, DEFAULT_MODEL, DEFAULT_PROVIDER,
    MAX_CONCURRENT_TASKS,
};
