//! whisper.cpp lifecycle: install, build, model downloads, removal.
//!
//! whisper.cpp is cloned from a pinned tag into the user data directory and
//! compiled locally; model weights are downloaded next to it. All state
//! lives on disk and every status query re-reads it.
//!
//! # Architecture
//!
//! - `types`: Platform capabilities, mirrors, outcomes and status
//! - `paths`: Installation layout under the data root
//! - `catalog`: Pinned revision, repository mirrors, model list and URLs
//! - `process`: Child process seam (`ProcessRunner`)
//! - `downloader`: Download session seam (`DownloadHost`) and HTTP transfers
//! - `progress`: Combined download progress and rate limiting
//! - `extractor`: Zip extraction for Core ML encoder packages
//! - `fetcher`: Shallow clone with bounded retry
//! - `builder`: `make` with acceleration fallback
//! - `assets`: Per-model download, unpack and aggregation
//! - `manager`: High-level API used by the UI
//! - `events`: Task runner that turns progress into UI events
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use subforge_core::engine::{
//!     default_data_root, event_channel, run_operation, EngineManager, LifecycleEvent,
//!     ModelMirror, Operation,
//! };
//!
//! let manager = Arc::new(EngineManager::new(default_data_root()));
//!
//! let (tx, mut rx) = event_channel();
//! run_operation(
//!     manager.clone(),
//!     Operation::Download { asset: "tiny".into(), mirror: ModelMirror::HfMirror },
//!     tx,
//! );
//!
//! while let Some(event) = rx.recv().await {
//!     if let LifecycleEvent::DownloadProgress { percent, .. } = event {
//!         println!("{percent:.1}%");
//!     }
//! }
//! ```

pub mod assets;
pub mod builder;
pub mod catalog;
pub mod downloader;
pub mod error;
pub mod events;
pub mod extractor;
pub mod fetcher;
pub mod manager;
pub mod paths;
pub mod process;
pub mod progress;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use catalog::{
    auxiliary_model_url, get_all_model_definitions, get_model_definition, primary_model_url,
    repo_url, ModelDefinition, ENGINE_REVISION,
};
pub use downloader::{DownloadHost, HttpDownloadHost};
pub use error::{LifecycleError, LifecycleResult};
pub use events::{
    event_channel, run_operation, EventReceiver, EventSender, LifecycleEvent, Operation,
    OperationId,
};
pub use manager::{EngineManager, OPENAI_WHISPER_TIMEOUT};
pub use paths::{default_data_root, EnginePaths};
pub use process::{ProcessRunner, TokioProcessRunner};
pub use types::{
    Acceleration, AssetRecord, BuildOutcome, Capabilities, ImportOutcome, InstallOutcome,
    ModelMirror, Platform, RepoMirror, SystemStatus,
};
