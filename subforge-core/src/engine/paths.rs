//! Path resolution for the whisper.cpp installation.
//!
//! Everything lives under the per-user data root:
//!
//! - `{data}/subforge/whisper.cpp/` - source tree (installation root)
//! - `{data}/subforge/whisper.cpp/main` - built executable
//! - `{data}/subforge/whisper.cpp/models/` - model weights
//!
//! `EnginePaths` is a pure resolver; the filesystem predicates below it are
//! the only functions here that touch the disk.

use std::path::{Path, PathBuf};

use super::error::{LifecycleError, LifecycleResult};
use super::types::{AssetRecord, Capabilities};

/// Application directory name under the OS data directory.
const APP_DIR: &str = "subforge";

/// Installation directory name under the data root.
pub const ENGINE_DIR: &str = "whisper.cpp";

/// Asset directory name inside the installation.
const MODELS_DIR: &str = "models";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "main.exe";

#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "main";

/// Returns the per-user data root.
///
/// e.g. `~/.local/share/subforge` on Linux,
/// `~/Library/Application Support/subforge` on macOS.
pub fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Resolved locations of the engine installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    data_root: PathBuf,
    root: PathBuf,
    executable: PathBuf,
    models_dir: PathBuf,
}

impl EnginePaths {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        let root = data_root.join(ENGINE_DIR);
        let executable = root.join(EXECUTABLE_NAME);
        let models_dir = root.join(MODELS_DIR);
        Self {
            data_root,
            root,
            executable,
            models_dir,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Installation root (the cloned source tree).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Executable produced by `make`.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// `models/ggml-<asset>.bin`
    pub fn primary_model_file(&self, asset: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{asset}.bin"))
    }

    /// `models/ggml-<asset>-encoder.mlmodelc/`
    pub fn auxiliary_model_dir(&self, asset: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{asset}-encoder.mlmodelc"))
    }

    /// `models/ggml-<asset>-encoder.mlmodelc.zip`
    pub fn auxiliary_archive(&self, asset: &str) -> PathBuf {
        self.models_dir
            .join(format!("ggml-{asset}-encoder.mlmodelc.zip"))
    }

    // ========================================================================
    // Filesystem predicates
    // ========================================================================

    /// The source tree is present once its `models/` directory exists.
    pub fn is_installed(&self) -> bool {
        self.models_dir.is_dir()
    }

    pub fn is_built(&self, caps: &Capabilities) -> bool {
        caps.prebuilt_binary || self.executable.is_file()
    }

    /// Current on-disk state of one asset.
    pub fn asset_record(&self, asset: &str, caps: &Capabilities) -> AssetRecord {
        AssetRecord {
            name: asset.to_string(),
            has_primary: self.primary_model_file(asset).is_file(),
            has_auxiliary: self.auxiliary_model_dir(asset).is_dir(),
            requires_auxiliary: caps.requires_auxiliary,
        }
    }
}

/// Recursively removes `dir`; an absent directory is not an error.
pub(crate) async fn remove_dir_if_exists(dir: &Path) -> LifecycleResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LifecycleError::fs(
            &format!("Failed to remove {}", dir.display()),
            e,
        )),
    }
}

/// Rejects names that could escape the models directory.
pub fn validate_asset_name(name: &str) -> LifecycleResult<&str> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(name)
    } else {
        Err(LifecycleError::InvalidAsset(name.to_string()))
    }
}

/// Extracts the asset name from a `ggml-<name>.bin` file name.
pub fn asset_name_from_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix("ggml-")
        .and_then(|rest| rest.strip_suffix(".bin"))
        .filter(|name| validate_asset_name(name).is_ok())
}
