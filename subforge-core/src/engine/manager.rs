//! Engine manager for coordinating the whisper.cpp lifecycle.
//!
//! The `EngineManager` is the main entry point for the UI. It owns the
//! resolved paths, the platform capabilities and the host collaborators,
//! and delegates to the fetcher, the build driver and the asset downloader.
//! Status is always recomputed from disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::assets::{self, DownloadProgressCallback};
use super::builder;
use super::downloader::{DownloadHost, HttpDownloadHost};
use super::error::{LifecycleError, LifecycleResult};
use super::fetcher::{self, FetchProgressCallback};
use super::paths::{asset_name_from_file, remove_dir_if_exists, validate_asset_name, EnginePaths};
use super::process::{CommandSpec, LineCallback, ProcessRunner, TokioProcessRunner};
use super::types::{
    BuildOutcome, Capabilities, ImportOutcome, InstallOutcome, ModelMirror, RepoMirror,
    SystemStatus,
};

/// How long `whisper -h` may take before the CLI counts as unavailable.
pub const OPENAI_WHISPER_TIMEOUT: Duration = Duration::from_secs(5);

/// Manages the whisper.cpp installation and its models.
///
/// Thread-safe; share it across tasks behind an `Arc`. Calls are not
/// serialized: callers run at most one mutating operation at a time.
pub struct EngineManager {
    paths: EnginePaths,
    caps: Capabilities,
    runner: Arc<dyn ProcessRunner>,
    downloads: Arc<dyn DownloadHost>,
}

impl EngineManager {
    /// Creates a manager rooted at `data_root` using the real process and
    /// download hosts and the detected platform.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        let paths = EnginePaths::new(data_root);
        let caps = Capabilities::detect();

        info!(
            root = %paths.root().display(),
            platform = ?caps.platform,
            acceleration = caps.acceleration.display_name(),
            "EngineManager initialized"
        );

        Self::with_hosts(
            paths,
            caps,
            Arc::new(TokioProcessRunner),
            Arc::new(HttpDownloadHost::default()),
        )
    }

    /// Creates a manager with explicit collaborators.
    pub fn with_hosts(
        paths: EnginePaths,
        caps: Capabilities,
        runner: Arc<dyn ProcessRunner>,
        downloads: Arc<dyn DownloadHost>,
    ) -> Self {
        Self {
            paths,
            caps,
            runner,
            downloads,
        }
    }

    pub fn paths(&self) -> &EnginePaths {
        &self.paths
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Derives the aggregate status from the filesystem.
    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            dependency_installed: self.paths.is_installed(),
            dependency_built: self.paths.is_installed() && self.paths.is_built(&self.caps),
            installed_assets: self.installed_assets(),
            models_dir: self.paths.models_dir().to_path_buf(),
        }
    }

    /// Names of all fully installed models, sorted.
    fn installed_assets(&self) -> Vec<String> {
        let dir = self.paths.models_dir();
        if !dir.is_dir() {
            return Vec::new();
        }

        let pattern = format!(
            "{}/ggml-*.bin",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Invalid models glob");
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable model entry");
                    None
                }
            })
            .filter_map(|path| {
                let file_name = path.file_name()?.to_str()?;
                asset_name_from_file(file_name).map(str::to_string)
            })
            .filter(|name| self.paths.asset_record(name, &self.caps).is_installed())
            .collect();

        names.sort();
        names.dedup();
        names
    }

    // ========================================================================
    // Dependency
    // ========================================================================

    /// Clones whisper.cpp from `mirror`.
    pub async fn install_dependency(
        &self,
        mirror: RepoMirror,
        on_progress: FetchProgressCallback<'_>,
    ) -> LifecycleResult<InstallOutcome> {
        fetcher::install(&self.paths, self.runner.as_ref(), mirror, on_progress).await
    }

    /// Compiles whisper.cpp, falling back to a CPU build when acceleration fails.
    pub async fn build_dependency(
        &self,
        on_output: LineCallback<'_>,
    ) -> LifecycleResult<BuildOutcome> {
        builder::build(&self.paths, &self.caps, self.runner.as_ref(), on_output).await
    }

    /// Removes the entire installation, models included.
    pub async fn uninstall_dependency(&self) -> LifecycleResult<()> {
        info!(root = %self.paths.root().display(), "Uninstalling whisper.cpp");
        remove_dir_if_exists(self.paths.root()).await
    }

    // ========================================================================
    // Assets
    // ========================================================================

    /// Downloads a model from `mirror`.
    pub async fn download_asset(
        &self,
        name: &str,
        mirror: ModelMirror,
        on_progress: DownloadProgressCallback<'_>,
    ) -> LifecycleResult<()> {
        assets::download(
            &self.paths,
            &self.caps,
            self.downloads.as_ref(),
            name,
            mirror,
            on_progress,
        )
        .await
    }

    /// Deletes a model's weights and encoder package, whichever exist.
    pub async fn delete_asset(&self, name: &str) -> LifecycleResult<()> {
        let name = validate_asset_name(name)?;
        info!(asset = name, "Deleting model");

        let primary = self.paths.primary_model_file(name);
        match tokio::fs::remove_file(&primary).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(LifecycleError::fs(
                    &format!("Failed to remove {}", primary.display()),
                    e,
                ))
            }
        }

        remove_dir_if_exists(&self.paths.auxiliary_model_dir(name)).await
    }

    /// Copies a local `ggml-<name>.bin` file into the models directory.
    ///
    /// On platforms that need a Core ML encoder the model only becomes
    /// usable once the encoder exists; that case is reported as
    /// [`ImportOutcome::NeedsEncoder`].
    pub async fn import_asset(&self, source: &Path) -> LifecycleResult<ImportOutcome> {
        if !self.paths.is_installed() {
            return Err(LifecycleError::NotInstalled);
        }

        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let name = asset_name_from_file(file_name)
            .ok_or_else(|| LifecycleError::InvalidAsset(file_name.to_string()))?
            .to_string();

        if !source.is_file() {
            return Err(LifecycleError::FilesystemFailed(format!(
                "{} is not a file",
                source.display()
            )));
        }

        let dest = self.paths.primary_model_file(&name);
        if dest.as_path() != source {
            tokio::fs::copy(source, &dest).await.map_err(|e| {
                LifecycleError::fs(&format!("Failed to copy {}", source.display()), e)
            })?;
        }

        info!(asset = %name, source = %source.display(), "Model imported");
        if self.paths.asset_record(&name, &self.caps).is_installed() {
            Ok(ImportOutcome::Ready(name))
        } else {
            warn!(asset = %name, "Imported model still needs its Core ML encoder");
            Ok(ImportOutcome::NeedsEncoder(name))
        }
    }

    // ========================================================================
    // OpenAI Whisper CLI
    // ========================================================================

    /// Returns true if the Python `whisper` CLI answers `whisper -h` with
    /// exit code 0 within [`OPENAI_WHISPER_TIMEOUT`].
    pub async fn check_openai_whisper(&self) -> bool {
        self.check_openai_whisper_within(OPENAI_WHISPER_TIMEOUT).await
    }

    async fn check_openai_whisper_within(&self, limit: Duration) -> bool {
        let program = if cfg!(windows) { "whisper.exe" } else { "whisper" };
        let spec = CommandSpec::new(program)
            .arg("-h")
            .env("PYTHONIOENCODING", "UTF-8");

        match tokio::time::timeout(limit, self.runner.run(&spec, &|_: &str| {})).await {
            Ok(Ok(outcome)) => {
                debug!(code = ?outcome.exit_code, "OpenAI Whisper CLI check finished");
                outcome.success()
            }
            Ok(Err(e)) => {
                debug!(error = %e, "OpenAI Whisper CLI not available");
                false
            }
            Err(_) => {
                warn!(timeout = ?limit, "OpenAI Whisper CLI check timed out");
                false
            }
        }
    }
}
