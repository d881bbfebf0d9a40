//! Core types for the whisper.cpp engine lifecycle.
//!
//! This module defines the foundational types shared by the fetcher, build
//! driver, asset downloader and manager: platform classification, mirror
//! selectors, operation outcomes and the derived system status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Platform Detection
// ============================================================================

/// Represents a supported platform (OS + architecture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    LinuxX64,
    LinuxArm64,
    MacosX64,
    MacosArm64,
    WindowsX64,
}

impl Platform {
    /// Detects the current platform at runtime.
    ///
    /// Returns `None` if the platform is unsupported.
    pub fn detect() -> Option<Self> {
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        {
            Some(Platform::LinuxX64)
        }
        #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
        {
            Some(Platform::LinuxArm64)
        }
        #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
        {
            Some(Platform::MacosX64)
        }
        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        {
            Some(Platform::MacosArm64)
        }
        #[cfg(all(target_os = "windows", target_arch = "x86_64"))]
        {
            Some(Platform::WindowsX64)
        }
        #[cfg(not(any(
            all(target_os = "linux", target_arch = "x86_64"),
            all(target_os = "linux", target_arch = "aarch64"),
            all(target_os = "macos", target_arch = "x86_64"),
            all(target_os = "macos", target_arch = "aarch64"),
            all(target_os = "windows", target_arch = "x86_64"),
        )))]
        {
            None
        }
    }

    /// Returns a human-readable description of the platform.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LinuxX64 => "Linux (x86_64)",
            Self::LinuxArm64 => "Linux (ARM64)",
            Self::MacosX64 => "macOS (Intel)",
            Self::MacosArm64 => "macOS (Apple Silicon)",
            Self::WindowsX64 => "Windows (x86_64)",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Platform Capabilities
// ============================================================================

/// Lowercase fragments that mark a compiler, linker or make error line.
const ERROR_LINE_MARKERS: &[&str] = &[
    "error",
    "not found",
    "no such file",
    "undefined reference",
    "cannot find",
];

/// Hardware acceleration mode used when compiling whisper.cpp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acceleration {
    /// Core ML encoder on Apple silicon.
    CoreMl,
    /// cuBLAS on machines with an NVIDIA toolchain.
    Cuda,
    /// Plain CPU build.
    None,
}

impl Acceleration {
    /// Environment variables that switch the whisper.cpp Makefile into this mode.
    pub fn make_env(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::CoreMl => &[("WHISPER_COREML", "1")],
            Self::Cuda => &[("WHISPER_CUBLAS", "1")],
            Self::None => &[],
        }
    }

    /// Lowercase markers that identify a failure caused by the acceleration layer.
    pub fn failure_markers(&self) -> &'static [&'static str] {
        match self {
            Self::CoreMl => &["coreml"],
            Self::Cuda => &["cublas", "nvcc"],
            Self::None => &[],
        }
    }

    /// Returns true if an error line in `output` names this acceleration layer.
    ///
    /// Ordinary compile lines are ignored: accelerated builds pass the
    /// marker in their flags on every line.
    pub fn is_acceleration_failure(&self, output: &str) -> bool {
        output
            .lines()
            .map(str::to_lowercase)
            .filter(|line| ERROR_LINE_MARKERS.iter().any(|m| line.contains(m)))
            .any(|line| self.failure_markers().iter().any(|m| line.contains(m)))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CoreMl => "Core ML",
            Self::Cuda => "CUDA",
            Self::None => "CPU",
        }
    }
}

/// Platform capability classification, resolved once at startup.
///
/// Passed into the build driver and the asset downloader so neither
/// re-queries the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Detected platform, `None` when unsupported.
    pub platform: Option<Platform>,
    /// Acceleration attempted on the first build.
    pub acceleration: Acceleration,
    /// The engine binary ships with the application; nothing to compile.
    pub prebuilt_binary: bool,
    /// Models need the Core ML encoder package next to the weights.
    pub requires_auxiliary: bool,
}

impl Capabilities {
    /// Classifies the current machine.
    pub fn detect() -> Self {
        Self::for_platform(Platform::detect())
    }

    /// Classifies a given platform.
    pub fn for_platform(platform: Option<Platform>) -> Self {
        match platform {
            Some(Platform::MacosArm64) => Self {
                platform,
                acceleration: Acceleration::CoreMl,
                prebuilt_binary: false,
                requires_auxiliary: true,
            },
            Some(Platform::WindowsX64) => Self {
                platform,
                acceleration: Acceleration::None,
                prebuilt_binary: true,
                requires_auxiliary: false,
            },
            Some(_) => Self {
                platform,
                acceleration: Acceleration::Cuda,
                prebuilt_binary: false,
                requires_auxiliary: false,
            },
            None => Self {
                platform,
                acceleration: Acceleration::None,
                prebuilt_binary: false,
                requires_auxiliary: false,
            },
        }
    }
}

// ============================================================================
// Mirrors
// ============================================================================

/// Source mirror for the whisper.cpp repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoMirror {
    #[default]
    Github,
    Gitee,
}

impl RepoMirror {
    pub fn all() -> &'static [RepoMirror] {
        &[Self::Github, Self::Gitee]
    }

    /// Parses a mirror selector. Unknown selectors fall back to the default.
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim().to_lowercase().as_str() {
            "gitee" => Self::Gitee,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitee => "gitee",
        }
    }
}

impl fmt::Display for RepoMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Download mirror for model weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelMirror {
    #[default]
    #[serde(rename = "hf-mirror")]
    HfMirror,
    #[serde(rename = "huggingface")]
    HuggingFace,
}

impl ModelMirror {
    pub fn all() -> &'static [ModelMirror] {
        &[Self::HfMirror, Self::HuggingFace]
    }

    /// Parses a mirror selector. Unknown selectors fall back to the default.
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim().to_lowercase().as_str() {
            "huggingface" => Self::HuggingFace,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HfMirror => "hf-mirror",
            Self::HuggingFace => "huggingface",
        }
    }

    /// Host serving the model files.
    pub fn host(&self) -> &'static str {
        match self {
            Self::HfMirror => "hf-mirror.com",
            Self::HuggingFace => "huggingface.co",
        }
    }
}

impl fmt::Display for ModelMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Outcomes and Status
// ============================================================================

/// Result of a successful install call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled,
    Installed,
}

impl InstallOutcome {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::AlreadyInstalled => "whisper.cpp is already installed",
            Self::Installed => "whisper.cpp installed",
        }
    }
}

/// Result of a successful build call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    AlreadyBuilt,
    BuiltAccelerated,
    BuiltGeneric,
}

impl BuildOutcome {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::AlreadyBuilt => "whisper.cpp is already built",
            Self::BuiltAccelerated => "Build complete (accelerated)",
            Self::BuiltGeneric => "Build complete (CPU)",
        }
    }
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The model is ready to use.
    Ready(String),
    /// The weights were copied but the Core ML encoder is still missing, so
    /// the model is not listed as installed yet.
    NeedsEncoder(String),
}

impl ImportOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Ready(name) | Self::NeedsEncoder(name) => name,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Ready(name) => format!("{name} imported"),
            Self::NeedsEncoder(name) => format!(
                "{name} imported, download its Core ML encoder (ggml-{name}-encoder.mlmodelc) before use"
            ),
        }
    }
}

/// One half of an asset acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetPart {
    /// The `ggml-<name>.bin` weights.
    Primary,
    /// The zipped `ggml-<name>-encoder.mlmodelc` package.
    Auxiliary,
}

/// Filesystem view of one model asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub name: String,
    pub has_primary: bool,
    pub has_auxiliary: bool,
    pub requires_auxiliary: bool,
}

impl AssetRecord {
    /// An asset counts as installed only when every required file is present.
    pub fn is_installed(&self) -> bool {
        self.has_primary && (!self.requires_auxiliary || self.has_auxiliary)
    }
}

/// Aggregate status of the engine, always derived from disk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemStatus {
    pub dependency_installed: bool,
    pub dependency_built: bool,
    pub installed_assets: Vec<String>,
    pub models_dir: PathBuf,
}

impl SystemStatus {
    pub fn has_asset(&self, name: &str) -> bool {
        self.installed_assets.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}
