//! Application settings for SubForge.
//!
//! Settings are persisted to the SQLite database as JSON.

use serde::{Deserialize, Serialize};

use crate::engine::{ModelMirror, RepoMirror};

// =============================================================================
// Theme Selection
// =============================================================================

/// App theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Theme {
    /// Dark theme (easier on the eyes)
    #[default]
    Dark,
    /// Light theme
    Light,
}

impl Theme {
    /// Get all available themes.
    pub fn all() -> &'static [Theme] {
        &[Self::Dark, Self::Light]
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dark => write!(f, "Dark"),
            Self::Light => write!(f, "Light"),
        }
    }
}

// =============================================================================
// Subtitle Output
// =============================================================================

/// How a generated subtitle file is named, or whether it is kept at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SrtSaveOption {
    /// Written as `<name>_temp` and removed after the task.
    #[default]
    NoSave,
    /// Same name as the media file.
    FileName,
    /// `<name>.<language>`
    FileNameWithLang,
    /// Rendered from a user template.
    Custom,
}

impl SrtSaveOption {
    pub fn all() -> &'static [SrtSaveOption] {
        &[
            Self::NoSave,
            Self::FileName,
            Self::FileNameWithLang,
            Self::Custom,
        ]
    }
}

impl std::fmt::Display for SrtSaveOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSave => write!(f, "Don't save"),
            Self::FileName => write!(f, "File name"),
            Self::FileNameWithLang => write!(f, "File name + language"),
            Self::Custom => write!(f, "Custom"),
        }
    }
}

/// What goes into the translated subtitle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TranslateContent {
    #[default]
    OnlyTranslate,
    SourceAndTranslate,
}

impl TranslateContent {
    pub fn all() -> &'static [TranslateContent] {
        &[Self::OnlyTranslate, Self::SourceAndTranslate]
    }
}

impl std::fmt::Display for TranslateContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnlyTranslate => write!(f, "Translation only"),
            Self::SourceAndTranslate => write!(f, "Source + translation"),
        }
    }
}

// =============================================================================
// Defaults
// =============================================================================

/// Default whisper model.
pub const DEFAULT_MODEL: &str = "tiny";

/// Default translation provider id.
pub const DEFAULT_PROVIDER: &str = "baidu";

/// Upper bound for parallel subtitle tasks.
pub const MAX_CONCURRENT_TASKS: u32 = 8;

const DEFAULT_SOURCE_LANGUAGE: &str = "en";
const DEFAULT_TARGET_LANGUAGE: &str = "zh";
const DEFAULT_SOURCE_TEMPLATE: &str = "${fileName}.${sourceLanguage}";
const DEFAULT_TARGET_TEMPLATE: &str = "${fileName}.${targetLanguage}";

// =============================================================================
// Application Settings
// =============================================================================

/// Application settings - persisted to database as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Spoken language of the media.
    pub source_language: String,

    /// Language subtitles are translated into.
    pub target_language: String,

    /// Whisper model used for transcription (e.g. "tiny", "base.en").
    pub model: String,

    /// Id of the selected translation provider.
    pub translate_provider: String,

    pub translate_content: TranslateContent,

    /// Subtitle tasks run in parallel, 1 to 8.
    pub max_concurrent_tasks: u32,

    pub source_srt_save_option: SrtSaveOption,
    pub target_srt_save_option: SrtSaveOption,

    /// Template used when the source option is `Custom`.
    pub custom_source_srt_file_name: String,

    /// Template used when the target option is `Custom`.
    pub custom_target_srt_file_name: String,

    /// Where whisper.cpp is cloned from.
    pub repo_mirror: RepoMirror,

    /// Where model weights are downloaded from.
    pub model_mirror: ModelMirror,

    /// UI theme.
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_language: DEFAULT_SOURCE_LANGUAGE.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            translate_provider: DEFAULT_PROVIDER.to_string(),
            translate_content: TranslateContent::default(),
            max_concurrent_tasks: 1,
            source_srt_save_option: SrtSaveOption::NoSave,
            target_srt_save_option: SrtSaveOption::FileNameWithLang,
            custom_source_srt_file_name: DEFAULT_SOURCE_TEMPLATE.to_string(),
            custom_target_srt_file_name: DEFAULT_TARGET_TEMPLATE.to_string(),
            repo_mirror: RepoMirror::default(),
            model_mirror: ModelMirror::default(),
            theme: Theme::default(),
        }
    }
}

impl Settings {
    /// Load settings from database, using defaults for missing values.
    ///
    /// If settings don't exist or can't be parsed, returns defaults.
    pub fn load(db: &crate::db::Database) -> Self {
        let mut settings = Self::default();

        if let Ok(Some(json)) = db.get_setting("settings") {
            match serde_json::from_str::<Settings>(&json) {
                Ok(loaded) => settings = loaded,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse settings, using defaults");
                }
            }
        }

        settings.validate();
        settings
    }

    /// Save settings to database.
    pub fn save(&self, db: &crate::db::Database) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        db.set_setting("settings", &json)?;
        Ok(())
    }

    /// Validate and clamp settings to valid ranges.
    pub fn validate(&mut self) {
        self.max_concurrent_tasks = self.max_concurrent_tasks.clamp(1, MAX_CONCURRENT_TASKS);

        // Whisper model names are lowercase on disk
        self.model = self.model.trim().to_lowercase();

        repair(&mut self.model, DEFAULT_MODEL);
        repair(&mut self.source_language, DEFAULT_SOURCE_LANGUAGE);
        repair(&mut self.target_language, DEFAULT_TARGET_LANGUAGE);
        repair(&mut self.translate_provider, DEFAULT_PROVIDER);
        repair(&mut self.custom_source_srt_file_name, DEFAULT_SOURCE_TEMPLATE);
        repair(&mut self.custom_target_srt_file_name, DEFAULT_TARGET_TEMPLATE);
    }
}

fn repair(field: &mut String, fallback: &str) {
    if field.trim().is_empty() {
        *field = fallback.to_string();
    }
}

// =============================================================================
// Tests
// =============================================================================
