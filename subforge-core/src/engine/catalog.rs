//! Static catalog of the engine source and the downloadable models.
//!
//! The whisper.cpp revision is pinned; models are the standard ggml
//! conversions published under `ggerganov/whisper.cpp` on Hugging Face.

use super::types::{ModelMirror, RepoMirror};

// ============================================================================
// Engine Source
// ============================================================================

/// Pinned whisper.cpp release tag.
pub const ENGINE_REVISION: &str = "v1.7.2";

/// Returns the clone URL for a repository mirror.
pub fn repo_url(mirror: RepoMirror) -> &'static str {
    match mirror {
        RepoMirror::Github => "https://github.com/ggerganov/whisper.cpp",
        RepoMirror::Gitee => "https://gitee.com/mirrors/whisper.cpp.git",
    }
}

// ============================================================================
// Model Catalog
// ============================================================================

/// A downloadable whisper model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDefinition {
    /// Asset name used in file names (`ggml-<name>.bin`).
    pub name: &'static str,
    /// Approximate size of the weights in megabytes.
    pub size_mb: u32,
    /// English-only model.
    pub english_only: bool,
}

impl ModelDefinition {
    const fn new(name: &'static str, size_mb: u32, english_only: bool) -> Self {
        Self {
            name,
            size_mb,
            english_only,
        }
    }
}

const MODELS: &[ModelDefinition] = &[
    ModelDefinition::new("tiny", 75, false),
    ModelDefinition::new("tiny.en", 75, true),
    ModelDefinition::new("base", 142, false),
    ModelDefinition::new("base.en", 142, true),
    ModelDefinition::new("small", 466, false),
    ModelDefinition::new("small.en", 466, true),
    ModelDefinition::new("medium", 1500, false),
    ModelDefinition::new("medium.en", 1500, true),
    ModelDefinition::new("large-v1", 2900, false),
    ModelDefinition::new("large-v2", 2900, false),
    ModelDefinition::new("large-v3", 2900, false),
    ModelDefinition::new("large-v3-turbo", 1500, false),
];

/// Returns every model in display order.
pub fn get_all_model_definitions() -> &'static [ModelDefinition] {
    MODELS
}

/// Looks up a model by name (case-insensitive).
pub fn get_model_definition(name: &str) -> Option<&'static ModelDefinition> {
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

fn model_base_url(mirror: ModelMirror) -> String {
    format!(
        "https://{}/ggerganov/whisper.cpp/resolve/main",
        mirror.host()
    )
}

/// URL of the `ggml-<asset>.bin` weights.
pub fn primary_model_url(asset: &str, mirror: ModelMirror) -> String {
    format!("{}/ggml-{asset}.bin", model_base_url(mirror))
}

/// URL of the zipped Core ML encoder package.
pub fn auxiliary_model_url(asset: &str, mirror: ModelMirror) -> String {
    format!(
        "{}/ggml-{asset}-encoder.mlmodelc.zip",
        model_base_url(mirror)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_urls() {
        assert!(repo_url(RepoMirror::Github).starts_with("https://github.com/"));
        assert!(repo_url(RepoMirror::Gitee).starts_with("https://gitee.com/"));
    }

    #[test]
    fn test_model_catalog_lookup() {
        let tiny = get_model_definition("tiny").unwrap();
        assert_eq!(tiny.size_mb, 75);
        assert!(!tiny.english_only);
        assert!(get_model_definition("TINY.EN").unwrap().english_only);
        assert!(get_model_definition("gigantic").is_none());
    }

    #[test]
    fn test_model_names_are_unique() {
        let all = get_all_model_definitions();
        for (i, a) in all.iter().enumerate() {
            assert!(all[i + 1..].iter().all(|b| b.name != a.name), "{}", a.name);
        }
    }

    #[test]
    fn test_model_urls_per_mirror() {
        assert_eq!(
            primary_model_url("tiny", ModelMirror::HuggingFace),
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin"
        );
        assert_eq!(
            auxiliary_model_url("base", ModelMirror::HfMirror),
            "https://hf-mirror.com/ggerganov/whisper.cpp/resolve/main/ggml-base-encoder.mlmodelc.zip"
        );
    }
}
