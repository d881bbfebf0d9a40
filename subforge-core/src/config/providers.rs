//! Translation provider configuration.
//!
//! Providers are stored one row per entry in the `translation_providers`
//! table, each row holding the provider as JSON. The first load seeds the
//! built-in providers.

use serde::{Deserialize, Serialize};

use crate::db::Database;

/// Default prompt for LLM-backed providers.
pub const DEFAULT_PROMPT: &str = "Translate the following subtitle from ${sourceLanguage} to ${targetLanguage}. Reply with the translation only.\n\n${content}";

/// Kind of translation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted vendor API authenticated with key and secret.
    Api,
    /// Service running on the user's machine.
    Local,
    /// OpenAI-compatible chat completion endpoint.
    OpenAi,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api => write!(f, "API"),
            Self::Local => write!(f, "Local"),
            Self::OpenAi => write!(f, "OpenAI-compatible"),
        }
    }
}

/// One configured translation provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub prompt: String,
}

impl ProviderConfig {
    fn builtin(id: &str, name: &str, kind: ProviderKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            api_key: String::new(),
            api_secret: String::new(),
            api_url: String::new(),
            model_name: String::new(),
            prompt: String::new(),
        }
    }

    /// A new OpenAI-compatible provider. The id is the lowercased name.
    pub fn openai(name: &str, api_url: &str, api_key: &str, model_name: &str) -> Self {
        Self {
            id: name.trim().to_lowercase(),
            name: name.trim().to_string(),
            kind: ProviderKind::OpenAi,
            api_key: api_key.to_string(),
            api_secret: String::new(),
            api_url: api_url.trim().to_string(),
            model_name: model_name.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    /// Whether the user can remove this provider.
    pub fn removable(&self) -> bool {
        self.kind == ProviderKind::OpenAi
    }
}

/// Built-in providers seeded on first use.
pub fn default_providers() -> Vec<ProviderConfig> {
    let deeplx = ProviderConfig {
        api_url: "http://localhost:1188/translate".to_string(),
        ..ProviderConfig::builtin("deeplx", "DeepLX", ProviderKind::Local)
    };
    let ollama = ProviderConfig {
        api_url: "http://localhost:11434".to_string(),
        model_name: "llama3".to_string(),
        prompt: DEFAULT_PROMPT.to_string(),
        ..ProviderConfig::builtin("ollama", "Ollama", ProviderKind::Local)
    };

    vec![
        ProviderConfig::builtin("baidu", "Baidu", ProviderKind::Api),
        ProviderConfig::builtin("volc", "Volcengine", ProviderKind::Api),
        deeplx,
        ollama,
    ]
}

/// Errors from editing the provider list.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider name must not be empty")]
    EmptyName,

    #[error("A provider with id '{0}' already exists")]
    Duplicate(String),

    #[error("Provider '{0}' not found")]
    NotFound(String),

    #[error("Built-in provider '{0}' cannot be removed")]
    BuiltIn(String),
}

/// Ordered list of providers, loaded from and saved to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Providers {
    entries: Vec<ProviderConfig>,
}

impl Default for Providers {
    fn default() -> Self {
        Self {
            entries: default_providers(),
        }
    }
}

impl Providers {
    /// Load providers, seeding the built-ins when nothing is stored.
    ///
    /// Rows that fail to parse are skipped with a warning.
    pub fn load(db: &Database) -> Self {
        let rows = match db.list_providers() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read providers, using defaults");
                return Self::default();
            }
        };

        if rows.is_empty() {
            let providers = Self::default();
            if let Err(e) = providers.save(db) {
                tracing::warn!(error = %e, "Failed to seed default providers");
            }
            return providers;
        }

        let entries = rows
            .into_iter()
            .filter_map(|(id, json)| match serde_json::from_str::<ProviderConfig>(&json) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!(provider = %id, error = %e, "Skipping unreadable provider");
                    None
                }
            })
            .collect();

        Self { entries }
    }

    /// Save providers to the database, replacing what is stored.
    pub fn save(&self, db: &Database) -> anyhow::Result<()> {
        let rows = self
            .entries
            .iter()
            .map(|p| Ok((p.id.clone(), serde_json::to_string(p)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        db.replace_providers(&rows)?;
        Ok(())
    }

    pub fn all(&self) -> &[ProviderConfig] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.entries.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ProviderConfig> {
        self.entries.iter_mut().find(|p| p.id == id)
    }

    pub fn of_kind(&self, kind: ProviderKind) -> impl Iterator<Item = &ProviderConfig> {
        self.entries.iter().filter(move |p| p.kind == kind)
    }

    /// Append a provider. Ids must be unique.
    pub fn add(&mut self, provider: ProviderConfig) -> Result<(), ProviderError> {
        if provider.id.is_empty() {
            return Err(ProviderError::EmptyName);
        }
        if self.get(&provider.id).is_some() {
            return Err(ProviderError::Duplicate(provider.id));
        }
        self.entries.push(provider);
        Ok(())
    }

    /// Remove a user-added provider.
    pub fn remove(&mut self, id: &str) -> Result<ProviderConfig, ProviderError> {
        let index = self
            .entries
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
        if !self.entries[index].removable() {
            return Err(ProviderError::BuiltIn(id.to_string()));
        }
        Ok(self.entries.remove(index))
    }
}
