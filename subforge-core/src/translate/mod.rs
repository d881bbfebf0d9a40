//! Subtitle translation clients.
//!
//! Each configured provider maps to a [`Translator`]. LLM-backed providers
//! render their prompt with the `${sourceLanguage}`, `${targetLanguage}` and
//! `${content}` placeholders before sending it.

mod ollama;
mod openai;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderKind, DEFAULT_PROMPT};
use crate::template::{render_template, TemplateError};

pub use ollama::OllamaTranslator;
pub use openai::OpenAiTranslator;

/// Per-request timeout. Local models can be slow on the first call.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Provider '{provider}' is missing {field}")]
    MissingField {
        provider: String,
        field: &'static str,
    },

    #[error("Provider '{0}' is not supported for translation")]
    Unsupported(String),

    #[error("Request failed: {0}")]
    Http(String),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Provider(String),

    #[error("Unexpected response from {0}")]
    UnexpectedResponse(&'static str),

    #[error("Invalid prompt: {0}")]
    Prompt(#[from] TemplateError),
}

impl From<reqwest::Error> for TranslateError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Translates one piece of subtitle text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslateError>;
}

/// Builds the client for a configured provider.
pub fn translator_for(provider: &ProviderConfig) -> Result<Box<dyn Translator>, TranslateError> {
    match provider.kind {
        ProviderKind::OpenAi => Ok(Box::new(OpenAiTranslator::from_config(provider)?)),
        ProviderKind::Local if provider.id == "ollama" => {
            Ok(Box::new(OllamaTranslator::from_config(provider)?))
        }
        ProviderKind::Local | ProviderKind::Api => {
            Err(TranslateError::Unsupported(provider.name.clone()))
        }
    }
}

/// Sentence sent by [`check_provider`].
pub const CHECK_SAMPLE: &str = "Hello, how are you?";

/// Translates [`CHECK_SAMPLE`] with `provider` to confirm it is configured
/// and reachable. Returns the translation.
pub async fn check_provider(
    provider: &ProviderConfig,
    source_language: &str,
    target_language: &str,
) -> Result<String, TranslateError> {
    let translator = translator_for(provider)?;
    translator
        .translate(CHECK_SAMPLE, source_language, target_language)
        .await
}

pub(crate) fn require<'a>(
    provider: &ProviderConfig,
    value: &'a str,
    field: &'static str,
) -> Result<&'a str, TranslateError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TranslateError::MissingField {
            provider: provider.name.clone(),
            field,
        });
    }
    Ok(value)
}

/// Renders an LLM prompt, falling back to the default when none is set.
pub(crate) fn render_prompt(
    prompt: &str,
    text: &str,
    source_language: &str,
    target_language: &str,
) -> Result<String, TemplateError> {
    let template = if prompt.trim().is_empty() {
        DEFAULT_PROMPT
    } else {
        prompt
    };
    render_template(
        template,
        &[
            ("sourceLanguage", source_language),
            ("targetLanguage", target_language),
            ("content", text),
        ],
    )
}

/// Posts `body` as JSON and returns the parsed JSON reply.
///
/// Non-success statuses become [`TranslateError::Status`] unless the body
/// carries a provider error message.
pub(crate) async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    error_message: fn(&serde_json::Value) -> Option<String>,
) -> Result<serde_json::Value, TranslateError> {
    let response = request.json(body).timeout(REQUEST_TIMEOUT).send().await?;

    let status = response.status();
    let text = response.text().await?;
    let parsed = serde_json::from_str::<serde_json::Value>(&text).ok();

    if !status.is_success() {
        if let Some(message) = parsed.as_ref().and_then(error_message) {
            return Err(TranslateError::Provider(message));
        }
        tracing::warn!(status = status.as_u16(), body = %text, "Translation request failed");
        return Err(TranslateError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    parsed.ok_or(TranslateError::UnexpectedResponse("translation server"))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_providers;

    fn provider(id: &str) -> ProviderConfig {
        default_providers().into_iter().find(|p| p.id == id).unwrap()
    }

    #[test]
    fn test_translator_for_supported_kinds() {
        assert!(translator_for(&provider("ollama")).is_ok());

        let openai = ProviderConfig::openai("DeepSeek", "https://api.deepseek.com", "sk", "deepseek-chat");
        assert!(translator_for(&openai).is_ok());
    }

    #[test]
    fn test_translator_for_unsupported_kinds() {
        for id in ["baidu", "volc", "deeplx"] {
            match translator_for(&provider(id)) {
                Err(TranslateError::Unsupported(name)) => assert!(!name.is_empty()),
                Err(other) => panic!("unexpected error for {id}: {other}"),
                Ok(_) => panic!("{id} should be unsupported"),
            }
        }
    }

    #[test]
    fn test_translator_for_reports_missing_fields() {
        let openai = ProviderConfig::openai("Empty", "", "sk", "model");
        match translator_for(&openai) {
            Err(TranslateError::MissingField { field, .. }) => assert_eq!(field, "an API address"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected missing field"),
        }
    }

    #[tokio::test]
    async fn test_check_provider_round_trip() {
        let (base, server) = test_server::serve_once(200, r#"{"response":"Bonjour"}"#).await;
        let mut ollama = provider("ollama");
        ollama.api_url = base;

        assert_eq!(check_provider(&ollama, "en", "fr").await.unwrap(), "Bonjour");
        assert!(server.await.unwrap().contains(CHECK_SAMPLE));
    }

    #[tokio::test]
    async fn test_check_provider_unsupported_makes_no_request() {
        match check_provider(&provider("baidu"), "en", "zh").await {
            Err(TranslateError::Unsupported(name)) => assert_eq!(name, "Baidu"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_render_prompt() {
        assert_eq!(
            render_prompt("${sourceLanguage}>${targetLanguage}: ${content}", "hello", "en", "zh").unwrap(),
            "en>zh: hello"
        );
        let fallback = render_prompt("  ", "hello", "en", "zh").unwrap();
        assert!(fallback.contains("from en to zh"));
        assert!(fallback.ends_with("hello"));
    }

    #[test]
    fn test_render_prompt_rejects_unknown_placeholder() {
        assert!(render_prompt("${fileName}", "hello", "en", "zh").is_err());
    }
}
