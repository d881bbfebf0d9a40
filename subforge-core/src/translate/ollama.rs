//! Ollama `/api/generate` client.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{post_json, render_prompt, require, TranslateError, Translator};
use crate::config::ProviderConfig;

pub struct OllamaTranslator {
    client: reqwest::Client,
    api_url: String,
    model: String,
    prompt: String,
}

impl OllamaTranslator {
    pub fn from_config(provider: &ProviderConfig) -> Result<Self, TranslateError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_url: require(provider, &provider.api_url, "an API address")?
                .trim_end_matches('/')
                .to_string(),
            model: require(provider, &provider.model_name, "a model name")?.to_string(),
            prompt: provider.prompt.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.api_url)
    }
}

fn error_message(body: &Value) -> Option<String> {
    body.get("error").and_then(Value::as_str).map(str::to_string)
}

fn parse_reply(body: &Value) -> Result<String, TranslateError> {
    match body.get("response").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(error_message(body)
            .map(TranslateError::Provider)
            .unwrap_or(TranslateError::UnexpectedResponse("Ollama"))),
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslateError> {
        let prompt = render_prompt(&self.prompt, text, source_language, target_language)?;
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        tracing::debug!(model = %self.model, "Translating with Ollama");
        let reply = post_json(self.client.post(self.endpoint()), &body, error_message).await?;
        parse_reply(&reply)
    }
}
