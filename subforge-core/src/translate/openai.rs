//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{post_json, render_prompt, require, TranslateError, Translator};
use crate::config::ProviderConfig;

pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    prompt: String,
}

impl OpenAiTranslator {
    pub fn from_config(provider: &ProviderConfig) -> Result<Self, TranslateError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_url: require(provider, &provider.api_url, "an API address")?
                .trim_end_matches('/')
                .to_string(),
            api_key: provider.api_key.trim().to_string(),
            model: require(provider, &provider.model_name, "a model name")?.to_string(),
            prompt: provider.prompt.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url)
    }
}

fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_reply(body: &Value) -> Result<String, TranslateError> {
    match body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        Some(text) => Ok(text.trim().to_string()),
        None => Err(error_message(body)
            .map(TranslateError::Provider)
            .unwrap_or(TranslateError::UnexpectedResponse("chat completion"))),
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslateError> {
        let prompt = render_prompt(&self.prompt, text, source_language, target_language)?;
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        let mut request = self.client.post(self.endpoint());
        // Local OpenAI-compatible servers often run without a key
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        tracing::debug!(model = %self.model, endpoint = %self.endpoint(), "Translating with chat completion");
        let reply = post_json(request, &body, error_message).await?;
        parse_reply(&reply)
    }
}
