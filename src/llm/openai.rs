use async_trait::async_trait;
use docchat_core::error::{Error, Result};
use docchat_core::llm::LanguageModel;
use docchat_core::models::ChatMessage;
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::embedding::OPENAI_BASE_URL;
use crate::http;

const LABEL: &str = "OpenAI API";

/// Chat model behind an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAIModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    label: String,
    temperature: f32,
    max_retries: u32,
    api_key: String,
}

impl OpenAIModel {
    pub fn new(config: &LlmConfig, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            label: format!("openai:{}", config.model),
            temperature: config.temperature,
            max_retries: config.max_retries,
            api_key,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": false,
        });

        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion");
        let response = http::send_with_retry(LABEL, self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        })
        .await
        .map_err(|f| f.into_error("generate", Error::ModelProvider))?;

        let payload = http::read_json(LABEL, response, Error::ModelProvider).await?;
        parse_completion(&payload)
    }
}

fn parse_completion(payload: &Value) -> Result<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            Error::ModelProvider("Invalid OpenAI response: missing message content".into())
        })
}
