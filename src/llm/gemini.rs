use async_trait::async_trait;
use docchat_core::error::{Error, Result};
use docchat_core::llm::LanguageModel;
use docchat_core::models::{ChatMessage, MessageRole};
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::embedding::GEMINI_BASE_URL;
use crate::http;

const LABEL: &str = "Gemini API";

/// Chat model served by the Google Generative Language API.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    label: String,
    temperature: f32,
    max_retries: u32,
    api_key: String,
}

impl GeminiModel {
    pub fn new(config: &LlmConfig, api_key: String) -> anyhow::Result<Self> {
        let model = config.model.trim_start_matches("models/").to_string();
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            label: format!("gemini:{}", model),
            model,
            temperature: config.temperature,
            max_retries: config.max_retries,
            api_key,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = request_body(messages, self.temperature);

        tracing::debug!(model = %self.model, messages = messages.len(), "generateContent");
        let response = http::send_with_retry(LABEL, self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await
        .map_err(|f| f.into_error("generate", Error::ModelProvider))?;

        let json = http::read_json(LABEL, response, Error::ModelProvider).await?;
        parse_candidate_text(&json)
    }
}

/// System messages become `systemInstruction`; the rest map to `user` /
/// `model` turns.
fn request_body(messages: &[ChatMessage], temperature: f32) -> Value {
    let system: Vec<Value> = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| json!({ "text": m.content }))
        .collect();

    let contents: Vec<Value> = messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                MessageRole::System => return None,
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            Some(json!({ "role": role, "parts": [{ "text": m.content }] }))
        })
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": { "temperature": temperature },
    });
    if !system.is_empty() {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("systemInstruction".to_string(), json!({ "parts": system }));
        }
    }
    body
}

fn parse_candidate_text(json: &Value) -> Result<String> {
    let Some(parts) = json["candidates"][0]["content"]["parts"].as_array() else {
        let reason = json["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("no candidates returned");
        return Err(Error::ModelProvider(format!(
            "Gemini returned no answer: {}",
            reason
        )));
    };
    Ok(parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .concat())
}
