use async_trait::async_trait;
use docchat_core::embedding::Embedder;
use docchat_core::error::{Error, Result};
use serde_json::json;

use super::{check_response, parse_vector};
use crate::config::EmbeddingConfig;
use crate::http;

pub(crate) const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const LABEL: &str = "Gemini embeddings";

/// Embedding provider using the Google Generative Language API.
///
/// Calls `POST {base}/{model}:batchEmbedContents`, one request per batch.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    /// Fully qualified model name (e.g. `"models/embedding-001"`).
    model: String,
    dims: usize,
    max_retries: u32,
    api_key: String,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: qualified_model(&config.model),
            dims: config.dims,
            max_retries: config.max_retries,
            api_key,
        })
    }
}

/// Gemini addresses models as `models/<name>`.
pub(crate) fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/{}:batchEmbedContents", self.base_url, self.model);
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": t }] },
                })
            })
            .collect();
        let body = json!({ "requests": requests });

        tracing::debug!(model = %self.model, count = texts.len(), "embedding batch");
        let response = http::send_with_retry(LABEL, self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await
        .map_err(|f| f.into_error("embed", Error::EmbeddingProvider))?;

        let json = http::read_json(LABEL, response, Error::EmbeddingProvider).await?;
        check_response(LABEL, self.dims, texts.len(), parse_gemini_response(&json)?)
    }
}

/// Extract `embeddings[].values` in order.
fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::EmbeddingProvider("Invalid Gemini response: missing embeddings array".into())
        })?;

    embeddings
        .iter()
        .map(|item| {
            let values = item.get("values").ok_or_else(|| {
                Error::EmbeddingProvider("Invalid Gemini response: missing values".into())
            })?;
            parse_vector("Gemini", values)
        })
        .collect()
}
