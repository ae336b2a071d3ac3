use async_trait::async_trait;
use docchat_core::embedding::Embedder;
use docchat_core::error::{Error, Result};
use serde_json::json;

use super::{check_response, parse_vector};
use crate::config::EmbeddingConfig;
use crate::http;

pub(crate) const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const LABEL: &str = "OpenAI API";

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {base}/embeddings` with the configured model. Any
/// OpenAI-compatible gateway works through `embedding.url`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    /// Model name (e.g. `"text-embedding-3-small"`).
    model: String,
    dims: usize,
    max_retries: u32,
    api_key: String,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
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
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        tracing::debug!(model = %self.model, count = texts.len(), "embedding batch");
        let response = http::send_with_retry(LABEL, self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        })
        .await
        .map_err(|f| f.into_error("embed", Error::EmbeddingProvider))?;

        let json = http::read_json(LABEL, response, Error::EmbeddingProvider).await?;
        check_response(LABEL, self.dims, texts.len(), parse_openai_response(&json)?)
    }
}

/// Extract the `data[].embedding` arrays, ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            Error::EmbeddingProvider("Invalid OpenAI response: missing data array".into())
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item.get("embedding").ok_or_else(|| {
            Error::EmbeddingProvider("Invalid OpenAI response: missing embedding".into())
        })?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, parse_vector("OpenAI", embedding)?));
    }

    // Sort by index to ensure order matches input
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
