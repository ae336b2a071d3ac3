use async_trait::async_trait;
use docchat_core::embedding::Embedder;
use docchat_core::error::{Error, Result};
use serde_json::json;

use super::{check_response, parse_vector};
use crate::config::EmbeddingConfig;
use crate::http;

const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

const LABEL: &str = "Ollama API";

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured Ollama URL (default: `http://localhost:11434`).
/// Requires Ollama to be running with an embedding model pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
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
        let url = format!("{}/api/embed", self.url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let response = http::send_with_retry(LABEL, self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await
        .map_err(|f| f.into_error("embed", Error::EmbeddingProvider))?;

        let json = http::read_json(LABEL, response, Error::EmbeddingProvider).await?;
        check_response(LABEL, self.dims, texts.len(), parse_ollama_response(&json)?)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::EmbeddingProvider("Invalid Ollama response: missing embeddings array".into())
        })?;

    embeddings.iter().map(|e| parse_vector("Ollama", e)).collect()
}
