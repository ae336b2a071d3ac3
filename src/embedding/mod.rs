//! Embedding provider implementations.
//!
//! Concrete [`Embedder`]s for the hosted and local backends:
//! - **[`GeminiEmbedder`]**: Google Generative Language `batchEmbedContents`.
//! - **[`OpenAIEmbedder`]**: OpenAI (or compatible) `POST /v1/embeddings`.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//!
//! Use [`create_embedder`] to build the one named by the configuration.
//! Every provider checks that the response holds one vector per input and
//! that each vector has the configured dimension.
//!
//! Transient failures follow the shared retry policy in [`crate::http`].

mod gemini;
mod ollama;
mod openai;

pub use gemini::GeminiEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;

pub(crate) use gemini::GEMINI_BASE_URL;
pub(crate) use openai::OPENAI_BASE_URL;

use std::sync::Arc;

use anyhow::Result;
use docchat_core::embedding::{check_dims, Embedder};
use docchat_core::error::Error;

use crate::config::EmbeddingConfig;

/// Build the embedding provider selected by `config.provider`.
///
/// # Errors
///
/// Fails when the provider's API key is missing from the environment or the
/// provider name is unknown.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(
            config,
            crate::config::api_key("GOOGLE_API_KEY")?,
        )?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(
            config,
            crate::config::api_key("OPENAI_API_KEY")?,
        )?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

/// Validate a decoded response against the request.
fn check_response(
    label: &str,
    dims: usize,
    expected_count: usize,
    vectors: Vec<Vec<f32>>,
) -> docchat_core::Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(Error::EmbeddingProvider(format!(
            "{} returned {} embeddings for {} inputs",
            label,
            vectors.len(),
            expected_count
        )));
    }
    for v in &vectors {
        check_dims(dims, v)?;
    }
    Ok(vectors)
}

/// Parse a JSON array of numbers into a vector.
fn parse_vector(label: &str, value: &serde_json::Value) -> docchat_core::Result<Vec<f32>> {
    let values = value.as_array().ok_or_else(|| {
        Error::EmbeddingProvider(format!("Invalid {} response: embedding is not an array", label))
    })?;
    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                Error::EmbeddingProvider(format!("Invalid {} response: non-numeric value", label))
            })
        })
        .collect()
}
