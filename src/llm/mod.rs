//! Language-model provider implementations.
//!
//! - **[`GeminiModel`]**: Google Generative Language `generateContent`.
//! - **[`OpenAIModel`]**: OpenAI-compatible `POST /chat/completions`.
//!
//! Both are single-shot, non-streaming calls returning the model's text.
//! [`create_model`] builds the one named by the configuration.

mod gemini;
mod openai;

pub use gemini::GeminiModel;
pub use openai::OpenAIModel;

use std::sync::Arc;

use anyhow::Result;
use docchat_core::llm::LanguageModel;

use crate::config::LlmConfig;

pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiModel::new(
            config,
            crate::config::api_key("GOOGLE_API_KEY")?,
        )?)),
        "openai" => Ok(Arc::new(OpenAIModel::new(
            config,
            crate::config::api_key("OPENAI_API_KEY")?,
        )?)),
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}
