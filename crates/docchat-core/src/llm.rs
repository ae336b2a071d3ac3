//! Language-model provider trait.
//!
//! The same provider serves two callers: the answer composer and the
//! multi-query retriever's query expansion. Concrete clients live in the
//! `docchat` app crate.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ChatMessage;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider/model label used in logs (e.g. `"gemini:gemini-2.0-flash"`).
    fn name(&self) -> &str;

    /// Run one completion over `messages` and return the raw text output.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}
