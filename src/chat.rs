//! Chat entry point.
//!
//! [`ChatOrchestrator::handle`] validates a request, picks the answer mode
//! and threads the conversation history through:
//!
//! - `document_id` present and non-blank → multi-query retrieval over that
//!   document's namespace, then a RAG answer.
//! - otherwise → a general conversational answer.
//!
//! Provider failures anywhere on the path collapse into
//! [`ChatError::Processing`]. Its detail is logged here and is not meant
//! for clients.

use std::sync::Arc;

use docchat_core::compose::{AnswerComposer, AnswerMode};
use docchat_core::embedding::Embedder;
use docchat_core::llm::LanguageModel;
use docchat_core::models::{parse_history, HistoryEntry};
use docchat_core::retrieve::{MultiQueryRetriever, RetrievalParams};
use docchat_core::store::VectorStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub document_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            document_id: None,
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// The namespace to search, if any. Blank ids select general mode.
    pub fn namespace(&self) -> Option<&str> {
        self.document_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("an error occurred during chat processing")]
    Processing { detail: String },
}

pub struct ChatOrchestrator {
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    params: RetrievalParams,
}

impl ChatOrchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            model,
            embedder,
            store,
            params,
        }
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }
        let namespace = request.namespace().map(str::to_string);
        let history = parse_history(request.history)
            .map_err(|e| ChatError::InvalidRequest(e.to_string()))?;
        let question = request.message;

        let composer = AnswerComposer::new(self.model.as_ref());
        let answer = match namespace.as_deref() {
            Some(namespace) => {
                let retriever = MultiQueryRetriever::new(
                    self.model.as_ref(),
                    self.embedder.as_ref(),
                    self.store.as_ref(),
                    namespace,
                    self.params,
                );
                async {
                    let chunks = retriever.retrieve(&question).await?;
                    tracing::debug!(namespace, chunks = chunks.len(), "answering from context");
                    composer
                        .answer(AnswerMode::Rag(&chunks), &history, &question)
                        .await
                }
                .await
            }
            None => {
                composer
                    .answer(AnswerMode::General, &history, &question)
                    .await
            }
        };

        answer.map(|reply| ChatResponse { reply }).map_err(|e| {
            tracing::error!(error = %e, namespace = ?namespace, "chat processing failed");
            ChatError::Processing {
                detail: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_document_id_selects_general_mode() {
        assert_eq!(ChatRequest::new("hi").namespace(), None);
        assert_eq!(ChatRequest::new("hi").with_document("  ").namespace(), None);
        assert_eq!(
            ChatRequest::new("hi").with_document("a.pdf_10").namespace(),
            Some("a.pdf_10")
        );
        // Ids are matched exactly as issued at upload
        assert_eq!(
            ChatRequest::new("hi")
                .with_document(" notes.txt_5")
                .namespace(),
            Some(" notes.txt_5")
        );
    }

    #[test]
    fn test_request_wire_format() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"message":"Summarize","history":[{"role":"user","content":"Hello"}],"document_id":"doc_1"}"#,
        )
        .unwrap();
        assert_eq!(req.history.len(), 1);
        assert_eq!(req.namespace(), Some("doc_1"));

        let minimal: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(minimal.history.is_empty());
        assert!(minimal.document_id.is_none());
    }

    #[test]
    fn test_processing_error_hides_detail() {
        let err = ChatError::Processing {
            detail: "GOOGLE quota exceeded for key abc".to_string(),
        };
        assert!(!err.to_string().contains("abc"));
    }
}
