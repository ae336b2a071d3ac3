//! Core data models used throughout docchat.
//!
//! These types represent the uploads, chunks, vector hits, and chat turns
//! that flow through the ingestion and retrieval pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Namespace key for one uploaded document: `"<filename>_<size>"`.
///
/// Pure function of the filename and byte size, so re-uploading the same
/// file targets the same namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn from_upload(filename: &str, size: u64) -> Self {
        Self(format!("{}_{}", filename, size))
    }

    /// Wrap an identifier received from a client.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A chunk of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk paired with its embedding, ready for insertion.
///
/// The namespace tag is the chunk's `document_id`.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn namespace(&self) -> &str {
        &self.chunk.document_id
    }
}

/// A vector query hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub namespace: String,
    pub chunk_index: i64,
    pub text: String,
    /// Cosine similarity against the query vector.
    pub score: f32,
}

/// One history entry as sent by a client: `{ "role": ..., "content": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A validated conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationTurn {
    User(String),
    Assistant(String),
}

impl ConversationTurn {
    pub fn content(&self) -> &str {
        match self {
            ConversationTurn::User(c) | ConversationTurn::Assistant(c) => c,
        }
    }
}

impl TryFrom<HistoryEntry> for ConversationTurn {
    type Error = Error;

    fn try_from(entry: HistoryEntry) -> Result<Self> {
        match entry.role.as_str() {
            "user" => Ok(ConversationTurn::User(entry.content)),
            "assistant" => Ok(ConversationTurn::Assistant(entry.content)),
            other => Err(Error::InvalidRequest(format!(
                "unrecognized history role '{}': expected 'user' or 'assistant'",
                other
            ))),
        }
    }
}

/// Validate client history in order, failing on the first bad role.
pub fn parse_history(entries: Vec<HistoryEntry>) -> Result<Vec<ConversationTurn>> {
    entries.into_iter().map(ConversationTurn::try_from).collect()
}

/// Role of a message sent to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A prompt message handed to a [`LanguageModel`](crate::llm::LanguageModel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        match turn {
            ConversationTurn::User(c) => ChatMessage::user(c.clone()),
            ConversationTurn::Assistant(c) => ChatMessage::assistant(c.clone()),
        }
    }
}
