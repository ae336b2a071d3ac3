//! # docchat
//!
//! Upload documents, then chat with them.
//!
//! Uploaded files are extracted, split into overlapping chunks, embedded,
//! and stored in a per-document vector namespace by a background job.
//! Chat requests that name a document are answered from that document's
//! chunks (retrieved with multi-query expansion); requests without one get
//! a general conversational answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │  Upload  │──▶│  IngestionPipeline   │──▶│ VectorStore  │
//! │ (HTTP /  │   │ extract→chunk→embed  │   │ memory/sqlite│
//! │   CLI)   │   └──────────────────────┘   │  /pinecone   │
//! └──────────┘                              └──────┬───────┘
//!                                                  │
//! ┌──────────┐   ┌──────────────────────┐          │
//! │   Chat   │──▶│  ChatOrchestrator    │◀─────────┘
//! │ (HTTP /  │   │ retrieve → compose   │──▶ LanguageModel
//! │   CLI)   │   └──────────────────────┘
//! └──────────┘
//! ```
//!
//! Runtime-agnostic pieces (chunker, retriever, composer, traits) live in
//! the `docchat-core` crate; this crate adds configuration, provider
//! clients, storage backends, and the HTTP/CLI surface.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`embedding`] | Gemini, OpenAI and Ollama embedders |
//! | [`llm`] | Gemini and OpenAI chat models |
//! | [`store`] | SQLite and Pinecone vector stores |
//! | [`ingest`] | Background ingestion pipeline and status tracking |
//! | [`chat`] | Chat orchestration |
//! | [`app`] | Provider wiring |
//! | [`server`] | HTTP API |

pub mod app;
pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod store;
