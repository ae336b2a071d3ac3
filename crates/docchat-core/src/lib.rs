//! # docchat core
//!
//! Runtime-agnostic logic for docchat: data models, the error taxonomy,
//! chunking, the vector store abstraction, provider traits, multi-query
//! retrieval, and answer composition.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or HTTP clients.
//! Every external capability (embedding model, language model, vector
//! index, text extraction) is reached through a trait so the application
//! crate, or a test, can plug in its own implementation.

pub mod chunk;
pub mod compose;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod retrieve;
pub mod store;

pub use error::{Error, Result};
