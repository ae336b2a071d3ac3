//! Vector store backends.
//!
//! | Provider | Type | Notes |
//! |----------|------|-------|
//! | `memory` | [`InMemoryStore`] | process-local, lost on exit |
//! | `sqlite` | [`SqliteStore`] | brute-force cosine over BLOB vectors |
//! | `pinecone` | [`PineconeStore`] | serverless index over REST |

pub mod pinecone;
pub mod sqlite;

pub use docchat_core::store::memory::InMemoryStore;
pub use pinecone::PineconeStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use anyhow::Result;
use docchat_core::store::VectorStore;

use crate::config::Config;

/// Build the configured store. Does not touch the index; callers run
/// [`VectorStore::ensure_index`] before first use.
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let dims = config.embedding.dims;
    let store: Arc<dyn VectorStore> = match config.vector_store.provider.as_str() {
        "memory" => Arc::new(InMemoryStore::new(dims)),
        "sqlite" => Arc::new(SqliteStore::open(&config.vector_store.path, dims).await?),
        "pinecone" => Arc::new(PineconeStore::new(
            &config.vector_store,
            dims,
            crate::config::api_key("PINECONE_API_KEY")?,
        )?),
        other => anyhow::bail!("Unknown vector store provider: {}", other),
    };
    Ok(store)
}
