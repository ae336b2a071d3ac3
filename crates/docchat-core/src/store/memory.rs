//! In-memory [`VectorStore`] implementation for tests and single-process use.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`, each tagged with its
//! namespace and a monotonically increasing insertion sequence. Queries are
//! brute-force cosine similarity over the namespace's entries.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::{check_dims, cosine_similarity};
use crate::error::{Error, Result};
use crate::models::{Chunk, EmbeddedChunk, ScoredChunk};

use super::{rank_hits, VectorStore};

struct StoredVector {
    seq: u64,
    namespace: String,
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    vectors: Vec<StoredVector>,
}

/// In-memory vector store.
pub struct InMemoryStore {
    dims: usize,
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Total entries across all namespaces.
    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.vectors.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::VectorStore("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn ensure_index(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, namespace: &str, items: &[EmbeddedChunk]) -> Result<()> {
        for item in items {
            check_dims(self.dims, &item.vector)?;
        }
        let mut inner = self.inner.write().map_err(poisoned)?;
        for item in items {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.vectors.push(StoredVector {
                seq,
                namespace: namespace.to_string(),
                chunk: item.chunk.clone(),
                vector: item.vector.clone(),
            });
        }
        Ok(())
    }

    async fn query(&self, namespace: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        check_dims(self.dims, vector)?;
        let inner = self.inner.read().map_err(poisoned)?;
        let hits: Vec<(u64, ScoredChunk)> = inner
            .vectors
            .iter()
            .filter(|sv| sv.namespace == namespace)
            .map(|sv| {
                (
                    sv.seq,
                    ScoredChunk {
                        chunk_id: sv.chunk.id.clone(),
                        namespace: sv.namespace.clone(),
                        chunk_index: sv.chunk.chunk_index,
                        text: sv.chunk.text.clone(),
                        score: cosine_similarity(vector, &sv.vector),
                    },
                )
            })
            .collect();
        Ok(rank_hits(hits, k))
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .vectors
            .iter()
            .filter(|sv| sv.namespace == namespace)
            .count())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.vectors.retain(|sv| sv.namespace != namespace);
        Ok(())
    }
}
