//! Vector storage abstraction for docchat.
//!
//! The [`VectorStore`] trait is the namespace-partitioned ANN index the
//! ingestion pipeline writes to and the retriever reads from. Every
//! operation is scoped to one namespace (one uploaded document), and an
//! implementation must never return entries from a namespace other than
//! the one queried.
//!
//! Implementations must be `Send + Sync`; the pipeline and chat handlers
//! share a single store across tasks without extra locking.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{EmbeddedChunk, ScoredChunk};

/// Similarity metric of the index. Only cosine is supported.
pub const METRIC_COSINE: &str = "cosine";

/// Abstract namespace-partitioned vector index.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_index`](VectorStore::ensure_index) | Create the backing index if absent |
/// | [`insert`](VectorStore::insert) | Append embedded chunks to a namespace |
/// | [`query`](VectorStore::query) | Top-k cosine search within a namespace |
/// | [`count`](VectorStore::count) | Number of entries in a namespace |
/// | [`delete_namespace`](VectorStore::delete_namespace) | Drop a namespace's entries |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend label used in logs (e.g. `"sqlite"`).
    fn name(&self) -> &str;

    /// The fixed embedding dimension of this index.
    fn dims(&self) -> usize;

    /// Create the index with `dims()` and cosine metric if it does not
    /// exist. An existing index with a different dimension is a
    /// configuration error.
    async fn ensure_index(&self) -> Result<()>;

    /// Append every item to `namespace`.
    ///
    /// Vectors of the wrong dimension are rejected before anything is
    /// written. A failure after some entries were written is reported as
    /// [`Error::IndeterminateWrite`](crate::error::Error::IndeterminateWrite).
    async fn insert(&self, namespace: &str, items: &[EmbeddedChunk]) -> Result<()>;

    /// Return up to `k` entries of `namespace` ranked by cosine similarity,
    /// ties broken by insertion order. An empty or unknown namespace
    /// yields an empty vector.
    async fn query(&self, namespace: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self, namespace: &str) -> Result<usize>;

    async fn delete_namespace(&self, namespace: &str) -> Result<()>;
}

/// Rank `(insertion_seq, hit)` pairs by score descending, then insertion
/// order ascending, and keep the top `k`.
///
/// Shared by the brute-force backends so they order ties identically.
pub fn rank_hits(mut hits: Vec<(u64, ScoredChunk)>, k: usize) -> Vec<ScoredChunk> {
    hits.sort_by(|(seq_a, a), (seq_b, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(seq_a.cmp(seq_b))
    });
    hits.truncate(k);
    hits.into_iter().map(|(_, hit)| hit).collect()
}
