//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian f32 BLOBs in `chunk_vectors`, one
//! row per chunk, tagged with their namespace. Queries load the
//! namespace's rows and compute cosine similarity in Rust. Inserts run in
//! a single transaction, so a failed insert leaves nothing behind.

use std::path::Path;

use async_trait::async_trait;
use docchat_core::embedding::{blob_to_vec, check_dims, cosine_similarity, vec_to_blob};
use docchat_core::error::{Error, Result};
use docchat_core::models::{EmbeddedChunk, ScoredChunk};
use docchat_core::store::{rank_hits, VectorStore, METRIC_COSINE};
use sqlx::{Row, SqlitePool};

use crate::{db, migrate};

fn store_err(e: sqlx::Error) -> Error {
    Error::VectorStore(format!("sqlite: {}", e))
}

pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn open(path: &Path, dims: usize) -> anyhow::Result<Self> {
        let pool = db::connect(path).await?;
        Ok(Self::new(pool, dims))
    }

    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn ensure_index(&self) -> Result<()> {
        migrate::run_migrations(&self.pool)
            .await
            .map_err(store_err)?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT dims FROM index_meta WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        match existing {
            Some(dims) if dims as usize != self.dims => Err(Error::Config(format!(
                "sqlite index was created with {} dimensions, embedder produces {}",
                dims, self.dims
            ))),
            Some(_) => Ok(()),
            None => {
                sqlx::query(
                    "INSERT INTO index_meta (id, dims, metric, created_at) VALUES (1, ?, ?, ?)",
                )
                .bind(self.dims as i64)
                .bind(METRIC_COSINE)
                .bind(chrono::Utc::now().timestamp())
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
                tracing::info!(dims = self.dims, "created sqlite vector index");
                Ok(())
            }
        }
    }

    async fn insert(&self, namespace: &str, items: &[EmbeddedChunk]) -> Result<()> {
        for item in items {
            check_dims(self.dims, &item.vector)?;
        }

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for item in items {
            let chunk = &item.chunk;
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors
                    (namespace, chunk_id, document_id, chunk_index, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(namespace)
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(&item.vector))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn query(&self, namespace: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        check_dims(self.dims, vector)?;

        // Fetch the namespace's vectors and compute cosine similarity in Rust
        let rows = sqlx::query(
            r#"
            SELECT seq, chunk_id, chunk_index, text, embedding
            FROM chunk_vectors
            WHERE namespace = ?
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let hits: Vec<(u64, ScoredChunk)> = rows
            .iter()
            .map(|row| {
                let seq: i64 = row.get("seq");
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                (
                    seq as u64,
                    ScoredChunk {
                        chunk_id: row.get("chunk_id"),
                        namespace: namespace.to_string(),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                        score: cosine_similarity(vector, &stored),
                    },
                )
            })
            .collect();

        Ok(rank_hits(hits, k))
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE namespace = ?")
            .bind(namespace)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(n as usize)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        sqlx::query("DELETE FROM chunk_vectors WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
