//! Background document ingestion.
//!
//! Coordinates the upload flow: scratch copy → extraction → chunking →
//! embedding → vector store insert. Each upload runs as its own detached
//! tokio task; [`IngestionPipeline::submit`] returns the document id at
//! once together with a handle resolving to the final outcome.
//!
//! # States
//!
//! ```text
//! Received → Extracting → Chunking → Embedding → Completed { chunks }
//!                 │            │          │
//!                 └────────────┴──────────┴─────→ Failed { error }
//! ```
//!
//! Every transition is recorded in the shared [`IngestionTracker`].
//!
//! # Scratch files
//!
//! The upload bytes are written to a named temporary file in the
//! configured scratch directory, keeping the original extension. The file
//! is removed when the job ends, whatever the outcome. Failures are
//! terminal and only logged; nothing is retried at this level.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docchat_core::chunk::Chunker;
use docchat_core::embedding::Embedder;
use docchat_core::error::{Error, Result};
use docchat_core::extract::{FileKind, TextExtractor};
use docchat_core::models::{DocumentId, EmbeddedChunk};
use docchat_core::store::VectorStore;
use parking_lot::RwLock;
use serde::Serialize;
use tempfile::TempPath;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::Config;

/// A received file, held in memory until the job writes its scratch copy.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        DocumentId::from_upload(&self.filename, self.bytes.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestionState {
    Received,
    Extracting,
    Chunking,
    Embedding,
    Completed { chunks: usize },
    Failed { error: String },
}

impl IngestionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestionState::Completed { .. } | IngestionState::Failed { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionStatus {
    pub document_id: DocumentId,
    #[serde(flatten)]
    pub state: IngestionState,
    pub updated_at: DateTime<Utc>,
}

/// Latest known state per document id.
///
/// Concurrent uploads of the same document share one entry; the most
/// recent transition wins. At most `capacity` finished entries are kept;
/// the oldest finished entry is evicted first. Jobs still in flight are
/// never evicted.
#[derive(Debug)]
pub struct IngestionTracker {
    inner: RwLock<TrackerState>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct TrackerState {
    statuses: HashMap<DocumentId, IngestionStatus>,
    finished: VecDeque<DocumentId>,
}

impl Default for IngestionTracker {
    fn default() -> Self {
        Self::with_capacity(crate::config::DEFAULT_MAX_TRACKED_STATUSES)
    }
}

impl IngestionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(TrackerState::default()),
            capacity,
        }
    }

    pub fn set(&self, document_id: &DocumentId, state: IngestionState) {
        let terminal = state.is_terminal();
        let status = IngestionStatus {
            document_id: document_id.clone(),
            state,
            updated_at: Utc::now(),
        };

        let mut inner = self.inner.write();
        inner.finished.retain(|id| id != document_id);
        inner.statuses.insert(document_id.clone(), status);
        if terminal {
            inner.finished.push_back(document_id.clone());
        }
        while inner.finished.len() > self.capacity {
            if let Some(oldest) = inner.finished.pop_front() {
                inner.statuses.remove(&oldest);
            }
        }
    }

    pub fn get(&self, document_id: &DocumentId) -> Option<IngestionStatus> {
        self.inner.read().statuses.get(document_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pipeline tuning taken from `[chunking]`, `[embedding]` and `[ingest]`.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub chunker: Chunker,
    pub batch_size: usize,
    pub scratch_dir: PathBuf,
    pub replace_existing: bool,
    pub max_tracked_statuses: usize,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            chunker: Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?,
            batch_size: config.embedding.batch_size.max(1),
            scratch_dir: config.ingest.scratch_dir(),
            replace_existing: config.ingest.replace_existing,
            max_tracked_statuses: config.ingest.max_tracked_statuses,
        })
    }
}

/// Returned by [`IngestionPipeline::submit`].
pub struct IngestionTicket {
    pub document_id: DocumentId,
    /// Resolves to the number of chunks stored, or the terminal error.
    pub handle: JoinHandle<Result<usize>>,
}

#[derive(Clone)]
pub struct IngestionPipeline {
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    settings: Arc<IngestSettings>,
    tracker: Arc<IngestionTracker>,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: IngestSettings,
    ) -> Self {
        let tracker = IngestionTracker::with_capacity(settings.max_tracked_statuses);
        Self {
            extractor,
            embedder,
            store,
            settings: Arc::new(settings),
            tracker: Arc::new(tracker),
        }
    }

    pub fn tracker(&self) -> &Arc<IngestionTracker> {
        &self.tracker
    }

    pub fn status(&self, document_id: &DocumentId) -> Option<IngestionStatus> {
        self.tracker.get(document_id)
    }

    /// Start ingesting `upload` in the background.
    ///
    /// The document id is usable immediately; queries against it may see
    /// zero or partial results until the handle resolves.
    pub fn submit(&self, upload: Upload) -> IngestionTicket {
        let document_id = upload.document_id();
        self.tracker.set(&document_id, IngestionState::Received);

        let pipeline = self.clone();
        let id = document_id.clone();
        let span = tracing::info_span!("ingest", document_id = %id);
        let handle = tokio::spawn(async move { pipeline.finish(&id, upload).await }.instrument(span));

        IngestionTicket {
            document_id,
            handle,
        }
    }

    /// Ingest `upload` on the current task.
    pub async fn run(&self, upload: Upload) -> Result<usize> {
        let document_id = upload.document_id();
        self.tracker.set(&document_id, IngestionState::Received);
        let span = tracing::info_span!("ingest", document_id = %document_id);
        self.finish(&document_id, upload).instrument(span).await
    }

    async fn finish(&self, document_id: &DocumentId, upload: Upload) -> Result<usize> {
        tracing::info!(filename = %upload.filename, bytes = upload.bytes.len(), "ingestion started");
        let result = self.process(document_id, upload).await;
        match &result {
            Ok(chunks) => {
                tracing::info!(chunks, "ingestion completed");
                self.tracker
                    .set(document_id, IngestionState::Completed { chunks: *chunks });
            }
            Err(e) => {
                tracing::error!(error = %e, "ingestion failed");
                self.tracker.set(
                    document_id,
                    IngestionState::Failed {
                        error: e.to_string(),
                    },
                );
            }
        }
        result
    }

    async fn process(&self, document_id: &DocumentId, upload: Upload) -> Result<usize> {
        self.tracker.set(document_id, IngestionState::Extracting);
        let scratch = write_scratch(&self.settings.scratch_dir, &upload.filename, &upload.bytes)?;
        drop(upload.bytes);

        let result = self
            .process_scratch(document_id, &upload.filename, &scratch)
            .await;

        let path = scratch.to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch file");
        }
        result
    }

    async fn process_scratch(
        &self,
        document_id: &DocumentId,
        filename: &str,
        scratch: &Path,
    ) -> Result<usize> {
        let kind = FileKind::from_filename(filename)?;
        let text = self.extract(kind, scratch.to_path_buf()).await?;
        tracing::debug!(%kind, chars = text.chars().count(), "extracted text");

        self.tracker.set(document_id, IngestionState::Chunking);
        let chunks = self.settings.chunker.chunk(document_id.as_str(), &text);

        self.tracker.set(document_id, IngestionState::Embedding);
        let mut embedded = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.settings.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::EmbeddingProvider(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            embedded.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| EmbeddedChunk { chunk, vector }),
            );
        }

        let namespace = document_id.as_str();
        if self.settings.replace_existing {
            self.store.delete_namespace(namespace).await?;
        }
        if !embedded.is_empty() {
            self.store.insert(namespace, &embedded).await?;
        }
        Ok(embedded.len())
    }

    async fn extract(&self, kind: FileKind, path: PathBuf) -> Result<String> {
        let extractor = self.extractor.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&path)
                .map_err(|e| Error::Extraction(format!("failed to read scratch file: {}", e)))?;
            extractor.extract(&bytes, kind)
        })
        .await
        .map_err(|e| Error::Extraction(format!("extraction task failed: {}", e)))?
    }
}

/// Write `bytes` to a fresh file in `dir` carrying the upload's extension.
fn write_scratch(dir: &Path, filename: &str, bytes: &[u8]) -> Result<TempPath> {
    let suffix = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let scratch_err = |e: std::io::Error| Error::Extraction(format!("failed to write scratch file: {}", e));
    let mut file = tempfile::Builder::new()
        .prefix("docchat-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(scratch_err)?;
    file.write_all(bytes).map_err(scratch_err)?;
    file.flush().map_err(scratch_err)?;
    Ok(file.into_temp_path())
}
