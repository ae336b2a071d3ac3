//! Process-wide service wiring.
//!
//! Provider handles are built once from the configuration and shared as
//! `Arc<dyn Trait>` by the ingestion pipeline and the chat orchestrator.

use std::sync::Arc;

use anyhow::Result;
use docchat_core::embedding::Embedder;
use docchat_core::llm::LanguageModel;
use docchat_core::store::VectorStore;

use crate::chat::ChatOrchestrator;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::DocumentExtractor;
use crate::ingest::{IngestSettings, IngestionPipeline};
use crate::llm::create_model;
use crate::store::open_store;

#[derive(Clone)]
pub struct AppServices {
    pub ingestion: IngestionPipeline,
    pub chat: Arc<ChatOrchestrator>,
    pub store: Arc<dyn VectorStore>,
}

impl AppServices {
    /// Build providers from `config` and make sure the index exists.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let model = create_model(&config.llm)?;
        let store = open_store(config).await?;
        store.ensure_index().await?;
        tracing::info!(
            store = store.name(),
            embedder = embedder.model_name(),
            model = model.name(),
            dims = store.dims(),
            "providers ready"
        );
        Self::assemble(config, model, embedder, store)
    }

    /// Wire already-built providers together.
    pub fn assemble(
        config: &Config,
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        if embedder.dims() != store.dims() {
            anyhow::bail!(
                "embedder '{}' produces {} dimensions but the {} store expects {}",
                embedder.model_name(),
                embedder.dims(),
                store.name(),
                store.dims()
            );
        }

        let ingestion = IngestionPipeline::new(
            Arc::new(DocumentExtractor),
            embedder.clone(),
            store.clone(),
            IngestSettings::from_config(config)?,
        );
        let chat = Arc::new(ChatOrchestrator::new(
            model,
            embedder,
            store.clone(),
            config.retrieval.params(),
        ));

        Ok(Self {
            ingestion,
            chat,
            store,
        })
    }
}
