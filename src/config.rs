//! TOML configuration.
//!
//! Every section is optional; an empty file yields a working Gemini +
//! SQLite setup. Secrets never live in the file: provider API keys are
//! read from `GOOGLE_API_KEY`, `OPENAI_API_KEY` and `PINECONE_API_KEY`
//! when the provider handles are built.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docchat_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use docchat_core::embedding::DEFAULT_EMBEDDING_DIMS;
use docchat_core::retrieve::{
    RetrievalParams, DEFAULT_EXPANSIONS, DEFAULT_FANOUT_K, DEFAULT_MAX_RESULTS,
};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Request body limit for `/upload`.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_fanout_k")]
    pub fanout_k: usize,
    #[serde(default = "default_expansions")]
    pub expansions: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fanout_k: DEFAULT_FANOUT_K,
            expansions: DEFAULT_EXPANSIONS,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            expansions: self.expansions,
            fanout_k: self.fanout_k,
            max_results: self.max_results,
        }
    }
}

fn default_fanout_k() -> usize {
    DEFAULT_FANOUT_K
}
fn default_expansions() -> usize {
    DEFAULT_EXPANSIONS
}
fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `gemini`, `openai` or `ollama`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    /// Base URL override (self-hosted gateways, Ollama, tests).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: DEFAULT_EMBEDDING_DIMS,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    "models/embedding-001".to_string()
}
fn default_dims() -> usize {
    DEFAULT_EMBEDDING_DIMS
}
fn default_batch_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `gemini` or `openai`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: 0,
            url: None,
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    /// `memory`, `sqlite` or `pinecone`.
    #[serde(default = "default_store_provider")]
    pub provider: String,
    /// SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Pinecone index name.
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Pinecone control-plane URL override.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            path: default_store_path(),
            index_name: default_index_name(),
            cloud: default_cloud(),
            region: default_region(),
            url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

fn default_store_provider() -> String {
    "sqlite".to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./data/docchat.sqlite")
}
fn default_index_name() -> String {
    "docchat".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Directory for temporary upload copies. Defaults to the OS temp dir.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Delete a document's namespace before inserting a re-upload.
    #[serde(default)]
    pub replace_existing: bool,
    /// Finished ingestion statuses kept in memory for the status endpoint.
    #[serde(default = "default_max_tracked_statuses")]
    pub max_tracked_statuses: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            replace_existing: false,
            max_tracked_statuses: default_max_tracked_statuses(),
        }
    }
}

pub const DEFAULT_MAX_TRACKED_STATUSES: usize = 10_000;

fn default_max_tracked_statuses() -> usize {
    DEFAULT_MAX_TRACKED_STATUSES
}

impl IngestConfig {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Read a provider secret from the environment.
pub fn api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => anyhow::bail!("{} environment variable not set", var),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.fanout_k == 0 {
        anyhow::bail!("retrieval.fanout_k must be >= 1");
    }
    if config.retrieval.max_results == 0 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }

    // Validate embedding
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.timeout_secs == 0 {
        anyhow::bail!("embedding.timeout_secs must be > 0");
    }
    match config.embedding.provider.as_str() {
        "gemini" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be gemini, openai, or ollama.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be gemini or openai.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    match config.vector_store.provider.as_str() {
        "memory" | "sqlite" | "pinecone" => {}
        other => anyhow::bail!(
            "Unknown vector store provider: '{}'. Must be memory, sqlite, or pinecone.",
            other
        ),
    }
    if config.vector_store.timeout_secs == 0 {
        anyhow::bail!("vector_store.timeout_secs must be > 0");
    }

    if config.ingest.max_tracked_statuses == 0 {
        anyhow::bail!("ingest.max_tracked_statuses must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.params(), RetrievalParams::default());
        assert_eq!(config.embedding.provider, "gemini");
        assert_eq!(config.embedding.dims, 768);
        assert_eq!(config.embedding.max_retries, 0);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.vector_store.provider, "sqlite");
        assert!(!config.ingest.replace_existing);
        assert_eq!(config.ingest.max_tracked_statuses, 10_000);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = parse_config(
            r#"
            [chunking]
            chunk_size = 200
            chunk_overlap = 20

            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dims = 768
            url = "http://localhost:11434"

            [vector_store]
            provider = "pinecone"
            index_name = "docs"

            [ingest]
            replace_existing = true
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.vector_store.index_name, "docs");
        assert_eq!(config.vector_store.region, "us-east-1");
        assert!(config.ingest.replace_existing);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            "[chunking]\nchunk_size = 0",
            "[chunking]\nchunk_size = 100\nchunk_overlap = 100",
            "[retrieval]\nfanout_k = 0",
            "[retrieval]\nmax_results = 0",
            "[embedding]\ndims = 0",
            "[embedding]\nprovider = \"local\"",
            "[llm]\nprovider = \"anthropic\"",
            "[vector_store]\nprovider = \"qdrant\"",
            "[embedding]\ntimeout_secs = 0",
            "[llm]\ntimeout_secs = 0",
            "[vector_store]\ntimeout_secs = 0",
            "[ingest]\nmax_tracked_statuses = 0",
        ];
        for case in cases {
            assert!(parse_config(case).is_err(), "accepted: {}", case);
        }
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/docchat.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
