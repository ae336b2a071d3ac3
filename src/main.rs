//! # docchat CLI
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the vector index if it does not exist |
//! | `docchat serve` | Start the HTTP API |
//! | `docchat ingest <file>` | Ingest one document in the foreground |
//! | `docchat ask "<message>"` | Ask a question, optionally about an ingested document |
//!
//! ## Examples
//!
//! ```bash
//! docchat ingest ./handbook.pdf
//! docchat ask "What is the vacation policy?" --document-id handbook.pdf_48213
//! docchat ask "And for contractors?" --document-id handbook.pdf_48213 --history turns.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docchat::app::AppServices;
use docchat::chat::{ChatError, ChatRequest};
use docchat::config::{self, Config};
use docchat::embedding::create_embedder;
use docchat::extract::DocumentExtractor;
use docchat::ingest::{IngestSettings, IngestionPipeline, Upload};
use docchat::store::open_store;
use docchat::{logging, server};
use docchat_core::models::HistoryEntry;

const DEFAULT_CONFIG_PATH: &str = "./config/docchat.toml";

/// docchat: upload documents, then chat with them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat: retrieval-augmented chat over uploaded documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the default path does not exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector index if absent.
    ///
    /// Idempotent. Fails when an existing index has a different dimension
    /// than the configured embedder.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Ingest a single file (.pdf, .docx, .txt) and wait for completion.
    Ingest {
        /// File to ingest. Its name and size form the document id.
        file: PathBuf,
    },

    /// Ask a question.
    ///
    /// With `--document-id`, the answer is grounded in that document's
    /// chunks; without it, the model answers conversationally.
    Ask {
        message: String,

        /// Document id returned by `ingest` or `POST /upload`.
        #[arg(long)]
        document_id: Option<String>,

        /// JSON file with prior turns: `[{"role": "user", "content": "..."}]`.
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        tracing::info!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = open_store(&cfg).await?;
            store.ensure_index().await?;
            println!(
                "Vector index ready ({}, {} dimensions).",
                store.name(),
                store.dims()
            );
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { file } => {
            run_ingest(&cfg, &file).await?;
        }
        Commands::Ask {
            message,
            document_id,
            history,
        } => {
            run_ask(&cfg, message, document_id, history).await?;
        }
    }

    Ok(())
}

async fn run_ingest(cfg: &Config, file: &Path) -> anyhow::Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid file name: {}", file.display()))?
        .to_string();
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let embedder = create_embedder(&cfg.embedding)?;
    let store = open_store(cfg).await?;
    store.ensure_index().await?;
    if embedder.dims() != store.dims() {
        anyhow::bail!(
            "embedder produces {} dimensions but the store expects {}",
            embedder.dims(),
            store.dims()
        );
    }

    let pipeline = IngestionPipeline::new(
        Arc::new(DocumentExtractor),
        embedder,
        store,
        IngestSettings::from_config(cfg)?,
    );
    let upload = Upload::new(filename, bytes);
    let document_id = upload.document_id();
    let chunks = pipeline.run(upload).await?;

    println!("Ingested {} ({} chunks)", document_id, chunks);
    Ok(())
}

async fn run_ask(
    cfg: &Config,
    message: String,
    document_id: Option<String>,
    history: Option<PathBuf>,
) -> anyhow::Result<()> {
    let history: Vec<HistoryEntry> = match history {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse history file {}", path.display()))?
        }
        None => Vec::new(),
    };

    let services = AppServices::from_config(cfg).await?;
    let mut request = ChatRequest::new(message).with_history(history);
    request.document_id = document_id;

    match services.chat.handle(request).await {
        Ok(response) => {
            println!("{}", response.reply);
            Ok(())
        }
        Err(ChatError::Processing { detail }) => {
            anyhow::bail!("chat processing failed: {}", detail)
        }
        Err(e) => Err(e.into()),
    }
}
