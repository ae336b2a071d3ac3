//! In-process providers shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docchat::app::AppServices;
use docchat::config::Config;
use docchat_core::embedding::Embedder;
use docchat_core::error::{Error, Result};
use docchat_core::llm::LanguageModel;
use docchat_core::models::{ChatMessage, MessageRole};
use docchat_core::store::memory::InMemoryStore;
use parking_lot::Mutex;

pub const TEST_DIMS: usize = 64;

/// Hashes each lowercase word into one of `dims` buckets. Texts sharing
/// words end up close; texts sharing none score 0.
pub struct BagOfWordsEmbedder {
    pub dims: usize,
    pub calls: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self {
            dims: TEST_DIMS,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn bag_of_words(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0; dims];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        // FNV-1a
        let mut h: u64 = 0xcbf29ce484222325;
        for b in word.to_lowercase().bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        v[(h % dims as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| bag_of_words(t, self.dims)).collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        TEST_DIMS
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::EmbeddingProvider("quota exceeded".to_string()))
    }
}

/// Answers prompts that open with a system message with `reply` and
/// everything else (query expansion) with `expansions`. Records every call.
pub struct MockModel {
    expansions: std::result::Result<String, String>,
    reply: std::result::Result<String, String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    pub fn new(reply: &str) -> Self {
        Self {
            expansions: Ok(String::new()),
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_expansions(mut self, expansions: &str) -> Self {
        self.expansions = Ok(expansions.to_string());
        self
    }

    pub fn failing_expansions(mut self) -> Self {
        self.expansions = Err("expansion model unavailable".to_string());
        self
    }

    pub fn failing_reply(mut self) -> Self {
        self.reply = Err("upstream 500 for key sk-secret".to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }

    pub fn answer_calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls()
            .into_iter()
            .filter(|c| is_answer_call(c))
            .collect()
    }

    pub fn expansion_calls(&self) -> usize {
        self.calls().iter().filter(|c| !is_answer_call(c)).count()
    }
}

fn is_answer_call(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .map(|m| m.role == MessageRole::System)
        .unwrap_or(false)
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().push(messages.to_vec());
        let outcome = if is_answer_call(messages) {
            &self.reply
        } else {
            &self.expansions
        };
        outcome.clone().map_err(Error::ModelProvider)
    }
}

/// Memory store, test dimensions, small chunks, scratch files in `scratch`.
pub fn test_config(scratch: &Path) -> Config {
    let mut config = Config::default();
    config.vector_store.provider = "memory".to_string();
    config.embedding.dims = TEST_DIMS;
    config.ingest.scratch_dir = Some(scratch.to_path_buf());
    config
}

pub fn services(
    config: &Config,
    model: Arc<MockModel>,
    embedder: Arc<dyn Embedder>,
) -> (AppServices, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new(config.embedding.dims));
    let services = AppServices::assemble(config, model, embedder, store.clone()).unwrap();
    (services, store)
}

pub fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

/// ASCII filler text of exactly `len` characters.
pub fn filler(len: usize) -> String {
    let base = "the quick brown fox jumps over the lazy dog ";
    base.repeat(len / base.len() + 1)[..len].to_string()
}
