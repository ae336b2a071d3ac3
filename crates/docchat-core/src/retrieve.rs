//! Multi-query retrieval over one document namespace.
//!
//! A single embedding of the raw question under-retrieves when the
//! question's wording differs from the document's. The retriever asks the
//! language model for several reformulations, searches the namespace with
//! each of them plus the original, and fuses the result sets.
//!
//! # Algorithm
//!
//! 1. Ask the model for `expansions` alternative phrasings, one per line.
//!    If that call fails, or yields no usable lines, continue with the
//!    original question alone.
//! 2. Embed every query and search the namespace with `fanout_k` each.
//!    Sub-queries run concurrently; result order does not depend on
//!    completion order.
//! 3. Merge by exact chunk text. A chunk hit by several queries appears
//!    once, at its first position, carrying its highest similarity.
//! 4. Truncate to `max_results`.

use std::collections::HashMap;

use futures_util::future::try_join_all;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::models::{ChatMessage, ScoredChunk};
use crate::store::VectorStore;

pub const DEFAULT_EXPANSIONS: usize = 3;
pub const DEFAULT_FANOUT_K: usize = 7;
pub const DEFAULT_MAX_RESULTS: usize = 28;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    /// Number of reformulations requested from the model.
    pub expansions: usize,
    /// Hits fetched per sub-query.
    pub fanout_k: usize,
    /// Cap on the merged result set.
    pub max_results: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            expansions: DEFAULT_EXPANSIONS,
            fanout_k: DEFAULT_FANOUT_K,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Retriever bound to one namespace for the lifetime of a chat request.
pub struct MultiQueryRetriever<'a> {
    model: &'a dyn LanguageModel,
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
    namespace: &'a str,
    params: RetrievalParams,
}

impl<'a> MultiQueryRetriever<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        embedder: &'a dyn Embedder,
        store: &'a dyn VectorStore,
        namespace: &'a str,
        params: RetrievalParams,
    ) -> Self {
        Self {
            model,
            embedder,
            store,
            namespace,
            params,
        }
    }

    /// Retrieve the fused context for `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let mut queries = vec![question.to_string()];
        queries.extend(self.expand(question).await);

        tracing::debug!(
            namespace = self.namespace,
            queries = queries.len(),
            "running multi-query retrieval"
        );

        let result_sets = try_join_all(queries.iter().map(|q| self.search_one(q))).await?;
        let merged = merge_results(result_sets, self.params.max_results);

        tracing::info!(
            namespace = self.namespace,
            queries = queries.len(),
            chunks = merged.len(),
            "retrieved context"
        );
        Ok(merged)
    }

    /// Ask the model for reformulations of `question`.
    ///
    /// Never fails: a model error degrades to no reformulations.
    pub async fn expand(&self, question: &str) -> Vec<String> {
        if self.params.expansions == 0 {
            return Vec::new();
        }
        let prompt = expansion_prompt(question, self.params.expansions);
        match self.model.generate(&[ChatMessage::user(prompt)]).await {
            Ok(raw) => {
                let alternatives = parse_expansions(&raw, question, self.params.expansions);
                if alternatives.is_empty() {
                    tracing::warn!(
                        namespace = self.namespace,
                        "query expansion produced no alternatives, using original question only"
                    );
                }
                alternatives
            }
            Err(e) => {
                tracing::warn!(
                    namespace = self.namespace,
                    error = %e,
                    "query expansion failed, falling back to single-query retrieval"
                );
                Vec::new()
            }
        }
    }

    async fn search_one(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let vector = self.embedder.embed(query).await?;
        self.store
            .query(self.namespace, &vector, self.params.fanout_k)
            .await
    }
}

/// Prompt asking for `n` reformulations of `question`, one per line.
pub fn expansion_prompt(question: &str, n: usize) -> String {
    format!(
        "You are an AI language model assistant. Your task is to generate {n} \
         different versions of the given user question to retrieve relevant documents \
         from a vector database. By generating multiple perspectives on the user \
         question, your goal is to help the user overcome some of the limitations of \
         distance-based similarity search. Provide these alternative questions \
         separated by newlines.\nOriginal question: {question}"
    )
}

/// Parse the model's reply into at most `n` distinct reformulations.
///
/// Blank lines, list markers (`1.`, `2)`, `-`, `*`), and lines repeating
/// the original question are dropped.
pub fn parse_expansions(raw: &str, original: &str, n: usize) -> Vec<String> {
    let original = original.trim();
    let mut out: Vec<String> = Vec::new();
    for line in raw.lines() {
        let cleaned = strip_list_marker(line.trim()).trim();
        if cleaned.is_empty() || cleaned == original {
            continue;
        }
        if out.iter().any(|q| q == cleaned) {
            continue;
        }
        out.push(cleaned.to_string());
        if out.len() == n {
            break;
        }
    }
    out
}

fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix(['-', '*', '•']) {
        return rest;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(['.', ')']) {
            return rest;
        }
    }
    line
}

/// Fuse per-query result sets, deduplicating by exact chunk text.
///
/// Order is first appearance across `result_sets` in order; a duplicate
/// keeps its first position and the highest score seen.
pub fn merge_results(result_sets: Vec<Vec<ScoredChunk>>, cap: usize) -> Vec<ScoredChunk> {
    let mut merged: Vec<ScoredChunk> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for hit in result_sets.into_iter().flatten() {
        match position.get(&hit.text) {
            Some(&i) => {
                if hit.score > merged[i].score {
                    merged[i].score = hit.score;
                }
            }
            None => {
                position.insert(hit.text.clone(), merged.len());
                merged.push(hit);
            }
        }
    }

    merged.truncate(cap);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{Chunk, EmbeddedChunk};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hit(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk_id: format!("id-{}", text),
            namespace: "doc".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            score,
        }
    }

    struct ScriptedModel {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| Error::ModelProvider("quota exceeded".to_string()))
        }
    }

    /// Embeds a text as a one-hot vector keyed on its first letter.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letter"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| letter_vec(t)).collect())
        }
    }

    fn letter_vec(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; 26];
        let c = text.chars().next().unwrap_or('a').to_ascii_lowercase();
        let idx = (c as u8).saturating_sub(b'a').min(25) as usize;
        v[idx] = 1.0;
        v
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new(26);
        let items: Vec<EmbeddedChunk> = ["apples grow on trees", "bananas are yellow", "cherries are red"]
            .iter()
            .enumerate()
            .map(|(i, text)| EmbeddedChunk {
                chunk: Chunk {
                    id: format!("c{}", i),
                    document_id: "doc".to_string(),
                    chunk_index: i as i64,
                    text: text.to_string(),
                    hash: String::new(),
                },
                vector: letter_vec(text),
            })
            .collect();
        store.insert("doc", &items).await.unwrap();
        store
    }

    #[test]
    fn test_merge_dedups_keeping_highest_score() {
        let merged = merge_results(
            vec![
                vec![hit("shared", 0.4), hit("only-a", 0.3)],
                vec![hit("shared", 0.9), hit("only-b", 0.2)],
            ],
            10,
        );
        let texts: Vec<&str> = merged.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["shared", "only-a", "only-b"]);
        assert!((merged[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_merge_respects_cap() {
        let merged = merge_results(vec![vec![hit("a", 0.1), hit("b", 0.2), hit("c", 0.3)]], 2);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].text, "b");
    }

    #[test]
    fn test_parse_expansions_strips_markers_and_duplicates() {
        let raw = "1. What fruit is red?\n\n2) Which fruit is yellow?\n- What fruit is red?\n* Original?\nThird phrasing";
        let parsed = parse_expansions(raw, "Original?", 3);
        assert_eq!(
            parsed,
            vec![
                "What fruit is red?".to_string(),
                "Which fruit is yellow?".to_string(),
                "Third phrasing".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_expansions_limits_count() {
        let parsed = parse_expansions("a\nb\nc\nd\ne", "q", 3);
        assert_eq!(parsed.len(), 3);
    }

    #[tokio::test]
    async fn test_retrieve_fuses_expanded_queries() {
        let store = seeded_store().await;
        let model = ScriptedModel {
            reply: Some("bananas?\ncherries?".to_string()),
            calls: AtomicUsize::new(0),
        };
        let params = RetrievalParams {
            expansions: 3,
            fanout_k: 1,
            max_results: 10,
        };
        let retriever = MultiQueryRetriever::new(&model, &LetterEmbedder, &store, "doc", params);

        let hits = retriever.retrieve("apples?").await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["apples grow on trees", "bananas are yellow", "cherries are red"]
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expansion_failure_degrades_to_single_query() {
        let store = seeded_store().await;
        let model = ScriptedModel {
            reply: None,
            calls: AtomicUsize::new(0),
        };
        let params = RetrievalParams {
            expansions: 3,
            fanout_k: 1,
            max_results: 10,
        };
        let retriever = MultiQueryRetriever::new(&model, &LetterEmbedder, &store, "doc", params);

        let hits = retriever.retrieve("cherries?").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "cherries are red");
    }

    #[tokio::test]
    async fn test_empty_namespace_yields_no_context() {
        let store = InMemoryStore::new(26);
        let model = ScriptedModel {
            reply: Some("other phrasing".to_string()),
            calls: AtomicUsize::new(0),
        };
        let retriever = MultiQueryRetriever::new(
            &model,
            &LetterEmbedder,
            &store,
            "pending.txt_10",
            RetrievalParams::default(),
        );
        assert!(retriever.retrieve("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_expansions_skips_model() {
        let store = seeded_store().await;
        let model = ScriptedModel {
            reply: Some("x".to_string()),
            calls: AtomicUsize::new(0),
        };
        let params = RetrievalParams {
            expansions: 0,
            ..RetrievalParams::default()
        };
        let retriever = MultiQueryRetriever::new(&model, &LetterEmbedder, &store, "doc", params);
        retriever.retrieve("apples").await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }
}
