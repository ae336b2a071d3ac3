//! Pinecone-backed [`VectorStore`] over the REST API.
//!
//! The control plane (`api.pinecone.io`) describes and creates the
//! serverless index; data-plane calls go to the index host it reports.
//! One Pinecone namespace per document.
//!
//! Upserts are sent in batches of [`UPSERT_BATCH`]. Pinecone has no
//! multi-request transaction, so a failure after at least one batch was
//! accepted is reported as [`Error::IndeterminateWrite`].

use std::time::Duration;

use async_trait::async_trait;
use docchat_core::embedding::check_dims;
use docchat_core::error::{Error, Result};
use docchat_core::models::{EmbeddedChunk, ScoredChunk};
use docchat_core::store::{VectorStore, METRIC_COSINE};
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::VectorStoreConfig;
use crate::http::{self, CallFailure};

pub const PINECONE_CONTROL_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const LABEL: &str = "Pinecone API";

/// Vectors per upsert request.
pub const UPSERT_BATCH: usize = 100;

/// Polls of the control plane while a new index starts up.
const READY_POLL_ATTEMPTS: u32 = 60;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
struct IndexDescription {
    dims: usize,
    host: String,
    ready: bool,
}

pub struct PineconeStore {
    client: reqwest::Client,
    control_url: String,
    api_key: String,
    index_name: String,
    cloud: String,
    region: String,
    dims: usize,
    max_retries: u32,
    host: RwLock<Option<String>>,
}

impl PineconeStore {
    pub fn new(config: &VectorStoreConfig, dims: usize, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            control_url: config
                .url
                .clone()
                .unwrap_or_else(|| PINECONE_CONTROL_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            index_name: config.index_name.clone(),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            dims,
            max_retries: config.max_retries,
            host: RwLock::new(None),
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn call(
        &self,
        operation: &str,
        method: reqwest::Method,
        url: &str,
        body: Option<&Value>,
    ) -> std::result::Result<Value, CallFailure> {
        let response = http::send_with_retry(LABEL, self.max_retries, || {
            let req = self.request(method.clone(), url);
            match body {
                Some(b) => req.json(b),
                None => req,
            }
        })
        .await?;
        tracing::debug!(operation, "pinecone call succeeded");
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }

    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.control_url, self.index_name);
        match self.call("describe_index", reqwest::Method::GET, &url, None).await {
            Ok(json) => parse_description(&json).map(Some),
            Err(f) if f.status() == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(f) => Err(f.into_error("describe_index", Error::VectorStore)),
        }
    }

    async fn create_index(&self) -> Result<()> {
        let url = format!("{}/indexes", self.control_url);
        let body = json!({
            "name": self.index_name,
            "dimension": self.dims,
            "metric": METRIC_COSINE,
            "spec": { "serverless": { "cloud": self.cloud, "region": self.region } },
        });
        match self
            .call("create_index", reqwest::Method::POST, &url, Some(&body))
            .await
        {
            Ok(_) => Ok(()),
            // Created concurrently by another process
            Err(f) if f.status() == Some(StatusCode::CONFLICT) => Ok(()),
            Err(f) => Err(f.into_error("create_index", Error::VectorStore)),
        }
    }

    /// Data-plane base URL, resolved from the control plane on first use.
    async fn data_url(&self) -> Result<String> {
        if let Some(host) = self.host.read().clone() {
            return Ok(host);
        }
        let desc = self.describe_index().await?.ok_or_else(|| {
            Error::VectorStore(format!(
                "pinecone index '{}' does not exist; run `docchat init`",
                self.index_name
            ))
        })?;
        let host = host_url(&desc.host);
        *self.host.write() = Some(host.clone());
        Ok(host)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn name(&self) -> &str {
        "pinecone"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn ensure_index(&self) -> Result<()> {
        let mut desc = match self.describe_index().await? {
            Some(desc) => desc,
            None => {
                tracing::info!(index = %self.index_name, dims = self.dims, "creating pinecone index");
                self.create_index().await?;
                self.describe_index().await?.ok_or_else(|| {
                    Error::VectorStore("pinecone index missing after create".to_string())
                })?
            }
        };

        if desc.dims != self.dims {
            return Err(Error::Config(format!(
                "pinecone index '{}' has {} dimensions, embedder produces {}",
                self.index_name, desc.dims, self.dims
            )));
        }

        let mut polls = 0;
        while !desc.ready {
            polls += 1;
            if polls > READY_POLL_ATTEMPTS {
                return Err(Error::VectorStore(format!(
                    "pinecone index '{}' not ready after {} polls",
                    self.index_name, READY_POLL_ATTEMPTS
                )));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
            desc = self.describe_index().await?.ok_or_else(|| {
                Error::VectorStore("pinecone index disappeared while starting".to_string())
            })?;
        }

        *self.host.write() = Some(host_url(&desc.host));
        Ok(())
    }

    async fn insert(&self, namespace: &str, items: &[EmbeddedChunk]) -> Result<()> {
        for item in items {
            check_dims(self.dims, &item.vector)?;
        }
        if items.is_empty() {
            return Ok(());
        }
        let url = format!("{}/vectors/upsert", self.data_url().await?);

        for (batch_no, batch) in items.chunks(UPSERT_BATCH).enumerate() {
            let body = upsert_body(namespace, batch);
            if let Err(f) = self
                .call("upsert", reqwest::Method::POST, &url, Some(&body))
                .await
            {
                let err = f.into_error("upsert", Error::VectorStore);
                if batch_no == 0 {
                    return Err(err);
                }
                return Err(Error::IndeterminateWrite {
                    namespace: namespace.to_string(),
                    message: format!(
                        "{} of {} vectors written before failure: {}",
                        batch_no * UPSERT_BATCH,
                        items.len(),
                        err
                    ),
                });
            }
        }
        Ok(())
    }

    async fn query(&self, namespace: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        check_dims(self.dims, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let url = format!("{}/query", self.data_url().await?);
        let body = json!({
            "namespace": namespace,
            "vector": vector,
            "topK": k,
            "includeMetadata": true,
            "includeValues": false,
        });
        let json = self
            .call("query", reqwest::Method::POST, &url, Some(&body))
            .await
            .map_err(|f| f.into_error("query", Error::VectorStore))?;
        parse_matches(namespace, &json)
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let url = format!("{}/describe_index_stats", self.data_url().await?);
        let json = self
            .call("describe_index_stats", reqwest::Method::POST, &url, Some(&json!({})))
            .await
            .map_err(|f| f.into_error("describe_index_stats", Error::VectorStore))?;
        Ok(json["namespaces"][namespace]["vectorCount"]
            .as_u64()
            .unwrap_or(0) as usize)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let url = format!("{}/vectors/delete", self.data_url().await?);
        let body = json!({ "deleteAll": true, "namespace": namespace });
        match self
            .call("delete", reqwest::Method::POST, &url, Some(&body))
            .await
        {
            Ok(_) => Ok(()),
            // Namespace never existed
            Err(f) if f.status() == Some(StatusCode::NOT_FOUND) => Ok(()),
            Err(f) => Err(f.into_error("delete", Error::VectorStore)),
        }
    }
}

/// Index hosts come back without a scheme.
fn host_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn parse_description(json: &Value) -> Result<IndexDescription> {
    let dims = json["dimension"].as_u64().ok_or_else(|| {
        Error::VectorStore("Invalid Pinecone response: missing dimension".to_string())
    })?;
    let host = json["host"].as_str().unwrap_or_default().to_string();
    let ready = json["status"]["ready"].as_bool().unwrap_or(false) && !host.is_empty();
    Ok(IndexDescription {
        dims: dims as usize,
        host,
        ready,
    })
}

fn upsert_body(namespace: &str, batch: &[EmbeddedChunk]) -> Value {
    let vectors: Vec<Value> = batch
        .iter()
        .map(|item| {
            json!({
                "id": item.chunk.id,
                "values": item.vector,
                "metadata": {
                    "text": item.chunk.text,
                    "document_id": item.chunk.document_id,
                    "chunk_index": item.chunk.chunk_index,
                    "hash": item.chunk.hash,
                },
            })
        })
        .collect();
    json!({ "vectors": vectors, "namespace": namespace })
}

fn parse_matches(namespace: &str, json: &Value) -> Result<Vec<ScoredChunk>> {
    let Some(matches) = json["matches"].as_array() else {
        return Ok(Vec::new());
    };
    matches
        .iter()
        .map(|m| {
            let text = m["metadata"]["text"].as_str().ok_or_else(|| {
                Error::VectorStore("Pinecone match is missing text metadata".to_string())
            })?;
            Ok(ScoredChunk {
                chunk_id: m["id"].as_str().unwrap_or_default().to_string(),
                namespace: namespace.to_string(),
                chunk_index: m["metadata"]["chunk_index"].as_i64().unwrap_or(0),
                text: text.to_string(),
                score: m["score"].as_f64().unwrap_or(0.0) as f32,
            })
        })
        .collect()
}
