//! Ingestion pipeline tests: background jobs, status tracking, scratch
//! cleanup, and namespace contents.

mod common;

use std::sync::Arc;

use common::*;
use docchat::extract::DocumentExtractor;
use docchat::ingest::{IngestSettings, IngestionPipeline, IngestionState, Upload};
use docchat_core::embedding::Embedder;
use docchat_core::error::Error;
use docchat_core::store::memory::InMemoryStore;
use docchat_core::store::VectorStore;
use tempfile::TempDir;

fn pipeline(
    tmp: &TempDir,
    embedder: Arc<dyn Embedder>,
    tweak: impl FnOnce(&mut docchat::config::Config),
) -> (IngestionPipeline, Arc<InMemoryStore>) {
    let mut config = test_config(tmp.path());
    tweak(&mut config);
    let store = Arc::new(InMemoryStore::new(TEST_DIMS));
    let pipeline = IngestionPipeline::new(
        Arc::new(DocumentExtractor),
        embedder,
        store.clone(),
        IngestSettings::from_config(&config).unwrap(),
    );
    (pipeline, store)
}

#[tokio::test]
async fn test_text_upload_is_chunked_and_stored() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(&tmp, Arc::new(BagOfWordsEmbedder::new()), |_| {});

    let ticket = pipeline.submit(Upload::new("notes.txt", filler(2500).into_bytes()));
    assert_eq!(ticket.document_id.as_str(), "notes.txt_2500");

    let chunks = ticket.handle.await.unwrap().unwrap();
    assert_eq!(chunks, 3);
    assert_eq!(store.count("notes.txt_2500").await.unwrap(), 3);

    let query = common::bag_of_words("quick brown fox", TEST_DIMS);
    let hits = store.query("notes.txt_2500", &query, 7).await.unwrap();
    assert!(!hits.is_empty() && hits.len() <= 7);
    assert!(hits.iter().all(|h| h.namespace == "notes.txt_2500"));

    let status = pipeline.status(&ticket.document_id).unwrap();
    assert_eq!(status.state, IngestionState::Completed { chunks: 3 });
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_status_is_visible_before_job_finishes() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, _store) = pipeline(&tmp, Arc::new(BagOfWordsEmbedder::new()), |_| {});

    let ticket = pipeline.submit(Upload::new("a.txt", b"hello world".to_vec()));
    assert!(pipeline.status(&ticket.document_id).is_some());
    ticket.handle.await.unwrap().unwrap();
    assert!(pipeline
        .status(&ticket.document_id)
        .unwrap()
        .state
        .is_terminal());
}

#[tokio::test]
async fn test_unsupported_type_fails_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(&tmp, Arc::new(BagOfWordsEmbedder::new()), |_| {});

    let ticket = pipeline.submit(Upload::new("table.csv", b"a,b\n1,2\n".to_vec()));
    let err = ticket.handle.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::UnsupportedFileType(_)));

    let status = pipeline.status(&ticket.document_id).unwrap();
    assert!(matches!(status.state, IngestionState::Failed { .. }));
    assert!(scratch_is_empty(tmp.path()));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_extraction_error_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(&tmp, Arc::new(BagOfWordsEmbedder::new()), |_| {});

    let err = pipeline
        .run(Upload::new("broken.pdf", b"definitely not a pdf".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
    assert!(scratch_is_empty(tmp.path()));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_embedding_failure_cleans_up_and_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(&tmp, Arc::new(FailingEmbedder), |_| {});

    let upload = Upload::new("notes.txt", filler(1500).into_bytes());
    let id = upload.document_id();
    let err = pipeline.run(upload).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider(_)));

    match pipeline.status(&id).unwrap().state {
        IngestionState::Failed { error } => assert!(error.contains("quota exceeded")),
        other => panic!("unexpected state: {:?}", other),
    }
    assert!(scratch_is_empty(tmp.path()));
    assert_eq!(store.count(id.as_str()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_text_completes_with_zero_chunks() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(&tmp, Arc::new(BagOfWordsEmbedder::new()), |_| {});

    let chunks = pipeline
        .run(Upload::new("empty.txt", Vec::new()))
        .await
        .unwrap();
    assert_eq!(chunks, 0);
    assert!(store.is_empty());
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_embeds_in_configured_batches() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let (pipeline, _store) = pipeline(&tmp, embedder.clone(), |c| c.embedding.batch_size = 2);

    // 2500 chars at 1000/100 → 3 chunks → batches of 2 and 1
    let chunks = pipeline
        .run(Upload::new("notes.txt", filler(2500).into_bytes()))
        .await
        .unwrap();
    assert_eq!(chunks, 3);
    assert_eq!(embedder.calls(), 2);
}

#[tokio::test]
async fn test_reingest_appends_by_default() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(&tmp, Arc::new(BagOfWordsEmbedder::new()), |_| {});

    let upload = Upload::new("notes.txt", filler(500).into_bytes());
    pipeline.run(upload.clone()).await.unwrap();
    pipeline.run(upload.clone()).await.unwrap();
    assert_eq!(store.count(upload.document_id().as_str()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_reingest_replaces_when_enabled() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(&tmp, Arc::new(BagOfWordsEmbedder::new()), |c| {
        c.ingest.replace_existing = true
    });

    let upload = Upload::new("notes.txt", filler(500).into_bytes());
    pipeline.run(upload.clone()).await.unwrap();
    pipeline.run(upload.clone()).await.unwrap();
    assert_eq!(store.count(upload.document_id().as_str()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_uploads_stay_in_their_namespaces() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(&tmp, Arc::new(BagOfWordsEmbedder::new()), |_| {});

    let a = pipeline.submit(Upload::new("a.txt", b"apples and pears".to_vec()));
    let b = pipeline.submit(Upload::new("b.txt", b"bolts and nuts and screws".to_vec()));
    a.handle.await.unwrap().unwrap();
    b.handle.await.unwrap().unwrap();

    let query = common::bag_of_words("apples", TEST_DIMS);
    let hits = store.query(b.document_id.as_str(), &query, 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits.iter().all(|h| h.namespace == b.document_id.as_str()));
    assert_eq!(hits[0].text, "bolts and nuts and screws");
}
