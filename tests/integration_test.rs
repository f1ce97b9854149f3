//! Integration tests for the corpus-qa pipeline.
//!
//! These tests drive ingestion, retrieval and answering through the public
//! API with in-process embedding and generation services, so no LLM needs to
//! be running.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use corpus_qa::api;
use corpus_qa::config::{Config, RetrievalConfig};
use corpus_qa::engine::RagEngine;
use corpus_qa::error::{RagError, Result};
use corpus_qa::llm::embeddings::{EmbedTask, Embedder};
use corpus_qa::llm::generate::Generator;
use corpus_qa::models::{Document, QueryRequest};
use corpus_qa::state::AppState;

const CAPITALS: &str = "Seoul is the capital of South Korea. Busan is a major port city.";

/// Three orthogonal topics: capital cities, ports, everything else.
#[derive(Default)]
struct TopicEmbedder {
    /// Fail this many upcoming calls with a transient error
    failures: AtomicU32,
    /// Never return while set
    stalled: AtomicBool,
    calls: AtomicU32,
}

impl TopicEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        if text.contains("capital") || text.contains("seoul") {
            vec![1.0, 0.0, 0.0]
        } else if text.contains("port") || text.contains("busan") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0]
        }
    }
}

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, texts: &[String], _task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(RagError::EmbeddingService("503 service unavailable".into()));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model(&self) -> &str {
        "topics"
    }
}

/// Returns the prompt itself as the answer.
#[derive(Default)]
struct EchoGenerator {
    failures: AtomicU32,
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(RagError::GenerationService("upstream timeout".into()));
        }
        Ok(prompt.to_string())
    }
}

fn small_chunks() -> RetrievalConfig {
    RetrievalConfig {
        chunk_size: 20,
        chunk_overlap: 5,
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

fn engine_with(
    config: RetrievalConfig,
    embedder: Arc<TopicEmbedder>,
    generator: Arc<EchoGenerator>,
) -> RagEngine {
    RagEngine::new(config, embedder, generator).unwrap()
}

fn engine() -> RagEngine {
    engine_with(
        small_chunks(),
        Arc::new(TopicEmbedder::default()),
        Arc::new(EchoGenerator::default()),
    )
}

#[tokio::test]
async fn test_capital_question_end_to_end() {
    let engine = engine();
    let info = engine.ingest(Document::new("korea", CAPITALS)).await.unwrap();
    assert_eq!(info.chunk_count, 4);
    assert_eq!(info.version, 1);
    assert_eq!(info.dimension, 3);

    let question = "What is the capital of South Korea?";
    let results = engine.retrieve("korea", question, 4).await.unwrap();
    assert_eq!(results[0].chunk.text, "Seoul is the capital");
    assert_eq!(results[0].rank, 1);

    let response = engine.answer("korea", question).await.unwrap();
    assert_eq!(response.question, question);
    assert!(response.context.starts_with("Seoul is the capital"));
    assert!(response.answer.contains("Seoul"));
}

#[tokio::test]
async fn test_context_is_ranked_passages_joined() {
    let engine = engine();
    engine.ingest(Document::new("korea", CAPITALS)).await.unwrap();

    let question = "What is the capital of South Korea?";
    let results = engine.retrieve("korea", question, 4).await.unwrap();
    let response = engine.answer("korea", question).await.unwrap();

    let expected: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
    assert_eq!(response.context, expected.join("\n\n"));
}

#[tokio::test]
async fn test_k_larger_than_corpus_returns_every_chunk() {
    let engine = engine();
    let text = "Para one line.\n\nPara two is here.\n\nPara three ends.";
    let info = engine.ingest(Document::new("paras", text)).await.unwrap();
    assert_eq!(info.chunk_count, 3);

    let results = engine.retrieve("paras", "para", 5).await.unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn test_unknown_corpus() {
    let engine = engine();
    let err = engine.answer("missing", "anything?").await.unwrap_err();
    assert!(matches!(err, RagError::CorpusNotFound(id) if id == "missing"));
}

#[tokio::test]
async fn test_rebuild_swaps_index_and_keeps_old_snapshot() {
    let engine = engine();
    engine.ingest(Document::new("docs", CAPITALS)).await.unwrap();
    let old = engine.corpus("docs").unwrap();

    let info = engine
        .ingest(Document::new("docs", "Busan has beaches."))
        .await
        .unwrap();
    assert_eq!(info.version, 2);
    assert_eq!(info.chunk_count, 1);

    // A reader holding the previous snapshot still sees the full old index.
    assert_eq!(old.version, 1);
    assert_eq!(old.chunks.len(), 4);

    let current = engine.corpus("docs").unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.chunks[0].text, "Busan has beaches.");
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() {
    let embedder = Arc::new(TopicEmbedder::default());
    let config = RetrievalConfig {
        max_retries: 1,
        ..small_chunks()
    };
    let engine = engine_with(config, embedder.clone(), Arc::new(EchoGenerator::default()));
    engine.ingest(Document::new("docs", CAPITALS)).await.unwrap();

    embedder.failures.store(10, Ordering::SeqCst);
    let err = engine
        .ingest(Document::new("docs", "replacement text"))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingService(_)));

    let current = engine.corpus("docs").unwrap();
    assert_eq!(current.version, 1);
    assert_eq!(current.chunks.len(), 4);
}

#[tokio::test]
async fn test_transient_embedding_failures_retried() {
    let embedder = Arc::new(TopicEmbedder::default());
    let config = RetrievalConfig {
        max_retries: 2,
        ..small_chunks()
    };
    let engine = engine_with(config, embedder.clone(), Arc::new(EchoGenerator::default()));

    embedder.failures.store(2, Ordering::SeqCst);
    let info = engine.ingest(Document::new("docs", CAPITALS)).await.unwrap();
    assert_eq!(info.version, 1);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_transient_generation_failure_retried() {
    let generator = Arc::new(EchoGenerator::default());
    let engine = engine_with(small_chunks(), Arc::new(TopicEmbedder::default()), generator.clone());
    engine.ingest(Document::new("korea", CAPITALS)).await.unwrap();

    generator.failures.store(1, Ordering::SeqCst);
    let response = engine
        .answer("korea", "What is the capital of South Korea?")
        .await
        .unwrap();
    assert!(response.answer.contains("Seoul"));
}

#[tokio::test]
async fn test_build_timeout_keeps_previous_index() {
    let embedder = Arc::new(TopicEmbedder::default());
    let config = RetrievalConfig {
        build_timeout_secs: 1,
        ..small_chunks()
    };
    let engine = engine_with(config, embedder.clone(), Arc::new(EchoGenerator::default()));
    engine.ingest(Document::new("docs", CAPITALS)).await.unwrap();

    embedder.stalled.store(true, Ordering::SeqCst);
    let err = engine
        .ingest(Document::new("docs", "never finishes"))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingService(msg) if msg.contains("timed out")));
    assert_eq!(engine.corpus("docs").unwrap().version, 1);
}

#[tokio::test]
async fn test_dropped_build_releases_lock_and_keeps_index() {
    let embedder = Arc::new(TopicEmbedder::default());
    let engine = engine_with(small_chunks(), embedder.clone(), Arc::new(EchoGenerator::default()));
    engine.ingest(Document::new("docs", CAPITALS)).await.unwrap();

    embedder.stalled.store(true, Ordering::SeqCst);
    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        engine.ingest(Document::new("docs", "abandoned")),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(engine.corpus("docs").unwrap().version, 1);

    embedder.stalled.store(false, Ordering::SeqCst);
    let info = engine
        .ingest(Document::new("docs", "Busan has beaches."))
        .await
        .unwrap();
    assert_eq!(info.version, 2);
}

#[tokio::test]
async fn test_concurrent_ingests_of_one_corpus_serialize() {
    let engine = Arc::new(engine());
    let a = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.ingest(Document::new("docs", CAPITALS)).await })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.ingest(Document::new("docs", "Busan has beaches.")).await })
    };

    let mut versions = vec![
        a.await.unwrap().unwrap().version,
        b.await.unwrap().unwrap().version,
    ];
    versions.sort();
    assert_eq!(versions, vec![1, 2]);
    assert_eq!(engine.corpus("docs").unwrap().version, 2);
}

#[tokio::test]
async fn test_corpora_are_independent() {
    let engine = engine();
    engine.ingest(Document::new("korea", CAPITALS)).await.unwrap();
    engine
        .ingest(Document::new("pasta", "Boil water. Add salt. Cook the pasta."))
        .await
        .unwrap();

    let infos = engine.corpora();
    assert_eq!(infos.len(), 2);
    assert!(infos.iter().all(|i| i.version == 1));

    let results = engine.retrieve("pasta", "capital", 4).await.unwrap();
    assert!(results.iter().all(|r| !r.chunk.text.contains("Seoul")));
}

#[tokio::test]
async fn test_identical_builds_score_identically() {
    let a = engine();
    let b = engine();
    a.ingest(Document::new("korea", CAPITALS)).await.unwrap();
    b.ingest(Document::new("korea", CAPITALS)).await.unwrap();

    let question = "Which city is a major port?";
    let ra = a.retrieve("korea", question, 3).await.unwrap();
    let rb = b.retrieve("korea", question, 3).await.unwrap();
    assert_eq!(ra.len(), rb.len());
    for (x, y) in ra.iter().zip(&rb) {
        assert_eq!(x.chunk, y.chunk);
        assert_eq!(x.score, y.score);
        assert_eq!(x.rank, y.rank);
    }
}

#[tokio::test]
async fn test_korean_corpus_with_particles() {
    let config = RetrievalConfig {
        chunk_size: 16,
        chunk_overlap: 4,
        retry_backoff_ms: 1,
        ..Default::default()
    };
    let engine = engine_with(
        config,
        Arc::new(TopicEmbedder::default()),
        Arc::new(EchoGenerator::default()),
    );
    let text = "사과는 빨간 과일이다.\n\n바나나는 노란 과일이다.\n\n포도는 보라색 과일이다.";
    engine.ingest(Document::new("fruit", text)).await.unwrap();

    let results = engine.retrieve("fruit", "바나나 색깔", 1).await.unwrap();
    assert_eq!(results[0].chunk.text, "바나나는 노란 과일이다.");
}

#[tokio::test]
async fn test_query_handler_uses_default_corpus() {
    let engine = engine();
    engine.ingest(Document::new("default", CAPITALS)).await.unwrap();
    let state = AppState::with_engine(Config::default(), engine);

    let req = QueryRequest {
        question: "What is the capital of South Korea?".to_string(),
        corpus_id: None,
    };
    let Json(resp) = api::query::rag_query(State(state), Json(req))
        .await
        .unwrap_or_else(|_| panic!("query failed"));
    assert!(resp.answer.contains("Seoul"));
}

#[tokio::test]
async fn test_query_handler_error_is_500_with_detail() {
    let state = AppState::with_engine(Config::default(), engine());
    let req = QueryRequest {
        question: "anything".to_string(),
        corpus_id: Some("nowhere".to_string()),
    };
    let resp = match api::query::rag_query(State(state), Json(req)).await {
        Ok(_) => panic!("expected an error"),
        Err(e) => e.into_response(),
    };
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["detail"], "corpus 'nowhere' not found");
}
