use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;

use crate::chunking;
use crate::config::RetrievalConfig;
use crate::error::{RagError, Result};
use crate::llm::embeddings::Embedder;
use crate::llm::generate::Generator;
use crate::llm::{prompt, with_retry, RetryPolicy};
use crate::models::{CorpusInfo, Document, QueryResponse, RetrievalResult};
use crate::search::bm25::{Bm25Params, LexicalIndex};
use crate::search::corpus::CorpusIndex;
use crate::search::hybrid::{FusionConfig, HybridRetriever};
use crate::search::tokenizer::Tokenizer;
use crate::search::tokenizer_for;
use crate::search::vector::SemanticIndex;

/// Owns the built corpus indexes and runs ingestion and question answering.
///
/// Indexes are immutable once built. A rebuild produces a new
/// `Arc<CorpusIndex>` and swaps it in; queries already running keep the
/// snapshot they started with.
pub struct RagEngine {
    config: RetrievalConfig,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    tokenizer: Arc<dyn Tokenizer>,
    corpora: RwLock<HashMap<String, Arc<CorpusIndex>>>,
    /// One build at a time per corpus id
    build_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RagEngine {
    pub fn new(
        config: RetrievalConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        let tokenizer = tokenizer_for(config.tokenizer);
        Ok(Self {
            config,
            embedder,
            generator,
            tokenizer,
            corpora: RwLock::new(HashMap::new()),
            build_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the configured tokenizer. Affects indexes built afterwards.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_retries, self.config.retry_backoff_ms)
    }

    fn build_lock(&self, corpus_id: &str) -> Arc<AsyncMutex<()>> {
        self.build_locks
            .lock()
            .entry(corpus_id.to_string())
            .or_default()
            .clone()
    }

    /// Chunk and index `doc`, replacing any previous index for its corpus id.
    ///
    /// If the build fails, times out or is dropped, the previous index stays
    /// in place.
    pub async fn ingest(&self, doc: Document) -> Result<CorpusInfo> {
        let lock = self.build_lock(&doc.corpus_id);
        let _guard = lock.lock().await;
        let started = Instant::now();
        let corpus_id = doc.corpus_id.clone();

        let chunks = chunking::chunk_document(&doc, &self.config)?;
        tracing::info!(corpus = %corpus_id, chunks = chunks.len(), "Chunked document");

        let lexical_chunks = chunks.clone();
        let tokenizer = Arc::clone(&self.tokenizer);
        let params = Bm25Params {
            k1: self.config.bm25_k1,
            b: self.config.bm25_b,
        };
        let lexical = tokio::task::spawn_blocking(move || {
            LexicalIndex::build(&lexical_chunks, tokenizer, params)
        })
        .await?;

        let timeout = Duration::from_secs(self.config.build_timeout_secs);
        let semantic = tokio::time::timeout(
            timeout,
            with_retry(self.retry_policy(), "corpus embedding", || {
                SemanticIndex::build(&chunks, self.embedder.as_ref())
            }),
        )
        .await
        .map_err(|_| {
            RagError::EmbeddingService(format!(
                "embedding corpus '{corpus_id}' timed out after {}s",
                timeout.as_secs()
            ))
        })??;

        let index = {
            let mut corpora = self.corpora.write();
            let version = corpora.get(&corpus_id).map_or(1, |prev| prev.version + 1);
            let index = Arc::new(CorpusIndex::new(
                corpus_id.clone(),
                version,
                chunks,
                lexical,
                semantic,
            ));
            corpora.insert(corpus_id.clone(), Arc::clone(&index));
            index
        };

        tracing::info!(
            corpus = %corpus_id,
            version = index.version,
            chunks = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Corpus index built"
        );
        Ok(index.info())
    }

    /// Current index snapshot for a corpus.
    pub fn corpus(&self, corpus_id: &str) -> Option<Arc<CorpusIndex>> {
        self.corpora.read().get(corpus_id).cloned()
    }

    /// Summaries of all built corpora, ordered by id.
    pub fn corpora(&self) -> Vec<CorpusInfo> {
        let mut infos: Vec<CorpusInfo> = self.corpora.read().values().map(|c| c.info()).collect();
        infos.sort_by(|a, b| a.corpus_id.cmp(&b.corpus_id));
        infos
    }

    /// Drop a corpus index. Returns whether it existed.
    ///
    /// The corpus' build lock is released too unless a build still holds it.
    pub fn remove(&self, corpus_id: &str) -> bool {
        let removed = self.corpora.write().remove(corpus_id).is_some();
        {
            let mut locks = self.build_locks.lock();
            if locks
                .get(corpus_id)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                locks.remove(corpus_id);
            }
        }
        if removed {
            tracing::info!(corpus = %corpus_id, "Corpus index removed");
        }
        removed
    }

    /// Hybrid retrieval against the current snapshot of a corpus.
    pub async fn retrieve(
        &self,
        corpus_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let index = self
            .corpus(corpus_id)
            .ok_or_else(|| RagError::CorpusNotFound(corpus_id.to_string()))?;
        let retriever = HybridRetriever::new(
            index,
            Arc::clone(&self.embedder),
            FusionConfig::from(&self.config),
        )?;
        with_retry(self.retry_policy(), "query retrieval", || {
            retriever.retrieve(query, k)
        })
        .await
    }

    /// Retrieve the top passages for `question` and ask the generator for an answer.
    pub async fn answer(&self, corpus_id: &str, question: &str) -> Result<QueryResponse> {
        let results = self.retrieve(corpus_id, question, self.config.top_k).await?;
        tracing::debug!(corpus = %corpus_id, passages = results.len(), "Retrieved context");

        let context = prompt::build_context(&results);
        let prompt = prompt::build_answer_prompt(self.config.prompt_language, &context, question);
        let answer = with_retry(self.retry_policy(), "answer generation", || {
            self.generator.generate(&prompt)
        })
        .await?;

        Ok(QueryResponse {
            question: question.to_string(),
            context,
            answer,
        })
    }
}
