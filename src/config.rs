use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RagError, Result};

/// Tolerance when checking that the fusion weights sum to one.
const WEIGHT_SUM_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Plain-text corpus file ingested at startup
    pub corpus_path: Option<PathBuf>,
    /// Corpus id used for startup ingestion and for queries that name none
    pub default_corpus: String,
    /// Chunking, scoring and fusion parameters
    pub retrieval: RetrievalConfig,
    /// LLM provider configuration
    pub llm: LlmConfig,
}

/// Tuning parameters for the retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Maximum shared characters between adjacent chunks
    pub chunk_overlap: usize,
    /// Passages handed to the answer prompt
    pub top_k: usize,
    /// Per-signal candidates gathered before fusion (at least 2 * k is used)
    pub candidate_pool: usize,
    pub lexical_weight: f32,
    pub semantic_weight: f32,
    /// Relevance vs. diversity trade-off for the MMR pass (1.0 = relevance only)
    pub mmr_lambda: f32,
    pub bm25_k1: f32,
    pub bm25_b: f32,
    pub tokenizer: TokenizerKind,
    pub prompt_language: PromptLanguage,
    /// Upper bound on embedding a corpus during a build
    pub build_timeout_secs: u64,
    /// Extra attempts for transient service errors
    pub max_retries: u32,
    /// First retry delay; doubles on each further attempt
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Word segmentation plus character bigrams for CJK / Hangul runs
    Multilingual,
    /// Word segmentation only
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptLanguage {
    English,
    Korean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer generation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
    /// Prepended to queries before embedding
    pub query_prefix: String,
    /// Prepended to chunks before embedding
    pub document_prefix: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            corpus_path: None,
            default_corpus: "default".to_string(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            chunk_overlap: 50,
            top_k: 4,
            candidate_pool: 20,
            lexical_weight: 0.5,
            semantic_weight: 0.5,
            mmr_lambda: 0.5,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            tokenizer: TokenizerKind::Multilingual,
            prompt_language: PromptLanguage::English,
            build_timeout_secs: 300,
            max_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
            query_prefix: "search_query: ".to_string(),
            document_prefix: "search_document: ".to_string(),
            timeout_secs: 120,
        }
    }
}

impl RetrievalConfig {
    /// Reject parameter combinations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_overlap == 0 {
            return Err(RagError::Config(format!(
                "chunk size ({}) and overlap ({}) must be positive",
                self.chunk_size, self.chunk_overlap
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }
        if self.build_timeout_secs == 0 {
            return Err(RagError::Config(
                "build timeout must be at least 1 second".to_string(),
            ));
        }
        validate_fusion(self.lexical_weight, self.semantic_weight, self.mmr_lambda)?;
        validate_bm25(self.bm25_k1, self.bm25_b)
    }
}

pub(crate) fn validate_fusion(lexical: f32, semantic: f32, lambda: f32) -> Result<()> {
    for (name, w) in [("lexical", lexical), ("semantic", semantic)] {
        if !w.is_finite() || !(0.0..=1.0).contains(&w) {
            return Err(RagError::Config(format!(
                "{name} weight must be within [0, 1], got {w}"
            )));
        }
    }
    if (lexical + semantic - 1.0).abs() > WEIGHT_SUM_EPSILON {
        return Err(RagError::Config(format!(
            "fusion weights must sum to 1.0, got {lexical} + {semantic}"
        )));
    }
    if !lambda.is_finite() || !(0.0..=1.0).contains(&lambda) {
        return Err(RagError::Config(format!(
            "MMR lambda must be within [0, 1], got {lambda}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_bm25(k1: f32, b: f32) -> Result<()> {
    if !k1.is_finite() || k1 < 0.0 {
        return Err(RagError::Config(format!("BM25 k1 must be >= 0, got {k1}")));
    }
    if !b.is_finite() || !(0.0..=1.0).contains(&b) {
        return Err(RagError::Config(format!(
            "BM25 b must be within [0, 1], got {b}"
        )));
    }
    Ok(())
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("RAG_CORPUS_PATH") {
            config.corpus_path = Some(PathBuf::from(path));
        }
        if let Ok(id) = std::env::var("RAG_DEFAULT_CORPUS") {
            config.default_corpus = id;
        }

        let r = &mut config.retrieval;
        parse_env("RAG_CHUNK_SIZE", &mut r.chunk_size);
        parse_env("RAG_CHUNK_OVERLAP", &mut r.chunk_overlap);
        parse_env("RAG_TOP_K", &mut r.top_k);
        parse_env("RAG_CANDIDATE_POOL", &mut r.candidate_pool);
        parse_env("RAG_LEXICAL_WEIGHT", &mut r.lexical_weight);
        parse_env("RAG_SEMANTIC_WEIGHT", &mut r.semantic_weight);
        parse_env("RAG_MMR_LAMBDA", &mut r.mmr_lambda);
        parse_env("RAG_BM25_K1", &mut r.bm25_k1);
        parse_env("RAG_BM25_B", &mut r.bm25_b);
        parse_env("RAG_BUILD_TIMEOUT_SECS", &mut r.build_timeout_secs);
        parse_env("RAG_MAX_RETRIES", &mut r.max_retries);
        parse_env("RAG_RETRY_BACKOFF_MS", &mut r.retry_backoff_ms);
        if let Ok(kind) = std::env::var("RAG_TOKENIZER") {
            match kind.to_lowercase().as_str() {
                "simple" => r.tokenizer = TokenizerKind::Simple,
                "multilingual" => r.tokenizer = TokenizerKind::Multilingual,
                other => tracing::warn!("Unknown RAG_TOKENIZER '{other}', keeping default"),
            }
        }
        if let Ok(lang) = std::env::var("RAG_PROMPT_LANGUAGE") {
            match lang.to_lowercase().as_str() {
                "ko" | "korean" => r.prompt_language = PromptLanguage::Korean,
                "en" | "english" => r.prompt_language = PromptLanguage::English,
                other => tracing::warn!("Unknown RAG_PROMPT_LANGUAGE '{other}', keeping default"),
            }
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        parse_env("LLM_EMBEDDING_DIM", &mut config.llm.embedding_dim);
        parse_env("LLM_TIMEOUT_SECS", &mut config.llm.timeout_secs);
        if let Ok(prefix) = std::env::var("EMBED_QUERY_PREFIX") {
            config.llm.query_prefix = prefix;
        }
        if let Ok(prefix) = std::env::var("EMBED_DOCUMENT_PREFIX") {
            config.llm.document_prefix = prefix;
        }

        config
    }
}

/// Overwrite `target` when the variable is set and parses; otherwise keep it.
fn parse_env<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        match val.parse() {
            Ok(v) => *target = v,
            Err(_) => tracing::warn!("Ignoring unparseable {key}={val}"),
        }
    }
}
