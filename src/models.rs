use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Position of a chunk in its corpus' chunk sequence.
pub type ChunkId = u64;

/// Raw text supplied for indexing under a corpus id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub corpus_id: String,
    pub text: String,
}

impl Document {
    pub fn new(corpus_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            corpus_id: corpus_id.into(),
            text: text.into(),
        }
    }

    /// Read a UTF-8 text file as a document.
    pub fn from_file(corpus_id: impl Into<String>, path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(corpus_id, text))
    }
}

/// A bounded passage of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    /// Char offset of the first character in the source document.
    pub source_offset: usize,
}

/// One ranked passage returned by the hybrid retriever
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    /// Fused relevance after normalization and weighting
    pub score: f32,
    /// 1-based position in the returned list
    pub rank: usize,
    /// Normalized lexical component
    pub lexical_score: f32,
    /// Normalized semantic component
    pub semantic_score: f32,
}

/// Summary of a built corpus index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusInfo {
    pub corpus_id: String,
    pub version: u64,
    pub chunk_count: usize,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
}

/// Question request
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Falls back to the configured default corpus
    #[serde(default)]
    pub corpus_id: Option<String>,
}

/// Answer response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    /// Retrieved passages in rank order, blank-line separated
    pub context: String,
    pub answer: String,
}

/// Ingest request
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub corpus_id: String,
    pub text: String,
}

impl From<IngestRequest> for Document {
    fn from(req: IngestRequest) -> Self {
        Document::new(req.corpus_id, req.text)
    }
}
