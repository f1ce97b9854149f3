use chrono::{DateTime, Utc};

use super::bm25::LexicalIndex;
use super::vector::SemanticIndex;
use crate::models::{Chunk, CorpusInfo};

/// Immutable result of one corpus build. Replaced wholesale on rebuild and
/// shared with in-flight queries through an `Arc`.
pub struct CorpusIndex {
    pub corpus_id: String,
    /// Starts at 1 and increases with every successful rebuild
    pub version: u64,
    pub chunks: Vec<Chunk>,
    pub lexical: LexicalIndex,
    pub semantic: SemanticIndex,
    pub built_at: DateTime<Utc>,
}

impl CorpusIndex {
    pub fn new(
        corpus_id: String,
        version: u64,
        chunks: Vec<Chunk>,
        lexical: LexicalIndex,
        semantic: SemanticIndex,
    ) -> Self {
        Self {
            corpus_id,
            version,
            chunks,
            lexical,
            semantic,
            built_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk by id. Ids are positions in the chunk sequence.
    pub fn chunk(&self, id: u64) -> Option<&Chunk> {
        self.chunks.get(id as usize).filter(|c| c.id == id)
    }

    pub fn info(&self) -> CorpusInfo {
        CorpusInfo {
            corpus_id: self.corpus_id.clone(),
            version: self.version,
            chunk_count: self.chunks.len(),
            dimension: self.semantic.dimension(),
            built_at: self.built_at,
        }
    }
}
