use std::collections::HashMap;

use crate::error::{RagError, Result};
use crate::llm::embeddings::{EmbedTask, Embedder};
use crate::models::{Chunk, ChunkId};

/// A chunk embedding, unit length unless the source vector was all zeros.
#[derive(Debug, Clone)]
pub struct SemanticVector {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
}

/// In-memory embedding index with exact cosine search.
pub struct SemanticIndex {
    dimension: usize,
    entries: Vec<SemanticVector>,
    positions: HashMap<ChunkId, usize>,
}

impl SemanticIndex {
    /// Embed every chunk in document role and index the vectors.
    pub async fn build(chunks: &[Chunk], embedder: &dyn Embedder) -> Result<Self> {
        let dimension = embedder.dimension();
        if chunks.is_empty() {
            return Self::from_vectors(dimension, Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts, EmbedTask::Document).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingService(format!(
                "requested {} embeddings, received {}",
                chunks.len(),
                vectors.len()
            )));
        }
        if vectors.iter().flatten().any(|v| !v.is_finite()) {
            return Err(RagError::EmbeddingService(
                "embedding contains non-finite values".into(),
            ));
        }

        let entries = chunks.iter().map(|c| c.id).zip(vectors).collect();
        Self::from_vectors(dimension, entries)
    }

    /// Index precomputed vectors. Every vector must have `dimension` entries.
    pub fn from_vectors(dimension: usize, vectors: Vec<(ChunkId, Vec<f32>)>) -> Result<Self> {
        let mut entries = Vec::with_capacity(vectors.len());
        let mut positions = HashMap::with_capacity(vectors.len());

        for (chunk_id, mut vector) in vectors {
            if vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            l2_normalize(&mut vector);
            positions.insert(chunk_id, entries.len());
            entries.push(SemanticVector { chunk_id, vector });
        }

        Ok(Self {
            dimension,
            entries,
            positions,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored (normalized) vector of a chunk.
    pub fn vector(&self, chunk_id: ChunkId) -> Option<&[f32]> {
        self.positions
            .get(&chunk_id)
            .map(|&pos| self.entries[pos].vector.as_slice())
    }

    /// Cosine similarity between two indexed chunks.
    pub fn similarity(&self, a: ChunkId, b: ChunkId) -> Option<f32> {
        Some(dot(self.vector(a)?, self.vector(b)?))
    }

    /// Top `k` chunks by cosine similarity to `query`, highest first, ties by
    /// lower chunk id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(ChunkId, f32)> = self
            .entries
            .iter()
            .map(|e| (e.chunk_id, dot(&query, &e.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale to unit length in place; a zero vector stays zero.
fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
