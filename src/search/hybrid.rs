use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::corpus::CorpusIndex;
use crate::config::{validate_fusion, RetrievalConfig};
use crate::error::{RagError, Result};
use crate::llm::embeddings::{EmbedTask, Embedder};
use crate::models::{ChunkId, RetrievalResult};

/// Weights and pool sizes for merging the lexical and semantic rankings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub lexical_weight: f32,
    pub semantic_weight: f32,
    /// 1.0 ranks purely by relevance, 0.0 purely by novelty
    pub mmr_lambda: f32,
    /// Per-signal candidates gathered before fusion; at least `2 * k` is used
    pub candidate_pool: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            lexical_weight: 0.5,
            semantic_weight: 0.5,
            mmr_lambda: 0.5,
            candidate_pool: 20,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        validate_fusion(self.lexical_weight, self.semantic_weight, self.mmr_lambda)
    }
}

impl From<&RetrievalConfig> for FusionConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            lexical_weight: config.lexical_weight,
            semantic_weight: config.semantic_weight,
            mmr_lambda: config.mmr_lambda,
            candidate_pool: config.candidate_pool,
        }
    }
}

/// A fused candidate: normalized signals and their weighted sum.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: ChunkId,
    lexical: f32,
    semantic: f32,
    combined: f32,
}

/// Queries one corpus index with both signals and merges the rankings.
///
/// Pipeline:
/// 1. BM25 over all chunks (blocking pool) concurrently with query embedding.
/// 2. Union of the top `fetch_k` chunks of each signal, `fetch_k = max(pool, 2k)`.
/// 3. Min-max normalize each signal over the candidates, then weighted sum.
/// 4. Keep the top `2k` by fused score and pick `k` of them with MMR.
pub struct HybridRetriever {
    index: Arc<CorpusIndex>,
    embedder: Arc<dyn Embedder>,
    config: FusionConfig,
}

impl HybridRetriever {
    pub fn new(
        index: Arc<CorpusIndex>,
        embedder: Arc<dyn Embedder>,
        config: FusionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index,
            embedder,
            config,
        })
    }

    /// Up to `k` chunks most relevant to `query`, in selection order.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if self.index.is_empty() {
            return Err(RagError::EmptyCorpus(self.index.corpus_id.clone()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let index = Arc::clone(&self.index);
        let owned_query = query.to_string();
        let lexical_task =
            tokio::task::spawn_blocking(move || index.lexical.score_query(&owned_query));
        let texts = [query.to_string()];
        let embed_task = self.embedder.embed(&texts, EmbedTask::Query);

        let (lexical, embedded) = tokio::join!(lexical_task, embed_task);
        let lexical = lexical?;
        let query_vector = embedded?.into_iter().next().ok_or_else(|| {
            RagError::EmbeddingService("no embedding returned for query".into())
        })?;

        let semantic: HashMap<ChunkId, f32> = self
            .index
            .semantic
            .search(&query_vector, self.index.len())?
            .into_iter()
            .collect();

        let fetch_k = self.config.candidate_pool.max(2 * k);
        let candidates = self.fuse(&lexical, &semantic, fetch_k, 2 * k);
        tracing::debug!(
            corpus = %self.index.corpus_id,
            fetch_k,
            candidates = candidates.len(),
            "Fused lexical and semantic candidates"
        );

        let selected = self.select_mmr(&candidates, k);
        selected
            .into_iter()
            .enumerate()
            .map(|(pos, c)| {
                let chunk = self.index.chunk(c.id).cloned().ok_or_else(|| {
                    RagError::Internal(format!("chunk {} missing from index", c.id))
                })?;
                Ok(RetrievalResult {
                    chunk,
                    score: c.combined,
                    rank: pos + 1,
                    lexical_score: c.lexical,
                    semantic_score: c.semantic,
                })
            })
            .collect()
    }

    /// Build the candidate set and return it ordered by fused score (ties by
    /// lower id), truncated to `keep`.
    fn fuse(
        &self,
        lexical: &HashMap<ChunkId, f32>,
        semantic: &HashMap<ChunkId, f32>,
        fetch_k: usize,
        keep: usize,
    ) -> Vec<Candidate> {
        let mut ids: BTreeSet<ChunkId> = top_ids(lexical, fetch_k).into_iter().collect();
        ids.extend(top_ids(semantic, fetch_k));

        let raw: Vec<(ChunkId, f32, f32)> = ids
            .into_iter()
            .map(|id| {
                let lex = lexical.get(&id).copied().unwrap_or(0.0);
                let sem = semantic.get(&id).copied().unwrap_or(0.0);
                (id, lex, sem)
            })
            .collect();

        let lex_norm = min_max(raw.iter().map(|r| r.1));
        let sem_norm = min_max(raw.iter().map(|r| r.2));

        let mut candidates: Vec<Candidate> = raw
            .iter()
            .map(|&(id, lex, sem)| {
                let lexical = lex_norm(lex);
                let semantic = sem_norm(sem);
                Candidate {
                    id,
                    lexical,
                    semantic,
                    combined: self.config.lexical_weight * lexical
                        + self.config.semantic_weight * semantic,
                }
            })
            .collect();

        candidates.sort_by(|a, b| b.combined.total_cmp(&a.combined).then(a.id.cmp(&b.id)));
        candidates.truncate(keep);
        candidates
    }

    /// Greedy maximal marginal relevance over candidates already in fused order.
    fn select_mmr(&self, candidates: &[Candidate], k: usize) -> Vec<Candidate> {
        let lambda = self.config.mmr_lambda;
        let mut remaining: Vec<Candidate> = candidates.to_vec();
        let mut selected: Vec<Candidate> = Vec::with_capacity(k.min(candidates.len()));

        while selected.len() < k && !remaining.is_empty() {
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (pos, candidate) in remaining.iter().enumerate() {
                let redundancy = if selected.is_empty() {
                    0.0
                } else {
                    selected
                        .iter()
                        .map(|s| {
                            self.index
                                .semantic
                                .similarity(candidate.id, s.id)
                                .unwrap_or(0.0)
                        })
                        .fold(f32::NEG_INFINITY, f32::max)
                };
                let score = lambda * candidate.combined - (1.0 - lambda) * redundancy;
                // Strict comparison keeps the earlier candidate on ties.
                if score > best_score {
                    best = pos;
                    best_score = score;
                }
            }
            selected.push(remaining.remove(best));
        }

        selected
    }
}

/// Ids of the `n` highest scores, ties by lower id.
fn top_ids(scores: &HashMap<ChunkId, f32>, n: usize) -> Vec<ChunkId> {
    let mut ranked: Vec<(ChunkId, f32)> = scores.iter().map(|(&id, &s)| (id, s)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(id, _)| id).collect()
}

/// Min-max scaler over `values`; maps everything to 0.0 when the range is zero.
fn min_max(values: impl Iterator<Item = f32>) -> impl Fn(f32) -> f32 {
    let (min, max) = values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = max - min;
    move |v| {
        if range > 0.0 {
            (v - min) / range
        } else {
            0.0
        }
    }
}
