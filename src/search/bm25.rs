use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::tokenizer::Tokenizer;
use crate::config::validate_bm25;
use crate::error::Result;
use crate::models::{Chunk, ChunkId};

/// BM25 saturation (`k1`) and length normalization (`b`) parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<()> {
        validate_bm25(self.k1, self.b)
    }
}

/// In-memory BM25 index over one corpus' chunks.
pub struct LexicalIndex {
    tokenizer: Arc<dyn Tokenizer>,
    params: Bm25Params,
    ids: Vec<ChunkId>,
    /// Term frequencies per chunk, parallel with `ids`
    term_freqs: Vec<HashMap<String, u32>>,
    lengths: Vec<usize>,
    /// Number of chunks containing each term
    doc_freqs: HashMap<String, usize>,
    avg_len: f32,
}

impl LexicalIndex {
    pub fn build(chunks: &[Chunk], tokenizer: Arc<dyn Tokenizer>, params: Bm25Params) -> Self {
        let mut ids = Vec::with_capacity(chunks.len());
        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut lengths = Vec::with_capacity(chunks.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for chunk in chunks {
            let tokens = tokenizer.tokenize(&chunk.text);
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            ids.push(chunk.id);
            lengths.push(tokens.len());
            term_freqs.push(tf);
        }

        let avg_len = if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f32 / lengths.len() as f32
        };

        Self {
            tokenizer,
            params,
            ids,
            term_freqs,
            lengths,
            doc_freqs,
            avg_len,
        }
    }

    /// Inverse document frequency; never negative.
    fn idf(&self, term: &str) -> f32 {
        let n = self.ids.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// BM25 score of every chunk for already-tokenized query terms.
    /// Repeated query terms contribute once per occurrence.
    pub fn score(&self, query_tokens: &[String]) -> HashMap<ChunkId, f32> {
        let mut scores: HashMap<ChunkId, f32> = self.ids.iter().map(|&id| (id, 0.0)).collect();
        if self.avg_len == 0.0 {
            return scores;
        }

        let Bm25Params { k1, b } = self.params;
        for token in query_tokens {
            if !self.doc_freqs.contains_key(token) {
                continue;
            }
            let idf = self.idf(token);
            for (pos, tf) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = tf.get(token) else {
                    continue;
                };
                let tf = tf as f32;
                let norm = 1.0 - b + b * self.lengths[pos] as f32 / self.avg_len;
                let contribution = idf * tf * (k1 + 1.0) / (tf + k1 * norm);
                if let Some(score) = scores.get_mut(&self.ids[pos]) {
                    *score += contribution;
                }
            }
        }
        scores
    }

    /// Tokenize `query` with the index's tokenizer and score every chunk.
    pub fn score_query(&self, query: &str) -> HashMap<ChunkId, f32> {
        self.score(&self.tokenizer.tokenize(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tokenizer::AnalyzerTokenizer;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                id: i as u64,
                text: t.to_string(),
                source_offset: 0,
            })
            .collect()
    }

    fn index(texts: &[&str]) -> LexicalIndex {
        LexicalIndex::build(
            &chunks(texts),
            Arc::new(AnalyzerTokenizer::multilingual()),
            Bm25Params::default(),
        )
    }

    #[test]
    fn test_every_chunk_scored() {
        let idx = index(&["rust borrow checker", "python garbage collector", "go channels"]);
        let scores = idx.score_query("borrow");
        assert_eq!(scores.len(), 3);
        assert!(scores[&0] > 0.0);
        assert_eq!(scores[&1], 0.0);
        assert_eq!(scores[&2], 0.0);
    }

    #[test]
    fn test_unknown_terms_score_zero() {
        let idx = index(&["alpha beta", "gamma delta"]);
        let scores = idx.score_query("omega");
        assert!(scores.values().all(|&s| s == 0.0));
    }

    #[test]
    fn test_tokenless_chunk_scores_zero() {
        let idx = index(&["rust rust", "!!! ???"]);
        let scores = idx.score_query("rust ???");
        assert!(scores[&0] > 0.0);
        assert_eq!(scores[&1], 0.0);
    }

    #[test]
    fn test_score_non_decreasing_in_term_frequency() {
        // Equal lengths isolate the effect of tf.
        let idx = index(&["rust go go", "rust rust go", "rust rust rust", "java kotlin scala"]);
        let scores = idx.score_query("rust");
        assert!(scores[&0] <= scores[&1]);
        assert!(scores[&1] <= scores[&2]);
        assert!(scores[&0] > 0.0);
    }

    #[test]
    fn test_repeated_query_terms_accumulate() {
        let idx = index(&["rust borrow checker", "python"]);
        let once = idx.score(&["rust".to_string()]);
        let twice = idx.score(&["rust".to_string(), "rust".to_string()]);
        assert!((twice[&0] - 2.0 * once[&0]).abs() < 1e-6);
    }

    #[test]
    fn test_idf_positive_for_ubiquitous_term() {
        let idx = index(&["common word", "common thing", "common stuff"]);
        let scores = idx.score_query("common");
        assert!(scores.values().all(|&s| s > 0.0));
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let idx = index(&["apple banana", "apple cherry", "apple durian"]);
        let scores = idx.score_query("apple cherry");
        assert!(scores[&1] > scores[&0]);
        assert!((scores[&0] - scores[&2]).abs() < 1e-6);
    }

    #[test]
    fn test_korean_particles_matched_via_bigrams() {
        let idx = index(&["사과는 맛있다", "바나나는 노랗다", "사과 주스"]);
        let scores = idx.score_query("사과");
        assert!(scores[&0] > 0.0);
        assert!(scores[&2] > 0.0);
        assert_eq!(scores[&1], 0.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let texts = ["the quick brown fox", "jumps over the lazy dog", "the end"];
        let a = index(&texts).score_query("the lazy fox");
        let b = index(&texts).score_query("the lazy fox");
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_index() {
        assert!(index(&[]).score_query("anything").is_empty());
    }

    #[test]
    fn test_params_validate() {
        assert!(Bm25Params::default().validate().is_ok());
        assert!(Bm25Params { k1: -1.0, b: 0.5 }.validate().is_err());
        assert!(Bm25Params { k1: 1.2, b: 1.01 }.validate().is_err());
    }
}
