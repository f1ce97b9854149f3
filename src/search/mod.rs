//! Lexical and semantic indexes and the hybrid retriever that fuses them.

pub mod bm25;
pub mod corpus;
pub mod hybrid;
pub mod tokenizer;
pub mod vector;

use std::sync::Arc;

use crate::config::TokenizerKind;
use tokenizer::{AnalyzerTokenizer, Tokenizer};

/// Tokenizer for a configured kind.
pub fn tokenizer_for(kind: TokenizerKind) -> Arc<dyn Tokenizer> {
    match kind {
        TokenizerKind::Multilingual => Arc::new(AnalyzerTokenizer::multilingual()),
        TokenizerKind::Simple => Arc::new(AnalyzerTokenizer::simple()),
    }
}
