//! Text chunking: recursive separator fallback with bounded overlap.

pub mod recursive;

pub use recursive::split;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::models::{Chunk, Document};

/// Chunk a document with the configured size and overlap.
pub fn chunk_document(doc: &Document, config: &RetrievalConfig) -> Result<Vec<Chunk>> {
    split(&doc.text, config.chunk_size, config.chunk_overlap)
}
