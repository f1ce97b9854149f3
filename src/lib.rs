//! # corpus-qa
//!
//! Question answering over a fixed document corpus. Documents are chunked
//! and indexed once per corpus version; each question is answered from the
//! passages a hybrid lexical + semantic retriever selects.
//!
//! ## Architecture
//!
//! ```text
//!   Document ──► Chunker ──► chunks ──┬──► BM25 index ─────┐
//!                                     │                    ├─► CorpusIndex (v1, v2, ...)
//!                                     └──► Embedding index ┘         │
//!                                                                    │ Arc snapshot
//!                          ┌─────────────┐                           ▼
//!                          │  Question   │──────────────► ┌──────────────────────┐
//!                          └─────────────┘                │   Hybrid retriever   │
//!                                                         │ BM25 ∥ query embed   │
//!                                                         │ union top fetch_k    │
//!                                                         │ min-max, 0.5 / 0.5   │
//!                                                         │ MMR pick k of 2k     │
//!                                                         └──────────┬───────────┘
//!                                                                    │ ranked passages
//!                                                                    ▼
//!                                                         ┌──────────────────────┐
//!                                                         │ Prompt + generation  │
//!                                                         └──────────┬───────────┘
//!                                                                    ▼
//!                                                        {question, context, answer}
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for retrieval tuning and LLM settings
//! - [`error`] - `RagError` taxonomy shared by every component
//! - [`models`] - Shared data types: `Document`, `Chunk`, `RetrievalResult`, request/response types
//! - [`chunking`] - Recursive separator splitter with bounded overlap
//! - [`search::tokenizer`] - tantivy analyzer with CJK bigram expansion
//! - [`search::bm25`] - In-memory BM25 scoring over chunks
//! - [`search::vector`] - Normalized embedding index with exact cosine search
//! - [`search::hybrid`] - Min-max fusion of both signals plus MMR diversification
//! - [`llm::embeddings`] - Embedding service trait and Ollama / OpenAI client
//! - [`llm::generate`] - Answer generation trait and Ollama / OpenAI client
//! - [`llm::prompt`] - Answer prompt templates
//! - [`engine`] - Corpus registry, atomic rebuilds, retries and question answering
//! - [`api`] - Axum handlers for `/rag-query` and corpus management
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
