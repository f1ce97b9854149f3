use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Provider;
use crate::config::LlmConfig;
use crate::error::{RagError, Result};

/// Maximum characters sent per text to the embedding API.
/// Chunks are far below this; it only bounds pathological queries.
const MAX_EMBED_CHARS: usize = 3_000;

const OLLAMA_BATCH_SIZE: usize = 32;
const OPENAI_BATCH_SIZE: usize = 64;

/// Which side of retrieval a text is embedded for. Asymmetric models expect
/// different instruction prefixes for queries and passages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    Query,
    Document,
}

/// Text embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>>;

    /// Dimension of every returned vector.
    fn dimension(&self) -> usize;

    fn model(&self) -> &str;
}

/// Truncate `text` to at most `MAX_EMBED_CHARS` characters.
fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBED_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Embedder backed by an Ollama or OpenAI-compatible HTTP API.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
    provider: Provider,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Result<Self> {
        let provider = Provider::parse(&config.provider)?;
        if config.embedding_dim == 0 {
            return Err(RagError::Config("embedding dimension must be positive".into()));
        }
        Ok(Self {
            client,
            config,
            provider,
        })
    }

    fn prepare(&self, texts: &[String], task: EmbedTask) -> Vec<String> {
        let prefix = match task {
            EmbedTask::Query => &self.config.query_prefix,
            EmbedTask::Document => &self.config.document_prefix,
        };
        texts
            .iter()
            .map(|t| format!("{prefix}{}", truncate_for_embedding(t)))
            .collect()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs = self.prepare(texts, task);
        let vectors = match self.provider {
            Provider::Ollama => embed_ollama(&self.client, &self.config, &inputs).await?,
            Provider::OpenAi => embed_openai(&self.client, &self.config, &inputs).await?,
        };

        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingService(format!(
                "requested {} embeddings, received {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn model(&self) -> &str {
        &self.config.embedding_model
    }
}

fn service_error(context: &str, e: impl std::fmt::Display) -> RagError {
    RagError::EmbeddingService(format!("{context}: {e}"))
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Truncate over-long inputs server-side instead of failing.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", config.base_url);
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(OLLAMA_BATCH_SIZE) {
        let req = OllamaEmbedRequest {
            model: config.embedding_model.clone(),
            input: batch.to_vec(),
            truncate: true,
        };

        let resp = client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| service_error("failed to call Ollama embed API", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingService(format!(
                "Ollama embed API returned {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .map_err(|e| service_error("failed to parse Ollama embed response", e))?;

        all_embeddings.extend(body.embeddings);
    }

    Ok(all_embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(OPENAI_BATCH_SIZE) {
        let req = OpenAiEmbedRequest {
            model: config.embedding_model.clone(),
            input: batch.to_vec(),
        };

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .map_err(|e| service_error("failed to call OpenAI embed API", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingService(format!(
                "OpenAI embed API returned {status}: {body}"
            )));
        }

        let body: OpenAiEmbedResponse = resp
            .json()
            .await
            .map_err(|e| service_error("failed to parse OpenAI embed response", e))?;

        all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
    }

    Ok(all_embeddings)
}
