use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::RagEngine;
use crate::llm::embeddings::{Embedder, HttpEmbedder};
use crate::llm::generate::{Generator, HttpGenerator};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<RagEngine>,
}

impl AppState {
    /// Wire the HTTP-backed model clients into a fresh engine.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()?;

        let embedder: Arc<dyn Embedder> =
            Arc::new(HttpEmbedder::new(http_client.clone(), config.llm.clone())?);
        let generator: Arc<dyn Generator> =
            Arc::new(HttpGenerator::new(http_client, config.llm.clone())?);

        let engine = RagEngine::new(config.retrieval.clone(), embedder, generator)?;
        Ok(Self::with_engine(config, engine))
    }

    pub fn with_engine(config: Config, engine: RagEngine) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        }
    }
}
