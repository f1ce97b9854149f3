use anyhow::Context;
use tracing_subscriber::EnvFilter;

use corpus_qa::api;
use corpus_qa::config::Config;
use corpus_qa::models::Document;
use corpus_qa::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);
    tracing::info!(
        "Embedding model: {} (dim {})",
        config.llm.embedding_model,
        config.llm.embedding_dim
    );

    let state = AppState::new(config.clone())?;

    if let Some(path) = &config.corpus_path {
        let doc = Document::from_file(config.default_corpus.clone(), path)
            .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
        let info = state
            .engine
            .ingest(doc)
            .await
            .with_context(|| format!("Failed to index corpus file {}", path.display()))?;
        tracing::info!(
            "Indexed {} as '{}' ({} chunks)",
            path.display(),
            info.corpus_id,
            info.chunk_count
        );
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
