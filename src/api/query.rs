use axum::extract::State;
use axum::Json;

use super::ApiError;
use crate::models::{QueryRequest, QueryResponse};
use crate::state::AppState;

/// POST /rag-query - Retrieve context for the question and synthesize an answer
pub async fn rag_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let corpus_id = req
        .corpus_id
        .as_deref()
        .unwrap_or(&state.config.default_corpus);

    tracing::info!(corpus = %corpus_id, "Answering question");
    let response = state.engine.answer(corpus_id, &req.question).await?;
    Ok(Json(response))
}
