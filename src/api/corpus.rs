use axum::extract::State;
use axum::Json;

use super::ApiError;
use crate::models::{CorpusInfo, Document, IngestRequest};
use crate::state::AppState;

/// GET /api/corpus - List built corpora
pub async fn list_corpora(State(state): State<AppState>) -> Json<Vec<CorpusInfo>> {
    Json(state.engine.corpora())
}

/// POST /api/corpus - Chunk and index a document, replacing the corpus' previous index
pub async fn ingest_corpus(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<CorpusInfo>, ApiError> {
    let info = state.engine.ingest(Document::from(req)).await?;
    Ok(Json(info))
}
