//! HTTP handlers.

pub mod corpus;
pub mod query;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::RagError;
use crate::state::AppState;

/// All routes, bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rag-query", post(query::rag_query))
        .route("/api/corpus", get(corpus::list_corpora))
        .route("/api/corpus", post(corpus::ingest_corpus))
        .with_state(state)
}

/// Error response body: every failure is a 500 with the error description.
pub struct ApiError(RagError);

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(kind = self.0.kind(), "Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.0.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_kind_maps_to_500() {
        let errors = [
            RagError::Config("bad".into()),
            RagError::EmptyCorpus("c".into()),
            RagError::CorpusNotFound("c".into()),
            RagError::EmbeddingService("down".into()),
        ];
        for e in errors {
            let resp = ApiError::from(e).into_response();
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
