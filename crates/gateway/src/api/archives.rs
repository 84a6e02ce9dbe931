use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// GET /archives
pub async fn list_archives(State(state): State<AppState>) -> impl IntoResponse {
    match state.archive.list_archives() {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /archives/{run_id}
pub async fn get_archive(State(state): State<AppState>, Path(run_id): Path<uuid::Uuid>) -> impl IntoResponse {
    match state.archive.get_archive_details(run_id) {
        Ok(Some(details)) => Json(details).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "archive not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
