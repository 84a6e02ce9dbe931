use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// GET /models — proxies the configured LLM provider's model listing.
///
/// Mirrors the upstream behavior of refusing the call outright when the
/// server has no API key configured, rather than forwarding an
/// unauthenticated request that the provider would reject anyway.
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    if state.config.llm.api_key.is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "no API key configured" })),
        )
            .into_response();
    }

    match state.llm.list_models().await {
        Ok(models) => Json(models).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
