use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub url: String,
}

/// GET /wiki/validate?url=<wikipedia article url>
pub async fn validate(State(state): State<AppState>, Query(q): Query<ValidateQuery>) -> Json<serde_json::Value> {
    match state.wiki.validate_url(&q.url).await {
        Ok(title) => Json(json!({ "valid": true, "title": title })),
        Err(e) => Json(json!({ "valid": false, "error": e.to_string() })),
    }
}

/// GET /wiki/random
pub async fn random(State(state): State<AppState>) -> impl IntoResponse {
    match state.wiki.random_page().await {
        Ok((title, url)) => Json(json!({ "title": title, "url": url })).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
