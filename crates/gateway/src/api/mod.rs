pub mod archives;
pub mod auth;
pub mod models;
pub mod runs;
pub mod wiki;
pub mod ws;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Every route is gated behind the `WIKIBENCH_API_TOKEN` bearer-token
/// middleware uniformly — this surface has no health-probe-style endpoint
/// worth exempting, unlike a typical public/protected split.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/models", get(models::list_models))
        .route("/wiki/validate", get(wiki::validate))
        .route("/wiki/random", get(wiki::random))
        .route("/runs", post(runs::create_run))
        .route("/runs/:run_id/stop", post(runs::stop_run))
        .route("/archives", get(archives::list_archives))
        .route("/archives/:run_id", get(archives::get_archive))
        .route("/live/:run_id", get(ws::live))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
