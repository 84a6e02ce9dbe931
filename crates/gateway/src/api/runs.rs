use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;
use uuid::Uuid;
use wb_domain::event::RunEvent;
use wb_domain::model::RunConfig;

use crate::state::AppState;

/// POST /runs — register a run, then start orchestration in the background
/// once the first `/live/{run_id}` subscriber connects (or the connect
/// timeout elapses). Returns immediately; progress streams over the
/// WebSocket.
pub async fn create_run(State(state): State<AppState>, Json(config): Json<RunConfig>) -> impl IntoResponse {
    let run_id = Uuid::new_v4();
    let cancel = state.registry.register(run_id);
    state.events.register(run_id);
    state.events.emit(RunEvent::RunCreated { run_id });

    let connect_timeout = Duration::from_secs(state.config.run_defaults.connect_timeout_secs);
    let events = state.events.clone();
    let registry = state.registry.clone();
    let orchestrator = state.orchestrator.clone();

    tokio::spawn(async move {
        events.await_ready(run_id, connect_timeout).await;
        events.emit(RunEvent::ReadyToStart { run_id });
        orchestrator.run(run_id, config, cancel).await;
        events.cleanup(run_id);
        registry.remove(run_id);
    });

    (
        StatusCode::OK,
        Json(json!({ "message": "Benchmark started", "run_id": run_id })),
    )
}

/// POST /runs/{run_id}/stop
pub async fn stop_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> impl IntoResponse {
    if !state.registry.request_stop(run_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "run not found or already finished" })),
        )
            .into_response();
    }

    state.events.emit(RunEvent::StopRequested { run_id });
    Json(json!({ "message": "stop requested" })).into_response()
}
