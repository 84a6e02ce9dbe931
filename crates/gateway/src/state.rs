use std::sync::Arc;

use wb_archive::ArchiveStore;
use wb_domain::config::EngineConfig;
use wb_engine::{EventBus, Orchestrator, RunRegistry};
use wb_llm::LlmClient;
use wb_wiki::WikiSource;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub wiki: Arc<WikiSource>,
    /// Process-wide default client, built from the server's own API key (if any).
    /// `GET /models` and any run without its own `api_key` use this.
    pub llm: Arc<LlmClient>,
    pub archive: Arc<ArchiveStore>,
    pub events: EventBus,
    pub registry: RunRegistry,
    pub orchestrator: Arc<Orchestrator>,

    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
