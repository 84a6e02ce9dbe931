use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, Method};
use clap::Parser;
use sha2::{Digest, Sha256};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use wb_archive::ArchiveStore;
use wb_domain::config::EngineConfig;
use wb_engine::{EventBus, Orchestrator, RunRegistry};
use wb_gateway::api;
use wb_gateway::cli::{Cli, Command};
use wb_gateway::state::AppState;
use wb_llm::LlmClient;
use wb_wiki::WikiSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            init_tracing();
            run_server("127.0.0.1".to_string(), 8000).await
        }
        Some(Command::Serve { host, port }) => {
            init_tracing();
            run_server(host, port).await
        }
        Some(Command::Version) => {
            println!("wikibench {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,wb_gateway=debug")))
        .json()
        .init();
}

async fn run_server(host: String, port: u16) -> anyhow::Result<()> {
    tracing::info!("wikibench gateway starting");

    let config = Arc::new(EngineConfig::from_env());

    let wiki = Arc::new(WikiSource::from_config(&config.wiki).context("building wiki client")?);
    let llm = Arc::new(LlmClient::from_config(&config.llm).context("building LLM client")?);
    let archive =
        Arc::new(ArchiveStore::new(config.archive.base_path.as_str()).context("initializing archive store")?);
    let events = EventBus::new();
    let registry = RunRegistry::new();

    let orchestrator = Arc::new(Orchestrator::new(
        wiki.clone(),
        llm.clone(),
        config.llm.clone(),
        archive.clone(),
        events.clone(),
        config.run_defaults.history_size,
    ));

    let api_token_hash = std::env::var("WIKIBENCH_API_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .map(|t| Sha256::digest(t.as_bytes()).to_vec());
    if api_token_hash.is_none() {
        tracing::warn!("WIKIBENCH_API_TOKEN not set — running without API authentication");
    }

    let state = AppState {
        config,
        wiki,
        llm,
        archive,
        events,
        registry,
        orchestrator,
        api_token_hash,
    };

    let cors_layer = build_cors_layer();
    let app = api::router(state.clone()).with_state(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "wikibench gateway listening");

    axum::serve(listener, app.layer(cors_layer)).await.context("axum server error")?;

    Ok(())
}

/// Allow any origin — the dashboard is expected to run on an arbitrary local
/// port during development. `allow_credentials` is deliberately left off
/// since a wildcard origin can't carry credentials anyway.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
