/// Shared error type used across the benchmark engine crates.
///
/// `PageNotFound` is the one variant the orchestrator treats as routine —
/// everything else aborts the current model or the whole run.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wiki page not found: {0}")]
    PageNotFound(String),

    #[error("wiki fetch failed: {0}")]
    Wiki(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("LLM: {0}")]
    Llm(String),

    #[error("archive: {0}")]
    Archive(String),

    #[error("config: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
