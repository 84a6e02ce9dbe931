use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything needed to start a benchmark run: the model roster and the
/// start/target pair, plus the per-run overrides of the engine defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub models: Vec<String>,
    pub start_page: String,
    pub target_page: String,
    #[serde(default = "d_max_steps")]
    pub max_steps: u32,
    #[serde(default = "d_max_loops")]
    pub max_loops: u32,
    #[serde(default = "d_max_hallucination_retries")]
    pub max_hallucination_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,
    #[serde(default = "d_true")]
    pub use_structured_output: bool,
}

fn d_max_steps() -> u32 {
    20
}
fn d_max_loops() -> u32 {
    3
}
fn d_max_hallucination_retries() -> u32 {
    3
}
fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wiki page
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An anonymized Wikipedia page: the extract has every outgoing link
/// rewritten to `[CONCEPT_NN: Title]`, and `mapping` recovers the real
/// title behind each concept id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiPage {
    pub title: String,
    pub extract: String,
    pub links: Vec<String>,
    #[serde(default)]
    pub mapping: HashMap<String, String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One click in a model's navigation path, good or bad. `is_404` and
/// `is_hallucination` are never both set — a missing page short-circuits
/// before the model is asked to choose anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_index: u32,
    pub page_title: String,
    /// The full prompt sent to the model for this step (empty for a 404
    /// backtrack, which never reaches the adapter).
    #[serde(default)]
    pub prompt: String,
    /// The model's raw reply, unparsed (empty for a 404 backtrack).
    #[serde(default)]
    pub raw_response: String,
    /// The mapping exactly as shown to the model — after excluded-link
    /// filtering. Empty for a 404 backtrack.
    #[serde(default)]
    pub mapping: HashMap<String, String>,
    /// Wall-clock seconds spent waiting on the LLM call for this step. Zero
    /// for a 404 backtrack, which never calls the adapter.
    #[serde(default)]
    pub llm_duration: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub intuition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_concept_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_page_title: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    /// Set alongside `is_hallucination` — this record is a repeated attempt
    /// at the same page, not a fresh one.
    #[serde(default)]
    pub is_retry: bool,
    #[serde(default)]
    pub is_hallucination: bool,
    #[serde(default)]
    pub is_404: bool,
    #[serde(default)]
    pub is_final_target: bool,
    #[serde(default)]
    pub parsing_method: ParsingMethod,
    #[serde(default)]
    pub structured_parsing_success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// How the chosen concept id was recovered from the model's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingMethod {
    /// Parsed via the schema-validated structured output path.
    Structured,
    /// Recovered from free text via `NEXT_CLICK:\s*(CONCEPT_\d+)`.
    Regex,
    /// Recovered from free text via a bare `CONCEPT_\d+` scan (no provider structured support).
    LegacyRegex,
    /// No concept id could be recovered from the reply.
    Failed,
    /// Not applicable — e.g. a 404 backtrack step.
    #[default]
    None,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Metrics & summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Terminal status of a single model's run against one start/target pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRunStatus {
    Success,
    Failed,
    Stopped,
}

/// Per-model outcome of a benchmark run, persisted to the archive and
/// streamed to subscribers as `model_complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model: String,
    pub status: ModelRunStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    pub total_clicks: u32,
    pub total_retries: u32,
    pub hallucination_count: u32,
    pub hallucination_rate: f64,
    pub structured_parsing_success_count: u32,
    pub structured_success_rate: f64,
    /// Total wall time for this model's run, in seconds.
    #[serde(default)]
    pub total_duration: f64,
    /// Mean LLM call latency across steps that actually called the adapter,
    /// in seconds. Zero when no call was made (e.g. an immediate 404 on the
    /// start page).
    #[serde(default)]
    pub avg_llm_duration: f64,
    pub path: Vec<String>,
}

/// Whole-run roll-up across every model in the roster, written as
/// `summary.json` at the archive root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub start_page: String,
    pub target_page: String,
    pub total_models: u32,
    pub completed: u32,
    pub failed: u32,
    pub stopped: u32,
    pub models: Vec<ModelMetrics>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}
