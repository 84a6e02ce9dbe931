use serde::{Deserialize, Serialize};
use wb_domain::model::ParsingMethod;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token usage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The orchestrator's view of one model turn, already reduced to a single
/// concept id (or none). `raw_content` and `parsing_method` are kept
/// around so a hallucination can still be logged with the model's actual
/// words.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResponse {
    /// The rendered prompt sent to the model, for archival.
    pub prompt: String,
    pub raw_content: String,
    pub intuition: Option<String>,
    pub chosen_concept_id: Option<String>,
    pub confidence: f64,
    pub model: String,
    pub usage: Option<Usage>,
    pub parsing_method: ParsingMethod,
}

impl AdapterResponse {
    pub fn structured_success(&self) -> bool {
        matches!(self.parsing_method, ParsingMethod::Structured)
    }
}
