pub mod adapter;
pub mod parse;
pub mod prompt;
pub mod retry;
pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use wb_domain::config::LlmConfig;
use wb_domain::error::Result;
use wb_domain::model::WikiPage;

use adapter::OpenAiCompatAdapter;
use types::AdapterResponse;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const BACKOFF_JITTER: Duration = Duration::from_millis(100);

/// Thin facade the orchestrator talks to: one page, one model, one concept
/// id out — retry and prompt-shaping are handled internally.
pub struct LlmClient {
    adapter: OpenAiCompatAdapter,
}

impl LlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            adapter: OpenAiCompatAdapter::from_config(config)?,
        })
    }

    /// Ask `model` to pick the next concept id from `page`, given the trail
    /// of page titles visited so far. Retries transient adapter errors with
    /// exponential backoff; a non-transient error (bad model name, auth
    /// failure, malformed config) is returned immediately.
    pub async fn chat_structured(
        &self,
        model: &str,
        target_page: &str,
        page: &WikiPage,
        history_titles: &[String],
    ) -> Result<AdapterResponse> {
        let messages = prompt::build_messages(target_page, page, history_titles);
        let prompt_text = prompt::render_prompt(&messages);

        let mut attempt = 0u32;
        let raw = loop {
            attempt += 1;
            match self.adapter.chat(model, &messages).await {
                Ok(resp) => break resp,
                Err(e) if attempt <= MAX_RETRIES && retry::is_retriable(&e) => {
                    let delay = retry::delay_for(attempt, INITIAL_BACKOFF, BACKOFF_JITTER);
                    tracing::warn!(
                        model = %model,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "transient LLM error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        let (content, usage) = raw;
        let available: &HashMap<String, String> = &page.mapping;
        let parsed = parse::parse_response(&content, available);

        Ok(AdapterResponse {
            prompt: prompt_text,
            raw_content: content,
            intuition: parsed.intuition,
            chosen_concept_id: parsed.concept_id,
            confidence: parsed.confidence,
            model: model.to_string(),
            usage,
            parsing_method: parsed.method,
        })
    }

    /// Passthrough for the provider's own model listing endpoint.
    pub async fn list_models(&self) -> Result<Value> {
        self.adapter.list_models().await
    }
}
