use std::time::Duration;

use serde_json::Value;
use wb_domain::config::LlmConfig;
use wb_domain::error::{Error, Result};

use crate::types::{ChatMessage, Role, Usage};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OpenAiCompatAdapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Talks to any OpenAI-compatible `/chat/completions` endpoint — nano-gpt by
/// default, but anything speaking the same wire format works.
pub struct OpenAiCompatAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatAdapter {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_read_timeout_secs))
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        if !config.ssl_verify {
            tracing::warn!("SSL verification disabled for the LLM adapter — do not use in production");
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// One non-retried call to `/chat/completions`. Returns the raw reply
    /// content plus whatever token usage the provider reported.
    pub async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<(String, Option<Usage>)> {
        let body = build_body(model, messages);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Llm(format!("HTTP {} - {}", status.as_u16(), text)));
        }

        let parsed: Value = serde_json::from_str(&text)?;
        parse_chat_response(&parsed)
    }

    /// `GET /models` passthrough — returns whatever the provider's model
    /// listing endpoint reports, unparsed.
    pub async fn list_models(&self) -> Result<Value> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Llm(format!("HTTP {} - {}", status.as_u16(), text)));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn build_body(model: &str, messages: &[ChatMessage]) -> Value {
    let msgs: Vec<Value> = messages
        .iter()
        .map(|m| serde_json::json!({"role": role_str(m.role), "content": m.content}))
        .collect();
    serde_json::json!({
        "model": model,
        "messages": msgs,
    })
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

fn parse_chat_response(body: &Value) -> Result<(String, Option<Usage>)> {
    let message = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| Error::Llm("no choices/message in response".into()))?;

    // Some OpenAI-compatible backends (DeepSeek-style reasoning models)
    // return the navigational answer in a separate `reasoning_content` or
    // `thinking` field and leave `content` sparse — fold it in so the
    // parser has the full text to scan.
    let content = message.get("content").and_then(|v| v.as_str()).unwrap_or("");
    let thinking = message
        .get("reasoning_content")
        .or_else(|| message.get("thinking"))
        .and_then(|v| v.as_str());

    let full = match thinking {
        Some(t) if !t.is_empty() => format!("{t}\n{content}"),
        _ => content.to_string(),
    };

    let usage = body.get("usage").and_then(parse_usage);
    Ok((full, usage))
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_content() {
        let body = serde_json::json!({
            "model": "gpt",
            "choices": [{"message": {"content": "NEXT_CLICK: CONCEPT_00"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let (content, usage) = parse_chat_response(&body).unwrap();
        assert_eq!(content, "NEXT_CLICK: CONCEPT_00");
        assert_eq!(usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn folds_reasoning_content_ahead_of_answer() {
        let body = serde_json::json!({
            "choices": [{"message": {
                "content": "NEXT_CLICK: CONCEPT_00",
                "reasoning_content": "thinking about it"
            }}]
        });
        let (content, _) = parse_chat_response(&body).unwrap();
        assert!(content.starts_with("thinking about it"));
        assert!(content.ends_with("NEXT_CLICK: CONCEPT_00"));
    }

    #[test]
    fn missing_choices_is_an_error() {
        let body = serde_json::json!({"choices": []});
        assert!(parse_chat_response(&body).is_err());
    }
}
