use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide defaults for the benchmark engine. [`RunConfig`](crate::model::RunConfig)
/// overrides the per-run fields (max_steps/max_loops/max_hallucination_retries);
/// everything else here is fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub wiki: WikiConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub run_defaults: RunDefaults,
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            wiki: WikiConfig::default(),
            archive: ArchiveConfig::default(),
            run_defaults: RunDefaults::default(),
            log_level: d_log_level(),
        }
    }
}

impl EngineConfig {
    /// Overlay environment variables on top of [`EngineConfig::default`].
    ///
    /// Recognizes `NANOGPT_API_KEY`, `NANOGPT_BASE_URL`, `SSL_VERIFY`,
    /// `HTTP_TIMEOUT`, `LLM_TIMEOUT`, `LLM_READ_TIMEOUT`,
    /// `WEBSOCKET_CONNECTION_TIMEOUT`, `MAX_STEPS`, `MAX_LOOPS`,
    /// `MAX_HALLUCINATION_RETRIES`, `HISTORY_SIZE`, `ARCHIVE_BASE_PATH`,
    /// `LOG_LEVEL`, `WIKIPEDIA_USER_AGENT`. Unset/unparsable variables keep
    /// the built-in default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("NANOGPT_API_KEY") {
            cfg.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("NANOGPT_BASE_URL") {
            cfg.llm.base_url = v;
        }
        if let Ok(v) = parse_env("SSL_VERIFY") {
            cfg.llm.ssl_verify = v;
        }
        if let Ok(v) = parse_env("HTTP_TIMEOUT") {
            cfg.llm.http_timeout_secs = v;
        }
        if let Ok(v) = parse_env("LLM_TIMEOUT") {
            cfg.llm.llm_timeout_secs = v;
        }
        if let Ok(v) = parse_env("LLM_READ_TIMEOUT") {
            cfg.llm.llm_read_timeout_secs = v;
        }
        if let Ok(v) = parse_env("WEBSOCKET_CONNECTION_TIMEOUT") {
            cfg.run_defaults.connect_timeout_secs = v;
        }
        if let Ok(v) = parse_env("MAX_STEPS") {
            cfg.run_defaults.max_steps = v;
        }
        if let Ok(v) = parse_env("MAX_LOOPS") {
            cfg.run_defaults.max_loops = v;
        }
        if let Ok(v) = parse_env("MAX_HALLUCINATION_RETRIES") {
            cfg.run_defaults.max_hallucination_retries = v;
        }
        if let Ok(v) = parse_env("HISTORY_SIZE") {
            cfg.run_defaults.history_size = v;
        }
        if let Ok(v) = std::env::var("ARCHIVE_BASE_PATH") {
            cfg.archive.base_path = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Ok(v) = std::env::var("WIKIPEDIA_USER_AGENT") {
            cfg.wiki.user_agent = v;
        }

        cfg
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> std::result::Result<T, ()> {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).ok_or(())
}

fn d_log_level() -> String {
    "info".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_true")]
    pub ssl_verify: bool,
    #[serde(default = "d_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "d_llm_timeout")]
    pub llm_timeout_secs: u64,
    #[serde(default = "d_llm_read_timeout")]
    pub llm_read_timeout_secs: u64,
    #[serde(default = "d_rate_limit")]
    pub rate_limit_per_minute: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: d_base_url(),
            ssl_verify: true,
            http_timeout_secs: d_http_timeout(),
            llm_timeout_secs: d_llm_timeout(),
            llm_read_timeout_secs: d_llm_read_timeout(),
            rate_limit_per_minute: d_rate_limit(),
        }
    }
}

fn d_base_url() -> String {
    "https://nano-gpt.com/api/v1".into()
}
fn d_true() -> bool {
    true
}
fn d_http_timeout() -> u64 {
    30
}
fn d_llm_timeout() -> u64 {
    120
}
fn d_llm_read_timeout() -> u64 {
    300
}
fn d_rate_limit() -> u32 {
    60
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wiki source
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    #[serde(default = "d_wiki_base_url")]
    pub base_url: String,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: d_wiki_base_url(),
            user_agent: d_user_agent(),
        }
    }
}

fn d_wiki_base_url() -> String {
    "https://en.wikipedia.org/w/api.php".into()
}
fn d_user_agent() -> String {
    "ThinkOnWikiBenchmark/1.0 (https://github.com)".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Archive store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "d_archive_base_path")]
    pub base_path: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_path: d_archive_base_path(),
        }
    }
}

fn d_archive_base_path() -> String {
    "archives".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Defaults applied to every run unless [`RunConfig`](crate::model::RunConfig)
/// overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaults {
    #[serde(default = "d_max_steps")]
    pub max_steps: u32,
    #[serde(default = "d_max_loops")]
    pub max_loops: u32,
    #[serde(default = "d_max_hallucination_retries")]
    pub max_hallucination_retries: u32,
    #[serde(default = "d_history_size")]
    pub history_size: usize,
    #[serde(default = "d_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            max_steps: d_max_steps(),
            max_loops: d_max_loops(),
            max_hallucination_retries: d_max_hallucination_retries(),
            history_size: d_history_size(),
            connect_timeout_secs: d_connect_timeout(),
        }
    }
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
fn d_history_size() -> usize {
    5
}
fn d_connect_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_settings() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.run_defaults.max_steps, 20);
        assert_eq!(cfg.run_defaults.max_loops, 3);
        assert_eq!(cfg.run_defaults.max_hallucination_retries, 3);
        assert_eq!(cfg.run_defaults.history_size, 5);
        assert_eq!(cfg.archive.base_path, "archives");
        assert_eq!(cfg.llm.base_url, "https://nano-gpt.com/api/v1");
    }

    #[test]
    fn from_env_overrides_max_steps() {
        std::env::set_var("MAX_STEPS_TEST_UNUSED", "1");
        std::env::set_var("MAX_STEPS", "42");
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.run_defaults.max_steps, 42);
        std::env::remove_var("MAX_STEPS");
        std::env::remove_var("MAX_STEPS_TEST_UNUSED");
    }

    #[test]
    fn from_env_ignores_unset_vars() {
        std::env::remove_var("ARCHIVE_BASE_PATH");
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.archive.base_path, "archives");
    }
}
