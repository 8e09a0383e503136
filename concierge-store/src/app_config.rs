use concierge_shared::Masked;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub nlu: NluConfig,
    pub backend: BackendConfig,
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub mode: Mode,
}

/// Which collaborators get wired in.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Real NLU and booking backend over HTTP.
    Live,
    /// In-process stand-ins; no network.
    #[default]
    Offline,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Sessions untouched for this long are closed and dropped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_session_idle_secs() -> u64 {
    1800
}

impl ServerConfig {
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

/// OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct NluConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Masked<String>,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub username: String,
    pub session_id: String,
    #[serde(default = "default_payment_type")]
    pub payment_type: String,
}

fn default_payment_type() -> String {
    "GUESTCARD".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestrationConfig {
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_max_parallel_items")]
    pub max_parallel_items: usize,
    #[serde(default = "default_contact_title")]
    pub default_contact_title: String,
}

fn default_call_timeout_ms() -> u64 {
    15_000
}

fn default_max_parallel_items() -> usize {
    4
}

fn default_contact_title() -> String {
    "MR.".to_string()
}

impl OrchestrationConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CONCIERGE__BACKEND__BASE_URL=https://...`
            .add_source(config::Environment::with_prefix("CONCIERGE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
