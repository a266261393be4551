//! TOML configuration parsing and validation.
//!
//! The whole process is driven by one immutable [`Config`], loaded once at
//! startup and shared with the access gate and the chat controller through
//! `Arc`. Nothing is looked up from ambient state after that point.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8788"
//!
//! [auth]
//! protected_prefix = "/coach"
//! username = "kevin"
//! password = "change-me"
//!
//! [knowledge]
//! path = "./knowledge/golf_entries.json"
//!
//! [inference]
//! provider = "workers-ai"
//! account_id = "0123abcd"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Model used when `[inference].model` is omitted.
pub const DEFAULT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
}

fn default_chat_path() -> String {
    "/api/chat".to_string()
}

/// Credential pair and scope for the Basic-Auth gate.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_protected_prefix")]
    pub protected_prefix: String,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_protected_prefix() -> String {
    "/coach".to_string()
}
fn default_realm() -> String {
    "KY Golf Academy".to_string()
}

/// Where the knowledge library lives. At most one of `url` or `path`.
///
/// A `url` starting with `/` is joined onto `base_url`, or onto
/// `http://{server.bind}` when no base is configured.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Resolved knowledge location after defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeLocation {
    Url(String),
    File(PathBuf),
}

impl KnowledgeConfig {
    /// Final location with defaults applied. URLs always come back absolute.
    pub fn location(&self, server: &ServerConfig) -> KnowledgeLocation {
        match (&self.url, &self.path) {
            (_, Some(path)) => KnowledgeLocation::File(path.clone()),
            (Some(url), None) if url.starts_with('/') => {
                let base = match &self.base_url {
                    Some(base) => base.trim_end_matches('/').to_string(),
                    None => format!("http://{}", server.bind),
                };
                KnowledgeLocation::Url(format!("{}{}", base, url))
            }
            (Some(url), None) => KnowledgeLocation::Url(url.clone()),
            (None, None) => KnowledgeLocation::File(default_knowledge_path()),
        }
    }
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("./knowledge/golf_entries.json")
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_token_len: default_min_token_len(),
        }
    }
}

fn default_max_results() -> usize {
    6
}
fn default_min_token_len() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: None,
            account_id: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl InferenceConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    450
}

/// Reads, overlays environment credentials onto, and validates a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

/// Parses TOML text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(username) = std::env::var("COACH_USERNAME") {
        config.auth.username = username;
    }
    if let Ok(password) = std::env::var("COACH_PASSWORD") {
        config.auth.password = password;
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if !config.server.chat_path.starts_with('/') {
        bail!("server.chat_path must start with '/'");
    }

    // The gate is fail-closed: an empty credential would let anyone in.
    if config.auth.username.is_empty() || config.auth.password.is_empty() {
        bail!("auth.username and auth.password must be set (or COACH_USERNAME / COACH_PASSWORD)");
    }
    if !config.auth.protected_prefix.starts_with('/') {
        bail!("auth.protected_prefix must start with '/'");
    }

    if config.knowledge.url.is_some() && config.knowledge.path.is_some() {
        bail!("knowledge.url and knowledge.path are mutually exclusive");
    }
    if let Some(url) = &config.knowledge.url {
        if !(url.starts_with('/') || is_http_url(url)) {
            bail!("knowledge.url must be absolute (http/https) or start with '/'");
        }
    }
    if let Some(base) = &config.knowledge.base_url {
        if !is_http_url(base) {
            bail!("knowledge.base_url must be an http or https URL");
        }
    }

    if config.retrieval.max_results < 1 {
        bail!("retrieval.max_results must be >= 1");
    }
    if config.retrieval.min_token_len < 1 {
        bail!("retrieval.min_token_len must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.inference.temperature) {
        bail!("inference.temperature must be in [0.0, 2.0]");
    }
    if config.inference.max_tokens < 1 {
        bail!("inference.max_tokens must be >= 1");
    }

    match config.inference.provider.as_str() {
        "disabled" | "workers-ai" | "openai" => {}
        other => bail!(
            "Unknown inference provider: '{}'. Must be disabled, workers-ai, or openai.",
            other
        ),
    }

    Ok(())
}
