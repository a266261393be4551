//! Inference backend abstraction and the gateway in front of it.
//!
//! Defines the [`InferenceBackend`] trait and concrete implementations:
//! - **[`WorkersAiBackend`]** — Cloudflare Workers AI REST API
//!   (`POST {endpoint}/{model}`).
//! - **[`OpenAiBackend`]** — any OpenAI-compatible chat completions endpoint.
//!
//! [`InferenceGateway`] wraps a backend with the fixed generation settings
//! and turns its loosely-shaped JSON reply into a plain answer string via
//! [`extract_answer`].
//!
//! # Failure policy
//!
//! There are no retries. A network error, a non-2xx status, or an
//! unreadable body is returned as an error and fails the request.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::InferenceConfig;
use crate::prompt::{ChatMessage, Prompt};

/// JSON pointers checked, in order, for the answer text.
pub const ANSWER_POINTERS: &[&str] = &[
    "/response",
    "/result",
    "/text",
    "/result/response",
    "/choices/0/message/content",
];

/// Request payload shared by every backend.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A hosted model that turns chat messages into a JSON reply.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Provider name for logs (e.g. `"workers-ai"`).
    fn name(&self) -> &str;

    async fn run(&self, model: &str, request: &InferenceRequest) -> Result<Value>;
}

/// Pulls the answer out of a backend reply.
///
/// The first pointer in [`ANSWER_POINTERS`] that resolves to a non-empty
/// string wins. If none does, the whole reply is serialized, so the caller
/// never sees an absent answer.
pub fn extract_answer(reply: &Value) -> String {
    ANSWER_POINTERS
        .iter()
        .filter_map(|p| reply.pointer(p))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| reply.to_string())
}

/// A backend plus the generation settings used for every question.
#[derive(Clone)]
pub struct InferenceGateway {
    backend: Arc<dyn InferenceBackend>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl InferenceGateway {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: &InferenceConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the prompt once and returns the extracted answer text.
    pub async fn run(&self, prompt: &Prompt) -> Result<String> {
        let request = InferenceRequest {
            messages: prompt.messages(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(
            backend = self.backend.name(),
            model = %self.model,
            max_tokens = self.max_tokens,
            "invoking model"
        );

        let reply = self.backend.run(&self.model, &request).await?;
        Ok(extract_answer(&reply))
    }
}

/// Whether a usable model is wired in. `Missing` carries the operator-facing
/// reason, reported on every chat request that needs the model.
#[derive(Clone)]
pub enum InferenceBinding {
    Ready(InferenceGateway),
    Missing(String),
}

impl InferenceBinding {
    /// Builds the binding described by `[inference]`. Never fails: any
    /// problem is recorded as `Missing` so the server can still start and
    /// answer no-match questions.
    pub fn from_config(config: &InferenceConfig) -> Self {
        let missing = || {
            Self::Missing(
                "Inference backend missing. Set [inference] provider to workers-ai or openai in the config file."
                    .to_string(),
            )
        };
        if !config.is_enabled() {
            return missing();
        }
        match create_backend(config) {
            Ok(Some(backend)) => Self::Ready(InferenceGateway::new(backend, config)),
            Ok(None) => missing(),
            Err(e) => Self::Missing(format!("Inference backend misconfigured: {}", e)),
        }
    }

    pub fn with_backend(backend: Arc<dyn InferenceBackend>, config: &InferenceConfig) -> Self {
        Self::Ready(InferenceGateway::new(backend, config))
    }
}

/// Instantiates the backend named by `config.provider`; `None` when disabled.
pub fn create_backend(config: &InferenceConfig) -> Result<Option<Arc<dyn InferenceBackend>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "workers-ai" => Ok(Some(Arc::new(WorkersAiBackend::new(config)?))),
        "openai" => Ok(Some(Arc::new(OpenAiBackend::new(config)?))),
        other => bail!("Unknown inference provider: {}", other),
    }
}

/// A config string that is set and non-blank.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Reads a bearer token from the environment.
fn api_token(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

/// Sends a JSON POST and returns the parsed body, failing on non-2xx.
async fn post_json(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    body: &Value,
) -> Result<Value> {
    let response = client
        .post(url)
        .bearer_auth(token)
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Inference API error {}: {}", status, body_text);
    }

    Ok(response.json().await?)
}

// ============ Workers AI ============

/// Cloudflare Workers AI over its REST API.
///
/// Requires `CLOUDFLARE_API_TOKEN` and either `[inference].account_id` or
/// an explicit `endpoint`.
pub struct WorkersAiBackend {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

impl WorkersAiBackend {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let endpoint = match (non_empty(&config.endpoint), non_empty(&config.account_id)) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(account)) => format!(
                "https://api.cloudflare.com/client/v4/accounts/{}/ai/run",
                account
            ),
            (None, None) => {
                bail!("inference.account_id or inference.endpoint required for workers-ai")
            }
        };

        Ok(Self {
            endpoint,
            token: api_token("CLOUDFLARE_API_TOKEN")?,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl InferenceBackend for WorkersAiBackend {
    fn name(&self) -> &str {
        "workers-ai"
    }

    async fn run(&self, model: &str, request: &InferenceRequest) -> Result<Value> {
        let url = format!("{}/{}", self.endpoint, model);
        let body = serde_json::to_value(request)?;
        post_json(&self.client, &url, &self.token, &body).await
    }
}

// ============ OpenAI-compatible ============

/// OpenAI-compatible `chat/completions` endpoint. Requires `OPENAI_API_KEY`.
pub struct OpenAiBackend {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        Ok(Self {
            endpoint: non_empty(&config.endpoint)
                .unwrap_or("https://api.openai.com/v1/chat/completions")
                .to_string(),
            token: api_token("OPENAI_API_KEY")?,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl InferenceBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn run(&self, model: &str, request: &InferenceRequest) -> Result<Value> {
        let mut body = serde_json::to_value(request)?;
        body["model"] = Value::String(model.to_string());
        post_json(&self.client, &self.endpoint, &self.token, &body).await
    }
}
