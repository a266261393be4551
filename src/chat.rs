//! Chat endpoint controller.
//!
//! Runs one question through the pipeline, stopping at the first failure:
//!
//! ```text
//! body ──parse──▶ question ──fetch──▶ library ──rank──▶ top entries
//!                                                        │
//!                      (none) ◀──────────────────────────┤
//!                   fixed answer                         ▼
//!                                      binding? ──▶ prompt ──▶ model ──▶ ChatResponse
//! ```
//!
//! A question that matches nothing is a normal outcome: it returns the
//! fixed [`NO_MATCH_ANSWER`] with no citations and never touches the model.

use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ChatError, ChatResult};
use crate::inference::InferenceBinding;
use crate::knowledge::{create_source, KnowledgeSource};
use crate::models::{ChatRequest, ChatResponse, KnowledgeEntry};
use crate::prompt::{build_prompt, NO_MATCH_ANSWER};
use crate::search::rank_entries;

/// Extracts the trimmed question from a raw request body.
///
/// The body must be a JSON object whose `question` is a non-blank string.
/// Numbers, booleans, and other shapes count as a missing question.
pub fn parse_question(body: &[u8]) -> ChatResult<String> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ChatError::InvalidJson)?;
    if !value.is_object() {
        return Err(ChatError::MissingQuestion);
    }

    let request: ChatRequest =
        serde_json::from_value(value).map_err(|_| ChatError::MissingQuestion)?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ChatError::MissingQuestion);
    }
    Ok(question.to_string())
}

/// Everything a chat request needs, built once at startup.
pub struct ChatService {
    config: Arc<Config>,
    knowledge: Arc<dyn KnowledgeSource>,
    inference: InferenceBinding,
}

impl ChatService {
    pub fn new(
        config: Arc<Config>,
        knowledge: Arc<dyn KnowledgeSource>,
        inference: InferenceBinding,
    ) -> Self {
        Self {
            config,
            knowledge,
            inference,
        }
    }

    /// Wires the knowledge source and model binding described by `config`.
    pub fn from_config(config: Arc<Config>) -> Self {
        let knowledge: Arc<dyn KnowledgeSource> =
            Arc::from(create_source(&config.knowledge.location(&config.server)));
        let inference = InferenceBinding::from_config(&config.inference);
        Self::new(config, knowledge, inference)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn inference(&self) -> &InferenceBinding {
        &self.inference
    }

    /// Loads the library fresh for this request.
    pub async fn load_library(&self) -> ChatResult<Vec<KnowledgeEntry>> {
        Ok(self.knowledge.fetch().await?)
    }

    /// Full pipeline for a raw request body.
    pub async fn handle_body(&self, body: &[u8]) -> ChatResult<ChatResponse> {
        let question = parse_question(body)?;
        self.answer(&question).await
    }

    /// Answers an already-validated question.
    pub async fn answer(&self, question: &str) -> ChatResult<ChatResponse> {
        let library = self.load_library().await?;
        let ranked = rank_entries(question, &library, &self.config.retrieval);

        tracing::info!(
            library_size = library.len(),
            matched = ranked.len(),
            "retrieved grounding entries"
        );

        if ranked.is_empty() {
            return Ok(ChatResponse {
                answer: NO_MATCH_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let gateway = match &self.inference {
            InferenceBinding::Ready(gateway) => gateway,
            InferenceBinding::Missing(reason) => {
                return Err(ChatError::InferenceUnconfigured(reason.clone()))
            }
        };

        let prompt = build_prompt(question, &ranked);
        let answer = gateway.run(&prompt).await.map_err(ChatError::Upstream)?;

        Ok(ChatResponse {
            answer: answer.trim().to_string(),
            citations: ranked.iter().map(|s| s.entry.id.clone()).collect(),
        })
    }
}
