//! Request-facing error taxonomy for the chat endpoint.
//!
//! Every known failure maps to a specific status and a plain-text body that
//! tells an operator what to fix. Only model-call failures ([`ChatError::Upstream`])
//! are reported generically; their detail goes to the log, not the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::knowledge::KnowledgeError;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Missing question")]
    MissingQuestion,

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error("{0}")]
    InferenceUnconfigured(String),

    #[error("inference call failed: {0:#}")]
    Upstream(anyhow::Error),
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::InvalidJson | ChatError::MissingQuestion => StatusCode::BAD_REQUEST,
            ChatError::Knowledge(_)
            | ChatError::InferenceUnconfigured(_)
            | ChatError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the client.
    pub fn public_message(&self) -> String {
        match self {
            ChatError::Upstream(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ChatError::Upstream(e) => {
                tracing::error!(error = %format!("{:#}", e), "chat request failed")
            }
            ChatError::InvalidJson | ChatError::MissingQuestion => {
                tracing::debug!(error = %self, "rejected chat request")
            }
            _ => tracing::warn!(error = %self, "chat dependency missing"),
        }
        (status, self.public_message()).into_response()
    }
}

/// Handy result alias used by the controller.
pub type ChatResult<T> = Result<T, ChatError>;
