//! HTTP server for the coaching chat.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `[server].chat_path` (default `/api/chat`) | Ask a question, get a grounded answer |
//! | `GET`  | `/health` | Health check (returns version) |
//! | any    | anything else | `404 Not Found` |
//!
//! Every request, including the `404` fallback, first passes through the
//! Basic-Auth [`access_gate`]. Whether a given path is actually protected is
//! decided by `[auth].protected_prefix`.
//!
//! # Chat contract
//!
//! ```text
//! POST /api/chat  {"question": "How do I grip the club?"}
//! 200  {"answer": "...", "citations": ["entry-1"]}
//! 400  Invalid JSON | Missing question
//! 500  <which dependency is missing>
//! ```

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::access_gate;
use crate::chat::ChatService;
use crate::config::Config;
use crate::error::ChatResult;
use crate::inference::InferenceBinding;
use crate::models::ChatResponse;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
}

/// Starts the server with the knowledge source and model binding described
/// by the configuration. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let chat = ChatService::from_config(Arc::new(config.clone()));
    run_server_with_service(Arc::new(chat)).await
}

/// Starts the server around an already-built [`ChatService`].
///
/// Used by tests and embedders that supply their own knowledge source or
/// inference backend.
pub async fn run_server_with_service(chat: Arc<ChatService>) -> anyhow::Result<()> {
    let config = chat.config();
    let bind_addr = config.server.bind.clone();

    match chat.inference() {
        InferenceBinding::Ready(gateway) => {
            tracing::info!(model = %gateway.model(), "inference ready");
        }
        InferenceBinding::Missing(reason) => {
            tracing::warn!(reason = %reason, "starting without an inference backend");
        }
    }

    tracing::info!(
        bind = %bind_addr,
        chat_path = %config.server.chat_path,
        protected_prefix = %config.auth.protected_prefix,
        "coach server listening"
    );

    let app = build_router(chat);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assembles routes, the fallback, the access gate, and request tracing.
pub fn build_router(chat: Arc<ChatService>) -> Router {
    let auth = Arc::new(chat.config().auth.clone());
    let chat_path = chat.config().server.chat_path.clone();

    Router::new()
        .route(&chat_path, post(handle_chat))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .with_state(AppState { chat })
        .layer(middleware::from_fn_with_state(auth, access_gate))
        .layer(TraceLayer::new_for_http())
}

// ============ POST {chat_path} ============

/// Handler for the chat endpoint. The body is taken raw so malformed JSON
/// yields the plain `Invalid JSON` message rather than an extractor rejection.
async fn handle_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> ChatResult<Json<ChatResponse>> {
    let response = state.chat.handle_body(&body).await?;
    Ok(Json(response))
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
