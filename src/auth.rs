//! Path-scoped HTTP Basic Authentication gate.
//!
//! Runs ahead of every route, static or dynamic. Requests whose path does
//! not start with `auth.protected_prefix` pass straight through; everything
//! else must carry the configured credential pair.
//!
//! | Situation | Response |
//! |-----------|----------|
//! | No `Authorization` header, or scheme is not `Basic` | `401 Login required` + `WWW-Authenticate` |
//! | Payload undecodable, or credentials wrong | `403 Forbidden` |
//! | Credentials match | request continues |
//!
//! The prefix test is a plain string prefix with no exceptions list.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;

use crate::config::AuthConfig;

/// Outcome of inspecting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Path is outside the protected prefix.
    Unprotected,
    /// Credentials matched.
    Allowed,
    /// No usable Basic credentials were offered.
    AuthRequired,
    /// Credentials were offered but are wrong or unreadable.
    AuthRejected,
}

/// Splits a decoded `username:password` pair on the first colon only.
/// A value without a colon is a username with an empty password.
pub fn split_credentials(decoded: &str) -> (&str, &str) {
    decoded.split_once(':').unwrap_or((decoded, ""))
}

/// Decides what to do with a request to `path` carrying `headers`.
pub fn authorize(path: &str, headers: &HeaderMap, auth: &AuthConfig) -> AuthDecision {
    if !path.starts_with(&auth.protected_prefix) {
        return AuthDecision::Unprotected;
    }

    let Some(encoded) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
    else {
        return AuthDecision::AuthRequired;
    };

    let Some(decoded) = BASE64
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return AuthDecision::AuthRejected;
    };

    let (username, password) = split_credentials(&decoded);
    if username == auth.username && password == auth.password {
        AuthDecision::Allowed
    } else {
        AuthDecision::AuthRejected
    }
}

/// `401` with the browser retry signal.
pub fn login_required(realm: &str) -> Response {
    let challenge = format!("Basic realm=\"{}\"", realm.replace('"', "'"));
    let mut response = (StatusCode::UNAUTHORIZED, "Login required").into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    } else {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"restricted\""),
        );
    }
    response
}

pub fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

/// Axum middleware wrapping the whole router.
///
/// ```rust,ignore
/// Router::new()
///     .route("/api/chat", post(handle_chat))
///     .layer(middleware::from_fn_with_state(auth_config, access_gate))
/// ```
pub async fn access_gate(
    State(auth): State<Arc<AuthConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match authorize(&path, request.headers(), &auth) {
        AuthDecision::Unprotected | AuthDecision::Allowed => next.run(request).await,
        AuthDecision::AuthRequired => {
            tracing::debug!(path = %path, "credentials required");
            login_required(&auth.realm)
        }
        AuthDecision::AuthRejected => {
            tracing::warn!(path = %path, "credentials rejected");
            forbidden()
        }
    }
}
