//! HTTP request handlers for the gateway.
//!
//! Authentication is not done here: every protected route is wrapped by
//! `auth::require_auth` at the router level, so a handler only runs for
//! an already-authorized request.

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use tracing::{debug, info};

use crate::auth::AuthError;
use crate::command::{resolve_command, DispatchError, Dispatcher};
use crate::config::Config;
use crate::models::*;
use crate::payload::{self, NormalizedPayload};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Arc<Config>, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }
}

// === Health Check ===

/// GET /health - liveness probe (unauthenticated)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// === Test Endpoint ===

/// POST /test - fixed acknowledgment, no payload parsing
pub async fn test() -> Json<TestResponse> {
    info!("received /test request");
    Json(TestResponse {
        status: "ok",
        message: "Test endpoint working",
    })
}

// === Print Endpoint ===

/// POST /print - resolve a `message` from any encoding and echo it.
///
/// Accepts JSON, form data, query parameters, or as a last resort the
/// raw body itself, so plain-text clients work without headers.
pub async fn print_message(
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<PrintResponse>, ApiError> {
    debug!(
        content_type = ?headers.get(CONTENT_TYPE),
        body_len = body.len(),
        "print request received"
    );

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let resolved = payload::normalize(content_type, &body, query.as_deref());
    let query_params = query_payload(query.as_deref());

    let Some(message) = payload::resolve_message(&resolved, &query_params, &body) else {
        return Err(ApiError::MissingMessage);
    };

    // The echo to the operational console is the endpoint's side effect
    info!(target: "switchboard::console", %message, "printing message");

    Ok(Json(PrintResponse {
        status: "ok",
        message,
    }))
}

// === Switch Endpoint ===

/// POST /switch - resolve and dispatch an on/off command.
pub async fn switch(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<SwitchResponse>, ApiError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let resolved = payload::normalize(content_type, &body, query.as_deref());
    let query_params = query_payload(query.as_deref());

    let command = resolve_command(&resolved, &query_params)?;
    state.dispatcher.dispatch(&command).await?;

    info!(switch = %command.name, state = %command.state, "switch command completed");

    Ok(Json(SwitchResponse {
        status: "ok",
        switch: command.name,
        state: command.state,
    }))
}

/// Parse the raw query string into a payload map (empty on absence).
fn query_payload(query: Option<&str>) -> NormalizedPayload {
    query
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

// === Error Handling ===

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// `/print` found no message in any source
    MissingMessage,
    /// Command resolution or dispatch failed
    Dispatch(DispatchError),
    /// Authorization error (wraps AuthError)
    Auth(AuthError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Dispatch(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::Auth(auth_err) => return auth_err.into_response(),
            ApiError::MissingMessage => (
                StatusCode::BAD_REQUEST,
                "MISSING_PARAMETER",
                "missing 'message' parameter".to_string(),
            ),
            ApiError::Dispatch(err) => match err {
                DispatchError::MissingParameter => (
                    StatusCode::BAD_REQUEST,
                    "MISSING_PARAMETER",
                    err.to_string(),
                ),
                DispatchError::InvalidState(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_STATE", err.to_string())
                }
                DispatchError::UnknownSwitch(_) => {
                    (StatusCode::NOT_FOUND, "SWITCH_NOT_FOUND", err.to_string())
                }
                DispatchError::Device { .. } | DispatchError::Timeout(_) => (
                    StatusCode::BAD_GATEWAY,
                    "DEVICE_UNREACHABLE",
                    err.to_string(),
                ),
            },
        };

        let body = Json(ErrorResponse {
            error: message,
            code,
        });

        (status, body).into_response()
    }
}
