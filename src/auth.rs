//! Bearer-token and source-IP authentication for the gateway.
//!
//! Every protected route sits behind the same [`require_auth`] middleware;
//! there is no per-handler auth logic. The check order is fixed:
//!
//! 1. Source IP against the configured allowlist (empty = allow all)
//! 2. Presence and shape of the `Authorization: Bearer ...` header
//! 3. Exact match of the token against the configured API key
//!
//! Every denial is logged at `warn` with the reason and remote address.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::config::Config;
use crate::handlers::AppState;
use crate::models::ErrorResponse;

/// Authorization error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Request came from an IP outside the configured allowlist
    UnauthorizedIp,
    /// Missing or malformed Authorization header
    MissingHeader,
    /// Bearer token does not match the configured API key
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::UnauthorizedIp => {
                (StatusCode::FORBIDDEN, "UNAUTHORIZED_IP", "unauthorized IP")
            }
            AuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "MISSING_AUTH",
                "missing Authorization header",
            ),
            AuthError::InvalidKey => {
                (StatusCode::UNAUTHORIZED, "INVALID_API_KEY", "invalid API key")
            }
        };

        let body = Json(ErrorResponse {
            error: message.to_string(),
            code,
        });

        (status, body).into_response()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// Only the canonical `"Bearer "` prefix is accepted.
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    authorization.strip_prefix("Bearer ")
}

/// Check a request against the configured allowlist and API key.
///
/// `remote_ip` is `None` when the peer address is unknown; with a
/// non-empty allowlist that is a denial (fail closed).
pub fn authorize(
    config: &Config,
    remote_ip: Option<IpAddr>,
    headers: &HeaderMap,
) -> Result<(), AuthError> {
    if !config.allowed_ips.is_empty() {
        let allowed = remote_ip.is_some_and(|ip| config.allowed_ips.contains(&ip));
        if !allowed {
            warn!(remote = ?remote_ip, "blocked request from unauthorized IP");
            return Err(AuthError::UnauthorizedIp);
        }
    }

    let header_value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some(token) = extract_bearer_token(header_value) else {
        warn!(remote = ?remote_ip, "missing or malformed Authorization header");
        return Err(AuthError::MissingHeader);
    };

    if token != config.api_key {
        warn!(remote = ?remote_ip, "invalid API key");
        return Err(AuthError::InvalidKey);
    }

    Ok(())
}

/// Axum middleware wrapping every protected route.
///
/// Layered once on the router via `middleware::from_fn_with_state`;
/// passes the request through untouched on success.
pub async fn require_auth(
    State(state): State<AppState>,
    addr: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let remote_ip = addr.map(|ConnectInfo(a)| a.ip());
    authorize(&state.config, remote_ip, request.headers())?;
    Ok(next.run(request).await)
}
