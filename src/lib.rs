//! # Switchboard
//!
//! Auth-gated HTTP gateway for Tapo smart plugs on a local network.
//!
//! ## Design Principles
//!
//! - **One gate, every route**: bearer-token + IP-allowlist auth is a
//!   single middleware in front of all protected routes
//! - **Tolerant input**: bodies may be JSON, form data, query parameters,
//!   or raw text; an explicit strategy chain decides, not header trust
//! - **Immutable config**: loaded once at startup, shared read-only
//! - **Vendor black box**: device control goes through the `PlugClient`
//!   trait; the Tapo protocol never leaks into handlers
//!
//! ## API Overview
//!
//! | Endpoint | Method | Auth | Description |
//! |----------|--------|------|-------------|
//! | `/health` | GET | no | Health check |
//! | `/test` | POST | yes | Fixed acknowledgment |
//! | `/print` | POST | yes | Echo a message to the operational log |
//! | `/switch` | POST | yes | Turn a configured plug on or off |

pub mod auth;
pub mod command;
pub mod config;
pub mod device;
pub mod handlers;
pub mod models;
pub mod payload;

pub use config::Config;
pub use handlers::AppState;

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Maximum request body size (16 KiB).
pub const MAX_BODY_SIZE: usize = 16 * 1024;

/// Build the Axum router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    // The auth gate wraps exactly the protected routes; /health stays open
    let protected = Router::new()
        .route("/test", post(handlers::test))
        .route("/print", post(handlers::print_message))
        .route("/switch", post(handlers::switch))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        // Middleware stack (order matters: first added = outermost)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
