//! Switchboard - auth-gated smart-plug gateway.
//!
//! Listens on a fixed port (HTTPS when a cert/key pair is configured)
//! and forwards authenticated on/off commands to Tapo plugs on the
//! local network.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use switchboard::command::Dispatcher;
use switchboard::device::TapoPlugClient;
use switchboard::{build_router, AppState, Config};
use tracing::info;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Initialize structured logging
    init_tracing();

    // Load and validate configuration
    let config = Arc::new(Config::from_env().expect("invalid configuration"));
    log_startup_info(&config);

    // Wire the dispatcher to the real device client
    let client = Arc::new(TapoPlugClient::new(
        config.username.clone(),
        config.password.clone(),
    ));
    let dispatcher = Dispatcher::new(config.clone(), client);
    let state = AppState::new(config.clone(), dispatcher);

    // Build and serve the application
    let app = build_router(state);
    serve(app, &config).await;
}

/// Initialize tracing with environment-based log levels.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("switchboard=debug,tower_http=info")),
        )
        .init();
}

/// Log startup configuration (no secrets).
fn log_startup_info(config: &Config) {
    info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        switches = config.switches.len(),
        allowlist_entries = config.allowed_ips.len(),
        https = config.https_enabled(),
        device_timeout_secs = config.device_timeout.as_secs(),
        "Starting switchboard gateway"
    );
}

/// Bind to the configured address and serve, with TLS when enabled.
async fn serve(app: Router, config: &Config) {
    let bind_addr = format!("{}:{}", config.bind_addr, config.port);
    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    if let Some(tls) = &config.tls {
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .expect("failed to load TLS certificate/key pair");
        let addr: SocketAddr = bind_addr.parse().expect("invalid bind address");

        info!(addr = %bind_addr, "Server listening (https)");
        axum_server::bind_rustls(addr, rustls_config)
            .serve(service)
            .await
            .expect("Server error");
    } else {
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind to address");

        info!(addr = %bind_addr, "Server listening");
        axum::serve(listener, service).await.expect("Server error");
    }
}
