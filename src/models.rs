//! Response bodies for the gateway API.

use serde::Serialize;

use crate::command::SwitchState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `/test` acknowledgment
#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// `/print` echo response
#[derive(Debug, Serialize)]
pub struct PrintResponse {
    pub status: &'static str,
    pub message: String,
}

/// `/switch` success response
#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub status: &'static str,
    pub switch: String,
    pub state: SwitchState,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}
