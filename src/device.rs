//! Device-control collaborator for Tapo smart plugs.
//!
//! The vendor protocol is a black box behind the `tapo` crate. Handlers
//! and the dispatcher only ever see the [`PlugClient`] trait, so tests
//! can substitute a recording double. Failures are returned, never
//! retried; retry policy belongs to the caller's automation, not here.

use async_trait::async_trait;
use tapo::ApiClient;
use thiserror::Error;
use tracing::debug;

use crate::command::SwitchState;

/// Error from a device-control call.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The vendor client reported a protocol or transport failure
    #[error("device protocol error: {0}")]
    Protocol(String),
}

impl From<tapo::Error> for DeviceError {
    fn from(err: tapo::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// On/off control for a single smart plug at a network address.
#[async_trait]
pub trait PlugClient: Send + Sync {
    /// Drive the plug at `address` to the requested power state.
    async fn set_power(&self, address: &str, state: SwitchState) -> Result<(), DeviceError>;
}

/// Production client speaking the Tapo P100 protocol.
///
/// A fresh session is established per call; the plugs sit on the local
/// network and the gateway's request rate is a human pressing buttons.
#[derive(Debug, Clone)]
pub struct TapoPlugClient {
    username: String,
    password: String,
}

impl TapoPlugClient {
    /// Create a client bound to the configured device-account credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl PlugClient for TapoPlugClient {
    async fn set_power(&self, address: &str, state: SwitchState) -> Result<(), DeviceError> {
        let device = ApiClient::new(self.username.clone(), self.password.clone())
            .p100(address)
            .await?;

        match state {
            SwitchState::On => device.on().await?,
            SwitchState::Off => device.off().await?,
        }

        debug!(%address, %state, "device call completed");
        Ok(())
    }
}
