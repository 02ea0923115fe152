//! Switch command resolution and dispatch.
//!
//! Turns a normalized payload into a [`SwitchCommand`] (field aliases,
//! state-literal normalization) and drives the device-control
//! collaborator through the configured name -> address mapping.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::Config;
use crate::device::{DeviceError, PlugClient};
use crate::payload::NormalizedPayload;

/// Desired power state of a plug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    /// Parse a state literal, case-insensitively.
    ///
    /// `1`/`true`/`on`/`yes` mean on; `0`/`false`/`off`/`no` mean off.
    /// Anything else is invalid.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Some(Self::On),
            "0" | "false" | "off" | "no" => Some(Self::Off),
            _ => None,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
        }
    }
}

/// A fully resolved command against a logical switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCommand {
    /// Logical switch name (a key of `Config::switches`)
    pub name: String,
    /// Desired power state
    pub state: SwitchState,
}

/// Error from command resolution or dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Neither body nor query supplied both a switch name and a state
    #[error("missing 'switch' or 'state' parameter")]
    MissingParameter,

    /// The state literal is outside the accepted alias sets
    #[error("invalid 'state' value {0:?}, expected on/off")]
    InvalidState(String),

    /// The name is not a configured logical switch
    #[error("unknown switch {0:?}")]
    UnknownSwitch(String),

    /// The vendor call failed
    #[error("device call for {name:?} failed")]
    Device {
        name: String,
        #[source]
        source: DeviceError,
    },

    /// The vendor call exceeded the configured timeout
    #[error("device call for {0:?} timed out")]
    Timeout(String),
}

/// Read the first present value among `keys`, body before query.
fn first_of<'a>(
    payload: &'a NormalizedPayload,
    query: &'a NormalizedPayload,
    keys: &[&str],
) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| payload.get(*k))
        .or_else(|| keys.iter().find_map(|k| query.get(*k)))
        .map(String::as_str)
}

/// Resolve a [`SwitchCommand`] from the normalized payload and query.
///
/// Aliases: `switch` then `name` for the device, `state` then `on` for
/// the state; body fields take precedence over query parameters.
pub fn resolve_command(
    payload: &NormalizedPayload,
    query: &NormalizedPayload,
) -> Result<SwitchCommand, DispatchError> {
    let name = first_of(payload, query, &["switch", "name"]);
    let state = first_of(payload, query, &["state", "on"]);

    let (Some(name), Some(state)) = (name, state) else {
        return Err(DispatchError::MissingParameter);
    };

    let state = SwitchState::parse(state)
        .ok_or_else(|| DispatchError::InvalidState(state.to_string()))?;

    Ok(SwitchCommand {
        name: name.to_string(),
        state,
    })
}

/// Resolves logical names to device addresses and issues vendor calls.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    client: Arc<dyn PlugClient>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, client: Arc<dyn PlugClient>) -> Self {
        Self { config, client }
    }

    /// Execute a resolved command against the configured device.
    ///
    /// The vendor call is bounded by `Config::device_timeout`. Errors and
    /// timeouts surface as [`DispatchError`]; nothing is retried.
    pub async fn dispatch(&self, command: &SwitchCommand) -> Result<(), DispatchError> {
        let address = self
            .config
            .switches
            .get(&command.name)
            .ok_or_else(|| DispatchError::UnknownSwitch(command.name.clone()))?;

        info!(switch = %command.name, state = %command.state, "dispatching switch command");

        match timeout(
            self.config.device_timeout,
            self.client.set_power(address, command.state),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => {
                warn!(switch = %command.name, error = %source, "device call failed");
                Err(DispatchError::Device {
                    name: command.name.clone(),
                    source,
                })
            }
            Err(_) => {
                warn!(switch = %command.name, "device call timed out");
                Err(DispatchError::Timeout(command.name.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    fn payload(pairs: &[(&str, &str)]) -> NormalizedPayload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn state_aliases_are_case_insensitive_and_total() {
        for raw in ["1", "true", "on", "yes", "ON", "True", "YES"] {
            assert_eq!(SwitchState::parse(raw), Some(SwitchState::On), "{raw}");
        }
        for raw in ["0", "false", "off", "no", "OFF", "False", "NO"] {
            assert_eq!(SwitchState::parse(raw), Some(SwitchState::Off), "{raw}");
        }
        for raw in ["maybe", "", "2", "onn", "of"] {
            assert_eq!(SwitchState::parse(raw), None, "{raw}");
        }
    }

    #[test]
    fn state_displays_as_canonical_literal() {
        assert_eq!(SwitchState::On.to_string(), "on");
        assert_eq!(SwitchState::Off.to_string(), "off");
    }

    #[test]
    fn resolve_reads_switch_and_state() {
        let cmd = resolve_command(
            &payload(&[("switch", "office"), ("state", "on")]),
            &payload(&[]),
        )
        .unwrap();
        assert_eq!(cmd.name, "office");
        assert_eq!(cmd.state, SwitchState::On);
    }

    #[test]
    fn resolve_accepts_name_and_on_aliases() {
        let cmd = resolve_command(
            &payload(&[("name", "tree"), ("on", "0")]),
            &payload(&[]),
        )
        .unwrap();
        assert_eq!(cmd.name, "tree");
        assert_eq!(cmd.state, SwitchState::Off);
    }

    #[test]
    fn resolve_prefers_switch_over_name_and_body_over_query() {
        let cmd = resolve_command(
            &payload(&[("switch", "office"), ("name", "ignored"), ("state", "on")]),
            &payload(&[("switch", "query-side"), ("state", "off")]),
        )
        .unwrap();
        assert_eq!(cmd.name, "office");
        assert_eq!(cmd.state, SwitchState::On);
    }

    #[test]
    fn resolve_falls_back_to_query() {
        let cmd = resolve_command(
            &payload(&[]),
            &payload(&[("name", "bedroom"), ("on", "yes")]),
        )
        .unwrap();
        assert_eq!(cmd.name, "bedroom");
        assert_eq!(cmd.state, SwitchState::On);
    }

    #[test]
    fn resolve_rejects_missing_fields() {
        assert!(matches!(
            resolve_command(&payload(&[("switch", "office")]), &payload(&[])),
            Err(DispatchError::MissingParameter)
        ));
        assert!(matches!(
            resolve_command(&payload(&[("state", "on")]), &payload(&[])),
            Err(DispatchError::MissingParameter)
        ));
    }

    #[test]
    fn resolve_rejects_unknown_state_literal() {
        assert!(matches!(
            resolve_command(
                &payload(&[("switch", "office"), ("state", "maybe")]),
                &payload(&[]),
            ),
            Err(DispatchError::InvalidState(s)) if s == "maybe"
        ));
    }

    // === Dispatch against a scripted client ===

    struct ScriptedClient {
        fail: bool,
        hang: bool,
        calls: Mutex<Vec<(String, SwitchState)>>,
    }

    impl ScriptedClient {
        fn ok() -> Self {
            Self {
                fail: false,
                hang: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl crate::device::PlugClient for ScriptedClient {
        async fn set_power(
            &self,
            address: &str,
            state: SwitchState,
        ) -> Result<(), crate::device::DeviceError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.calls
                .lock()
                .unwrap()
                .push((address.to_string(), state));
            if self.fail {
                return Err(crate::device::DeviceError::Protocol(
                    "connection refused".to_string(),
                ));
            }
            Ok(())
        }
    }

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            api_key: "k".to_string(),
            allowed_ips: std::collections::HashSet::new(),
            switches: HashMap::from([(
                "office".to_string(),
                "192.168.1.10".to_string(),
            )]),
            username: String::new(),
            password: String::new(),
            tls: None,
            device_timeout: Duration::from_millis(50),
        })
    }

    #[tokio::test]
    async fn dispatch_calls_client_with_configured_address() {
        let client = Arc::new(ScriptedClient::ok());
        let dispatcher = Dispatcher::new(test_config(), client.clone());

        let command = SwitchCommand {
            name: "office".to_string(),
            state: SwitchState::On,
        };
        dispatcher.dispatch(&command).await.unwrap();

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("192.168.1.10".to_string(), SwitchState::On)]);
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_switch_without_device_call() {
        let client = Arc::new(ScriptedClient::ok());
        let dispatcher = Dispatcher::new(test_config(), client.clone());

        let command = SwitchCommand {
            name: "unknownroom".to_string(),
            state: SwitchState::On,
        };
        let err = dispatcher.dispatch(&command).await.unwrap_err();

        assert!(matches!(err, DispatchError::UnknownSwitch(n) if n == "unknownroom"));
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatch_surfaces_device_failure() {
        let client = Arc::new(ScriptedClient {
            fail: true,
            ..ScriptedClient::ok()
        });
        let dispatcher = Dispatcher::new(test_config(), client);

        let command = SwitchCommand {
            name: "office".to_string(),
            state: SwitchState::Off,
        };
        let err = dispatcher.dispatch(&command).await.unwrap_err();
        assert!(matches!(err, DispatchError::Device { .. }));
    }

    #[tokio::test]
    async fn dispatch_times_out_hung_device_call() {
        let client = Arc::new(ScriptedClient {
            hang: true,
            ..ScriptedClient::ok()
        });
        let dispatcher = Dispatcher::new(test_config(), client);

        let command = SwitchCommand {
            name: "office".to_string(),
            state: SwitchState::On,
        };
        let err = dispatcher.dispatch(&command).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(_)));
    }
}
