//! Configuration for the switchboard gateway.
//!
//! All configuration is loaded once from environment variables at startup
//! and is immutable afterwards. No secrets are logged.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default timeout for a single device-control call.
pub const DEFAULT_DEVICE_TIMEOUT_SECS: u64 = 10;

/// Configuration error raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `API_KEY` is unset or empty
    #[error("API_KEY must be set and non-empty")]
    MissingApiKey,

    /// An `ALLOWED_IPS` entry is not a valid IP address
    #[error("invalid ALLOWED_IPS entry: {0:?}")]
    InvalidAllowedIp(String),

    /// A `SWITCHES` entry is not of the form `name=address`
    #[error("invalid SWITCHES entry: {0:?} (expected name=address)")]
    InvalidSwitchEntry(String),

    /// `USE_HTTPS` is enabled but cert/key paths are missing
    #[error("USE_HTTPS is enabled but TLS_CERT and TLS_KEY are not both set")]
    IncompleteTls,
}

/// TLS settings (paths to an existing PEM certificate/key pair).
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Server port
    pub port: u16,

    /// Bearer API key required on every protected route
    pub api_key: String,

    /// Source-IP allowlist; empty means allow all
    pub allowed_ips: HashSet<IpAddr>,

    /// Logical switch name -> device network address
    pub switches: HashMap<String, String>,

    /// Device-account username (Tapo cloud account)
    pub username: String,

    /// Device-account password
    pub password: String,

    /// TLS cert/key pair; `None` serves plain HTTP
    pub tls: Option<TlsConfig>,

    /// Timeout for a single device-control call
    pub device_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails fast on a missing API key, malformed allowlist/switch
    /// entries, or an enabled-but-incomplete TLS pair.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let use_https = std::env::var("USE_HTTPS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let tls = if use_https {
            match (std::env::var("TLS_CERT").ok(), std::env::var("TLS_KEY").ok()) {
                (Some(cert_path), Some(key_path)) => Some(TlsConfig { cert_path, key_path }),
                _ => return Err(ConfigError::IncompleteTls),
            }
        } else {
            None
        };

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            api_key,
            allowed_ips: parse_allowed_ips(
                &std::env::var("ALLOWED_IPS").unwrap_or_default(),
            )?,
            switches: parse_switches(&std::env::var("SWITCHES").unwrap_or_default())?,
            username: std::env::var("TAPO_USERNAME").unwrap_or_default(),
            password: std::env::var("TAPO_PASSWORD").unwrap_or_default(),
            tls,
            device_timeout: Duration::from_secs(
                std::env::var("DEVICE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DEVICE_TIMEOUT_SECS),
            ),
        })
    }

    /// Whether HTTPS serving is enabled
    pub fn https_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

/// Parse a comma-separated IP allowlist. Empty input means allow all.
fn parse_allowed_ips(raw: &str) -> Result<HashSet<IpAddr>, ConfigError> {
    let mut ips = HashSet::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let ip = entry
            .parse()
            .map_err(|_| ConfigError::InvalidAllowedIp(entry.to_string()))?;
        ips.insert(ip);
    }
    Ok(ips)
}

/// Parse a comma-separated `name=address` switch mapping.
fn parse_switches(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut switches = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, address) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidSwitchEntry(entry.to_string()))?;
        let (name, address) = (name.trim(), address.trim());
        if name.is_empty() || address.is_empty() {
            return Err(ConfigError::InvalidSwitchEntry(entry.to_string()));
        }
        switches.insert(name.to_string(), address.to_string());
    }
    Ok(switches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_allowed_ips_accepts_empty() {
        let ips = parse_allowed_ips("").unwrap();
        assert!(ips.is_empty());
    }

    #[test]
    fn parse_allowed_ips_accepts_v4_and_v6() {
        let ips = parse_allowed_ips("192.168.68.1, ::1").unwrap();
        assert_eq!(ips.len(), 2);
        assert!(ips.contains(&"192.168.68.1".parse::<IpAddr>().unwrap()));
        assert!(ips.contains(&"::1".parse::<IpAddr>().unwrap()));
    }

    #[test]
    fn parse_allowed_ips_rejects_garbage() {
        assert!(matches!(
            parse_allowed_ips("not-an-ip"),
            Err(ConfigError::InvalidAllowedIp(_))
        ));
    }

    #[test]
    fn parse_switches_builds_mapping() {
        let switches =
            parse_switches("office=192.168.1.10, bedroom=192.168.1.11").unwrap();
        assert_eq!(switches.len(), 2);
        assert_eq!(switches["office"], "192.168.1.10");
        assert_eq!(switches["bedroom"], "192.168.1.11");
    }

    #[test]
    fn parse_switches_rejects_missing_address() {
        assert!(matches!(
            parse_switches("office"),
            Err(ConfigError::InvalidSwitchEntry(_))
        ));
        assert!(matches!(
            parse_switches("office="),
            Err(ConfigError::InvalidSwitchEntry(_))
        ));
    }

    #[test]
    fn parse_switches_accepts_empty() {
        assert!(parse_switches("").unwrap().is_empty());
    }
}
