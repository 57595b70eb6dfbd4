//! Device configuration.
//!
//! These types describe what [`Da16k::init`](crate::Da16k::init) sets up on
//! the module. Every part is optional: leaving out `wifi` or `iotc` relies on
//! whatever the AT gateway already has stored.

use std::time::Duration;

use da16k_at::AtError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default time allowed for the module to join an access point.
pub const DEFAULT_WIFI_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Default time allowed for the IoTConnect session to come up.
pub const DEFAULT_IOTC_CONNECT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Default timeout for network-bound commands such as telemetry.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Pick `ms` unless it is zero.
fn timeout_or(ms: u32, default: Duration) -> Duration {
    if ms == 0 {
        default
    } else {
        Duration::from_millis(u64::from(ms))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required text field is empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A field would break the command line it is sent on.
    #[error("{0} must not contain line breaks")]
    LineBreak(&'static str),

    /// A device certificate was given without its private key.
    #[error("device_key is required when device_cert is set")]
    MissingDeviceKey,
}

impl From<ConfigError> for AtError {
    fn from(err: ConfigError) -> Self {
        AtError::InvalidArgument(err.to_string())
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::EmptyField(field));
    }
    check_single_line(field, value)
}

fn check_single_line(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.contains(['\r', '\n']) {
        return Err(ConfigError::LineBreak(field));
    }
    Ok(())
}

// ============================================================================
// IoTConnect
// ============================================================================

/// IoTConnect connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IotcMode {
    Aws,
    Azure,
}

impl IotcMode {
    /// Numeric value used by `AT+NWICCT`.
    pub fn code(self) -> u32 {
        match self {
            IotcMode::Aws => 1,
            IotcMode::Azure => 2,
        }
    }
}

/// IoTConnect authentication type. Token authentication is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    X509,
}

impl AuthType {
    /// Numeric value used by `AT+NWICAT`.
    pub fn code(self) -> u32 {
        match self {
            AuthType::X509 => 1,
        }
    }
}

/// IoTConnect device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IotcConfig {
    /// Connection type (AWS or Azure).
    pub mode: IotcMode,
    /// Company ID.
    pub cpid: String,
    /// Device unique ID.
    pub duid: String,
    /// Environment name.
    pub env: String,
    /// Connect timeout in milliseconds (0 = default).
    #[serde(default)]
    pub connect_timeout_ms: u32,
    /// PEM device certificate. Absent keeps what the gateway has stored.
    #[serde(default)]
    pub device_cert: Option<String>,
    /// PEM device private key; required with `device_cert`.
    #[serde(default)]
    pub device_key: Option<String>,
}

impl IotcConfig {
    pub fn connect_timeout(&self) -> Duration {
        timeout_or(self.connect_timeout_ms, DEFAULT_IOTC_CONNECT_TIMEOUT)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_text("cpid", &self.cpid)?;
        require_text("duid", &self.duid)?;
        require_text("env", &self.env)?;
        if self.device_cert.is_some() && self.device_key.is_none() {
            return Err(ConfigError::MissingDeviceKey);
        }
        Ok(())
    }
}

// ============================================================================
// WiFi
// ============================================================================

/// Access point to join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WifiConfig {
    /// Network name.
    pub ssid: String,
    /// WPA/WPA2 passphrase; absent for an open network.
    #[serde(default)]
    pub key: Option<String>,
    /// Hidden network flag.
    #[serde(default)]
    pub hidden: bool,
    /// Join timeout in milliseconds (0 = default).
    #[serde(default)]
    pub connect_timeout_ms: u32,
}

impl WifiConfig {
    pub fn connect_timeout(&self) -> Duration {
        timeout_or(self.connect_timeout_ms, DEFAULT_WIFI_TIMEOUT)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_text("ssid", &self.ssid)?;
        if let Some(key) = &self.key {
            check_single_line("key", key)?;
        }
        Ok(())
    }
}

// ============================================================================
// Top Level
// ============================================================================

/// Driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Access point to join at init.
    #[serde(default)]
    pub wifi: Option<WifiConfig>,
    /// IoTConnect session to set up at init.
    #[serde(default)]
    pub iotc: Option<IotcConfig>,
    /// Timeout for network-bound commands in milliseconds (0 = default).
    #[serde(default)]
    pub network_timeout_ms: u32,
}

impl Config {
    pub fn network_timeout(&self) -> Duration {
        timeout_or(self.network_timeout_ms, DEFAULT_NETWORK_TIMEOUT)
    }

    pub fn iotc_connect_timeout(&self) -> Duration {
        self.iotc
            .as_ref()
            .map_or(DEFAULT_IOTC_CONNECT_TIMEOUT, IotcConfig::connect_timeout)
    }

    /// Check every configured section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(wifi) = &self.wifi {
            wifi.validate()?;
        }
        if let Some(iotc) = &self.iotc {
            iotc.validate()?;
        }
        Ok(())
    }
}
