//! Runner configuration file.
//!
//! ```yaml
//! transport:
//!   address: "127.0.0.1:5000"
//!   connect_timeout_ms: 2000
//! device:
//!   network_timeout_ms: 2000
//!   wifi: { ssid: "lab", key: "secret" }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RunnerResult;

fn default_connect_timeout_ms() -> u64 {
    2_000
}

/// Where the module's UART bridge listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// `host:port` of the TCP-to-UART bridge.
    pub address: String,
    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Top-level runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    pub transport: TransportConfig,
    #[serde(default)]
    pub device: da16k_comm::Config,
}

impl RunnerConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> RunnerResult<Self> {
        let config: RunnerConfig = serde_yaml::from_str(yaml)?;
        config.device.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use da16k_comm::IotcMode;

    #[test]
    fn test_minimal_config() {
        let yaml = "transport:\n  address: localhost:5000\n";
        let config = RunnerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.transport.address, "localhost:5000");
        assert_eq!(config.transport.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.device, da16k_comm::Config::default());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
transport:
  address: "10.0.0.5:7000"
  connect_timeout_ms: 500
device:
  network_timeout_ms: 4000
  wifi:
    ssid: lab
    hidden: true
  iotc:
    mode: aws
    cpid: CPID
    duid: dev
    env: poc
"#;
        let config = RunnerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.transport.connect_timeout_ms, 500);
        assert_eq!(config.device.network_timeout(), Duration::from_secs(4));
        assert!(config.device.wifi.as_ref().unwrap().hidden);
        assert_eq!(config.device.iotc.as_ref().unwrap().mode, IotcMode::Aws);
    }

    #[test]
    fn test_invalid_device_config() {
        let yaml = r#"
transport:
  address: "x:1"
device:
  iotc:
    mode: azure
    cpid: CPID
    duid: dev
    env: poc
    device_cert: "-----BEGIN CERTIFICATE-----"
"#;
        assert!(matches!(
            RunnerConfig::from_yaml_str(yaml),
            Err(RunnerError::Config(_))
        ));
    }

    #[test]
    fn test_missing_transport() {
        assert!(matches!(
            RunnerConfig::from_yaml_str("device: {}\n"),
            Err(RunnerError::Yaml(_))
        ));
    }
}
