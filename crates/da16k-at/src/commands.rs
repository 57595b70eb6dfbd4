//! AT command vocabulary of the IoTConnect AT gateway firmware.
//!
//! Commands are sent as text lines; most answer with a structured
//! `<MARKER>:<code>` line (code `1` meaning success) followed by `OK`, some
//! with a bare `OK` only.

use std::time::Duration;

/// Default per-byte timeout for local (non-network) commands.
pub const UART_TIMEOUT: Duration = Duration::from_millis(500);

/// Maximum telemetry tuples per bulk message command.
pub const TUPLES_PER_COMMAND: usize = 8;

/// `ERROR:<code>` value reported when no cloud command is pending.
pub const ERR_CODE_NO_COMMANDS: i32 = -7;

/// Escape byte starting a special mode sequence.
pub const ESC: u8 = 0x1b;

/// End-of-text byte terminating a certificate transfer.
pub const ETX: u8 = 0x03;

// ============================================================================
// Commands and their response markers
// ============================================================================

/// Start of a bulk telemetry command; tuples follow on the same line.
pub const CMD_BULK_MESSAGE: &str = "AT+NWICEXMSG ";
/// Acknowledgement marker of a bulk telemetry command.
pub const RESP_BULK_MESSAGE: &str = "+NWICEXMSG";

/// Poll for the next cloud-to-device command.
pub const CMD_GET_COMMAND: &str = "AT+NWICGETCMD";
/// Response marker carrying `<command>[ <params>]`.
pub const RESP_GET_COMMAND: &str = "+NWICGETCMD";

/// Set the IoTConnect connection type (`AT+NWICCT <n>`).
pub const CMD_SET_CONNECTION_TYPE: &str = "AT+NWICCT";
/// Set the IoTConnect authentication type (`AT+NWICAT <n>`).
pub const CMD_SET_AUTH_TYPE: &str = "AT+NWICAT";
/// Set the IoTConnect company ID.
pub const CMD_SET_CPID: &str = "AT+NWICCPID";
/// Set the IoTConnect device unique ID.
pub const CMD_SET_DUID: &str = "AT+NWICDUID";
/// Set the IoTConnect environment.
pub const CMD_SET_ENV: &str = "AT+NWICENV";

/// Prepare an IoTConnect session.
pub const CMD_IOTC_SETUP: &str = "AT+NWICSETUP";
/// Completion marker of [`CMD_IOTC_SETUP`].
pub const RESP_IOTC_SETUP: &str = "+NWICSETUPEND";
/// Connect the prepared IoTConnect session.
pub const CMD_IOTC_START: &str = "AT+NWICSTART";
/// Completion marker of [`CMD_IOTC_START`].
pub const RESP_IOTC_START: &str = "+NWICSTARTEND";
/// Stop the IoTConnect session.
pub const CMD_IOTC_STOP: &str = "AT+NWICSTOP";
/// Completion marker of [`CMD_IOTC_STOP`].
pub const RESP_IOTC_STOP: &str = "+NWICSTOPEND";
/// Reset the IoTConnect client.
pub const CMD_IOTC_RESET: &str = "AT+NWICRESET";
/// Completion marker of [`CMD_IOTC_RESET`].
pub const RESP_IOTC_RESET: &str = "+NWICRESETEND";

/// Join an access point (`AT+WFJAPA <ssid>,<key>,<hidden>`).
pub const CMD_WIFI_JOIN: &str = "AT+WFJAPA";
/// Completion marker of [`CMD_WIFI_JOIN`].
pub const RESP_WIFI_JOIN: &str = "+WFJAP";

// ============================================================================
// Certificates
// ============================================================================

/// Certificate slots accepted by the certificate transfer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertType {
    /// MQTT root CA.
    MqttRootCa = 0,
    /// MQTT client certificate.
    MqttDeviceCert = 1,
    /// MQTT client private key.
    MqttDeviceKey = 2,
    /// HTTP root CA.
    HttpRootCa = 3,
    /// HTTP client certificate.
    HttpDeviceCert = 4,
    /// HTTP client private key.
    HttpDeviceKey = 5,
}

impl CertType {
    /// Slot number used in the mode-entry sequence.
    pub fn slot(self) -> u8 {
        self as u8
    }

    /// Mode-entry sequence: `ESC 'C' <slot digit> ','`.
    pub fn mode_sequence(self) -> [u8; 4] {
        [ESC, b'C', b'0' + self.slot(), b',']
    }
}
