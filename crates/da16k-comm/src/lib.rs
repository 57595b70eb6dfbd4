//! DA16K IoTConnect Device API
//!
//! High-level driver for DA16200/DA16600 modules running the IoTConnect AT
//! gateway firmware, built on the [`da16k_at`] transaction engine.
//!
//! # Operations
//!
//! - **Setup**: join WiFi, configure the IoTConnect identity (CPID, DUID,
//!   environment, auth type), upload device certificates, start the session
//! - **Telemetry**: typed key/value [`Message`]s, sent in batches of up to
//!   eight tuples per bulk command
//! - **Commands**: poll for cloud-to-device [`DeviceCommand`]s
//!
//! # Example
//!
//! ```rust,ignore
//! use da16k_comm::{Config, Da16k, Message};
//!
//! let mut device = Da16k::init(transport, &Config::default())?;
//!
//! let mut msg = Message::new();
//! msg.add_num("temperature", 21.5)?;
//! msg.add_bool("door_open", false)?;
//! device.send_msg(&msg)?;
//!
//! while let Some(cmd) = device.poll_cmd()? {
//!     println!("{} {:?}", cmd.command, cmd.parameters);
//! }
//! ```

pub mod command;
pub mod config;
pub mod device;
pub mod message;

pub use command::DeviceCommand;
pub use config::{AuthType, Config, ConfigError, IotcConfig, IotcMode, WifiConfig};
pub use device::Da16k;
pub use message::{Message, MessageTuple, TupleValue};
