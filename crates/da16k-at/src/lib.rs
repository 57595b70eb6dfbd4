//! DA16K AT Command Engine
//!
//! This crate implements the host side of the text AT protocol spoken by
//! DA16200/DA16600 modules running the IoTConnect AT gateway firmware.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → module): text terminated with `\r\n`
//! - **Structured responses** (module → host): `<MARKER>:<payload>`, e.g.
//!   `+NWICSETUPEND:1`
//! - **Terminators**: a line containing `OK`, or `ERROR:<code>` for commands
//!   that can fail with a code
//! - **Noise**: echo and blank lines are tolerated and skipped
//!
//! The engine is synchronous: each transaction sends one command and then
//! reads lines, with a per-byte timeout, until the response is classified.
//!
//! # Example
//!
//! ```rust,ignore
//! use da16k_at::{AtEngine, ScriptedTransport, RESP_IOTC_STOP, UART_TIMEOUT};
//!
//! let transport = ScriptedTransport::with_response("+NWICSTOPEND:1\r\nOK\r\n");
//! let mut engine = AtEngine::new(transport);
//! engine.send_and_check(UART_TIMEOUT, Some(RESP_IOTC_STOP), format_args!("AT+NWICSTOP"))?;
//! ```

mod classify;
mod commands;
mod engine;
mod error;
mod hexval;
mod line;
mod transport;

pub use classify::*;
pub use commands::*;
pub use engine::*;
pub use error::*;
pub use hexval::*;
pub use line::*;
pub use transport::*;
