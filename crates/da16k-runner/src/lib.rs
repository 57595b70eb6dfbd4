//! DA16K Runner
//!
//! Library side of the `da16k` command-line tool: YAML configuration, a TCP
//! transport for modules behind a serial bridge, and the command
//! implementations. The binary only parses arguments and sets up logging.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod tcp_transport;
pub mod values;

pub use app::{execute, run};
pub use cli::{Cli, Command};
pub use config::{RunnerConfig, TransportConfig};
pub use error::{RunnerError, RunnerResult};
pub use tcp_transport::TcpTransport;
