//! Command-line interface.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Drive a DA16K IoTConnect AT gateway through a TCP-to-UART bridge.
#[derive(Parser, Debug)]
#[command(name = "da16k")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Bridge address, overriding `transport.address`.
    #[arg(short, long)]
    pub address: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Serve Prometheus metrics on this address.
    #[cfg(feature = "prometheus")]
    #[arg(long)]
    pub metrics_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations on the module.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Join WiFi and connect IoTConnect as configured.
    Setup,

    /// Send one telemetry message.
    Send {
        /// Tuples as KEY=VALUE (true/false, numbers, or text).
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Poll for cloud-to-device commands.
    Poll {
        /// Number of polls.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Delay between polls in milliseconds.
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Stop the IoTConnect session.
    Stop,

    /// Reset the IoTConnect client.
    Reset,
}

impl Cli {
    /// Default tracing filter for the verbosity count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let argv = ["da16k", "-c", "dev.yaml", "send", "t=1", "on=true"];
        let cli = Cli::try_parse_from(argv).unwrap();
        assert_eq!(cli.config, PathBuf::from("dev.yaml"));
        assert_eq!(
            cli.command,
            Command::Send {
                values: vec!["t=1".to_string(), "on=true".to_string()]
            }
        );
    }

    #[test]
    fn test_send_requires_values() {
        assert!(Cli::try_parse_from(["da16k", "-c", "dev.yaml", "send"]).is_err());
    }

    #[test]
    fn test_parse_poll_defaults() {
        let cli = Cli::try_parse_from(["da16k", "--config", "d.yaml", "poll"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Poll {
                count: 1,
                interval_ms: 1000
            }
        );
    }

    #[test]
    fn test_verbosity_and_address() {
        let cli = Cli::try_parse_from([
            "da16k", "-c", "d.yaml", "-a", "10.0.0.2:4000", "stop", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.address.as_deref(), Some("10.0.0.2:4000"));
        assert_eq!(cli.log_filter(), "debug");
        assert_eq!(cli.command, Command::Stop);
    }
}
