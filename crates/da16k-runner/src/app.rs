//! Running CLI commands against a module.

use std::io::Write;
use std::thread;
use std::time::Duration;

use da16k_at::Transport;
use da16k_comm::{Config, Da16k};
use tracing::{debug, info};

use crate::cli::{Cli, Command};
use crate::config::RunnerConfig;
use crate::error::RunnerResult;
use crate::tcp_transport::TcpTransport;
use crate::values::build_message;

/// Run `cli` against the bridge named by its configuration.
pub fn run(cli: &Cli, out: &mut dyn Write) -> RunnerResult<()> {
    let mut config = RunnerConfig::load(&cli.config)?;
    if let Some(address) = &cli.address {
        config.transport.address = address.clone();
    }

    #[cfg(feature = "prometheus")]
    if let Some(addr) = cli.metrics_addr {
        da16k_metrics::install_prometheus_exporter(addr)
            .map_err(|e| crate::error::RunnerError::Metrics(e.to_string()))?;
        info!("Serving metrics on {addr}");
    }

    let transport = TcpTransport::new(
        config.transport.address.clone(),
        config.transport.connect_timeout(),
    );
    execute(transport, &config.device, &cli.command, out)
}

/// Run one command over `transport`, writing human-readable results to `out`.
///
/// `setup` applies the whole device configuration; the other commands only
/// open the transport and leave the module's stored settings alone.
pub fn execute<T: Transport>(
    transport: T,
    config: &Config,
    command: &Command,
    out: &mut dyn Write,
) -> RunnerResult<()> {
    let mut device = match command {
        Command::Setup => Da16k::init(transport, config)?,
        _ => {
            let mut device = Da16k::new(transport, config)?;
            device.open()?;
            device
        }
    };
    let result = execute_on(&mut device, command, out);
    device.deinit();
    result
}

fn execute_on<T: Transport>(
    device: &mut Da16k<T>,
    command: &Command,
    out: &mut dyn Write,
) -> RunnerResult<()> {
    match command {
        Command::Setup => {
            writeln!(out, "setup complete")?;
            Ok(())
        }
        Command::Send { values } => {
            let msg = build_message(values.as_slice())?;
            device.send_msg(&msg)?;
            writeln!(out, "sent {} tuple(s)", msg.len())?;
            Ok(())
        }
        Command::Poll { count, interval_ms } => {
            for i in 0..*count {
                if i > 0 {
                    thread::sleep(Duration::from_millis(*interval_ms));
                }
                match device.poll_cmd()? {
                    Some(cmd) => {
                        info!("Command received: {cmd}");
                        writeln!(out, "{cmd}")?;
                    }
                    None => debug!("Poll {}: no commands", i + 1),
                }
            }
            Ok(())
        }
        Command::Stop => {
            device.iotc_stop()?;
            writeln!(out, "IoTConnect stopped")?;
            Ok(())
        }
        Command::Reset => {
            device.iotc_reset()?;
            writeln!(out, "IoTConnect reset")?;
            Ok(())
        }
    }
}
