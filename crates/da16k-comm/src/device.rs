//! The DA16K device API.
//!
//! [`Da16k`] wraps an [`AtEngine`] with the IoTConnect AT gateway's command
//! set: WiFi and IoTConnect setup, telemetry and command polling. Every
//! operation is one or more blocking AT transactions and returns the first
//! failure unchanged.

use std::time::Duration;

use da16k_at::{
    AtEngine, AtError, AtResult, CertType, Transport, CMD_BULK_MESSAGE, CMD_GET_COMMAND,
    CMD_IOTC_RESET, CMD_IOTC_SETUP, CMD_IOTC_START, CMD_IOTC_STOP, CMD_SET_AUTH_TYPE,
    CMD_SET_CONNECTION_TYPE, CMD_SET_CPID, CMD_SET_DUID, CMD_SET_ENV, CMD_WIFI_JOIN,
    ERR_CODE_NO_COMMANDS, RESP_BULK_MESSAGE, RESP_GET_COMMAND, RESP_IOTC_RESET, RESP_IOTC_SETUP,
    RESP_IOTC_START, RESP_IOTC_STOP, RESP_WIFI_JOIN, TUPLES_PER_COMMAND, UART_TIMEOUT,
};
use da16k_metrics::metric_defs;
use tracing::{debug, error, info, trace, warn};

use crate::command::DeviceCommand;
use crate::config::{AuthType, Config, IotcConfig, IotcMode, WifiConfig};
use crate::message::{Message, MessageTuple, TupleValue};

/// A DA16K module running the IoTConnect AT gateway firmware.
pub struct Da16k<T> {
    engine: AtEngine<T>,
    network_timeout: Duration,
    iotc_connect_timeout: Duration,
}

impl<T: Transport> Da16k<T> {
    /// Wrap `transport` without touching it.
    ///
    /// The configuration is validated and its timeouts adopted; nothing is
    /// sent. Use [`open`](Self::open) before issuing commands, or
    /// [`init`](Self::init) to do everything at once.
    pub fn new(transport: T, config: &Config) -> AtResult<Self> {
        config.validate()?;
        Ok(Da16k {
            engine: AtEngine::new(transport),
            network_timeout: config.network_timeout(),
            iotc_connect_timeout: config.iotc_connect_timeout(),
        })
    }

    /// Open the transport and apply `config`.
    ///
    /// Joins the configured access point, then sets up and connects the
    /// configured IoTConnect session. Sections left out of `config` are not
    /// touched on the module.
    pub fn init(transport: T, config: &Config) -> AtResult<Self> {
        let mut device = Self::new(transport, config)?;

        if let Err(err) = device.open() {
            error!("Transport open failed: {err}");
            return Err(err);
        }

        if let Some(wifi) = &config.wifi {
            if let Err(err) = device.set_wifi_config(wifi) {
                error!("WiFi connection failed: {err}");
                return Err(err);
            }
        }

        if let Some(iotc) = &config.iotc {
            if let Err(err) = device.setup_iotc_and_connect(iotc) {
                error!("IoTC connection failed: {err}");
                return Err(err);
            }
        }

        Ok(device)
    }

    /// Open the transport.
    pub fn open(&mut self) -> AtResult<()> {
        self.engine.open()
    }

    /// Close the transport and hand it back.
    pub fn deinit(mut self) -> T {
        self.engine.close();
        self.engine.into_transport()
    }

    pub fn engine(&self) -> &AtEngine<T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AtEngine<T> {
        &mut self.engine
    }

    /// Timeout used for network-bound commands.
    pub fn network_timeout(&self) -> Duration {
        self.network_timeout
    }

    /// Timeout used for the IoTConnect connect step.
    pub fn iotc_connect_timeout(&self) -> Duration {
        self.iotc_connect_timeout
    }

    // ========================================================================
    // Telemetry
    // ========================================================================

    /// Send all tuples of `msg`, batching up to eight per bulk command.
    ///
    /// Batches already acknowledged stay sent if a later one fails.
    pub fn send_msg(&mut self, msg: &Message) -> AtResult<()> {
        self.send_tuples(msg.tuples())
    }

    /// Send a single string value.
    pub fn send_direct_str(&mut self, key: &str, value: &str) -> AtResult<()> {
        self.send_direct(key, TupleValue::String(value.to_string()))
    }

    /// Send a single boolean value.
    pub fn send_direct_bool(&mut self, key: &str, value: bool) -> AtResult<()> {
        self.send_direct(key, TupleValue::Bool(value))
    }

    /// Send a single number.
    pub fn send_direct_num(&mut self, key: &str, value: f64) -> AtResult<()> {
        self.send_direct(key, TupleValue::Float64(value))
    }

    fn send_direct(&mut self, key: &str, value: TupleValue) -> AtResult<()> {
        let tuple = MessageTuple::new(key, value);
        self.send_tuples(std::slice::from_ref(&tuple))
    }

    fn send_tuples(&mut self, tuples: &[MessageTuple]) -> AtResult<()> {
        if tuples.is_empty() {
            return Err(AtError::InvalidArgument("message has no tuples".to_string()));
        }
        metrics::histogram!(metric_defs::BULK_MESSAGE_SIZE.name).record(tuples.len() as f64);

        let last = tuples.len() - 1;
        for (i, tuple) in tuples.iter().enumerate() {
            if i % TUPLES_PER_COMMAND == 0 {
                if let Err(err) = self.engine.send_raw(format_args!("{CMD_BULK_MESSAGE}")) {
                    error!("Failed to initiate message: {err}");
                    return Err(err);
                }
            }

            if let Err(err) = self.send_tuple(tuple) {
                error!("Failed to send message tuple data: {err}");
                return Err(err);
            }
            metrics::counter!(metric_defs::BULK_TUPLES.name).increment(1);

            if i % TUPLES_PER_COMMAND == TUPLES_PER_COMMAND - 1 || i == last {
                if let Err(err) = self.engine.send_and_check(
                    self.network_timeout,
                    Some(RESP_BULK_MESSAGE),
                    format_args!(""),
                ) {
                    error!("Failed to finalize/validate message: {err}");
                    return Err(err);
                }
                metrics::counter!(metric_defs::BULK_BATCHES.name).increment(1);
                trace!("Bulk batch ending at tuple {} acknowledged", i);
            }
        }

        debug!("Sent {} telemetry tuples", tuples.len());
        Ok(())
    }

    fn send_tuple(&mut self, tuple: &MessageTuple) -> AtResult<()> {
        self.engine.send_raw(format_args!(
            "{},{},{},",
            tuple.value.type_tag(),
            tuple.key,
            tuple.value.encoded()
        ))
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Fetch the next pending cloud command.
    ///
    /// Returns [`AtError::NoCommands`] when nothing is pending.
    pub fn get_cmd(&mut self) -> AtResult<DeviceCommand> {
        if let Err(err) = self.engine.send_command(format_args!("{CMD_GET_COMMAND}")) {
            error!("Error sending message: {err}");
            return Err(err);
        }

        match self
            .engine
            .receive_and_validate(true, Some(RESP_GET_COMMAND), UART_TIMEOUT)
        {
            Ok(()) => {}
            Err(AtError::ErrorCode(ERR_CODE_NO_COMMANDS)) => {
                debug!("No commands available");
                return Err(AtError::NoCommands);
            }
            Err(AtError::ErrorCode(code)) => {
                error!("Bad response, error code {code}");
                return Err(AtError::CommandFailed(code));
            }
            Err(err) => return Err(err),
        }

        let command = DeviceCommand::parse(&self.engine.response_str());
        metrics::counter!(metric_defs::COMMANDS_RECEIVED.name).increment(1);
        debug!("Received command: {command}");
        Ok(command)
    }

    /// Like [`get_cmd`](Self::get_cmd), with "nothing pending" as `Ok(None)`.
    pub fn poll_cmd(&mut self) -> AtResult<Option<DeviceCommand>> {
        match self.get_cmd() {
            Ok(command) => Ok(Some(command)),
            Err(err) if err.is_no_commands() => Ok(None),
            Err(err) => Err(err),
        }
    }

    // ========================================================================
    // IoTConnect
    // ========================================================================

    pub fn set_iotc_connection_type(&mut self, mode: IotcMode) -> AtResult<()> {
        self.engine.send_and_check(
            UART_TIMEOUT,
            None,
            format_args!("{CMD_SET_CONNECTION_TYPE} {}", mode.code()),
        )
    }

    pub fn set_iotc_auth_type(&mut self, auth: AuthType) -> AtResult<()> {
        self.engine.send_and_check(
            UART_TIMEOUT,
            None,
            format_args!("{CMD_SET_AUTH_TYPE} {}", auth.code()),
        )
    }

    pub fn set_iotc_cpid(&mut self, cpid: &str) -> AtResult<()> {
        self.engine
            .send_and_check(UART_TIMEOUT, None, format_args!("{CMD_SET_CPID} {cpid}"))
    }

    pub fn set_iotc_duid(&mut self, duid: &str) -> AtResult<()> {
        self.engine
            .send_and_check(UART_TIMEOUT, None, format_args!("{CMD_SET_DUID} {duid}"))
    }

    pub fn set_iotc_env(&mut self, env: &str) -> AtResult<()> {
        self.engine
            .send_and_check(UART_TIMEOUT, None, format_args!("{CMD_SET_ENV} {env}"))
    }

    /// Set up and connect the IoTConnect session.
    pub fn iotc_start(&mut self) -> AtResult<()> {
        self.engine.send_and_check(
            self.network_timeout,
            Some(RESP_IOTC_SETUP),
            format_args!("{CMD_IOTC_SETUP}"),
        )?;
        self.engine.send_and_check(
            self.iotc_connect_timeout,
            Some(RESP_IOTC_START),
            format_args!("{CMD_IOTC_START}"),
        )?;
        metrics::gauge!(metric_defs::IOTC_CONNECTED.name).set(1.0);
        info!("IoTConnect session started");
        Ok(())
    }

    pub fn iotc_stop(&mut self) -> AtResult<()> {
        self.engine.send_and_check(
            self.network_timeout,
            Some(RESP_IOTC_STOP),
            format_args!("{CMD_IOTC_STOP}"),
        )?;
        metrics::gauge!(metric_defs::IOTC_CONNECTED.name).set(0.0);
        Ok(())
    }

    pub fn iotc_reset(&mut self) -> AtResult<()> {
        self.engine.send_and_check(
            self.network_timeout,
            Some(RESP_IOTC_RESET),
            format_args!("{CMD_IOTC_RESET}"),
        )?;
        metrics::gauge!(metric_defs::IOTC_CONNECTED.name).set(0.0);
        Ok(())
    }

    /// Join an access point.
    ///
    /// A running IoTConnect session is stopped first so it does not try to
    /// reconnect while WiFi comes up; that stop may legitimately fail when no
    /// session exists.
    pub fn set_wifi_config(&mut self, wifi: &WifiConfig) -> AtResult<()> {
        wifi.validate()?;

        if let Err(err) = self.iotc_stop() {
            debug!("Ignoring IoTC stop result before WiFi join: {err}");
        }

        self.engine.send_and_check(
            wifi.connect_timeout(),
            Some(RESP_WIFI_JOIN),
            format_args!(
                "{CMD_WIFI_JOIN} {},{},{}",
                wifi.ssid,
                wifi.key.as_deref().unwrap_or(""),
                u8::from(wifi.hidden)
            ),
        )?;
        info!("Joined WiFi network '{}'", wifi.ssid);
        Ok(())
    }

    /// Upload the MQTT client certificate and private key.
    pub fn set_device_cert(&mut self, cert: &str, key: &str) -> AtResult<()> {
        warn!(
            "Client certificate transmission via the AT command protocol is INSECURE \
             and may only be used for testing / development"
        );
        self.engine.send_certificate(CertType::MqttDeviceCert, cert)?;
        self.engine.send_certificate(CertType::MqttDeviceKey, key)?;
        Ok(())
    }

    /// Configure the IoTConnect identity and connect.
    pub fn setup_iotc_and_connect(&mut self, iotc: &IotcConfig) -> AtResult<()> {
        iotc.validate()?;

        self.iotc_stop()?;
        self.set_iotc_connection_type(iotc.mode)?;
        self.set_iotc_cpid(&iotc.cpid)?;
        self.set_iotc_duid(&iotc.duid)?;
        self.set_iotc_env(&iotc.env)?;
        self.set_iotc_auth_type(AuthType::X509)?;

        if let (Some(cert), Some(key)) = (&iotc.device_cert, &iotc.device_key) {
            self.set_device_cert(cert, key)?;
        }

        self.iotc_reset()?;
        self.iotc_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use da16k_at::ScriptedTransport;

    const ACK: &str = "+NWICEXMSG:1\r\nOK\r\n";

    fn device(response: &str) -> Da16k<ScriptedTransport> {
        let mut device =
            Da16k::new(ScriptedTransport::with_response(response), &Config::default()).unwrap();
        device.open().unwrap();
        device
    }

    fn sent(device: &Da16k<ScriptedTransport>) -> String {
        device.engine().transport().sent_str()
    }

    #[test]
    fn test_single_tuple_message() {
        let mut d = device(ACK);
        let mut msg = Message::new();
        msg.add_num("temp", 1.0).unwrap();
        d.send_msg(&msg).unwrap();
        assert_eq!(sent(&d), "AT+NWICEXMSG 3,temp,3ff0000000000000,\r\n");
    }

    #[test]
    fn test_mixed_tuple_types() {
        let mut d = device(ACK);
        let mut msg = Message::new();
        msg.add_str("name", "probe 1").unwrap();
        msg.add_bool("on", true).unwrap();
        msg.add_f32("level", 1.0).unwrap();
        d.send_msg(&msg).unwrap();
        assert_eq!(
            sent(&d),
            "AT+NWICEXMSG 0,name,probe 1,1,on,01,2,level,3f800000,\r\n"
        );
    }

    #[test]
    fn test_seventeen_tuples_make_three_batches() {
        let mut d = device(&ACK.repeat(3));
        let mut msg = Message::new();
        for i in 0..17 {
            msg.add_bool(&format!("k{i}"), i % 2 == 0).unwrap();
        }
        d.send_msg(&msg).unwrap();

        let text = sent(&d);
        let batches: Vec<&str> = text.split_terminator("\r\n").collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].matches(",k").count(), 8);
        assert_eq!(batches[1].matches(",k").count(), 8);
        assert_eq!(batches[2].matches(",k").count(), 1);
        assert!(batches.iter().all(|b| b.starts_with("AT+NWICEXMSG ")));
        assert!(batches[2].starts_with("AT+NWICEXMSG 1,k16,01,"));
        assert_eq!(d.engine().transport().pending_rx(), 0);
    }

    #[test]
    fn test_exactly_eight_tuples_one_batch() {
        let mut d = device(ACK);
        let mut msg = Message::new();
        for i in 0..8 {
            msg.add_num(&format!("v{i}"), f64::from(i)).unwrap();
        }
        d.send_msg(&msg).unwrap();
        assert_eq!(sent(&d).matches("\r\n").count(), 1);
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut d = device(ACK);
        assert!(matches!(
            d.send_msg(&Message::new()),
            Err(AtError::InvalidArgument(_))
        ));
        assert!(d.engine().transport().sent().is_empty());
    }

    #[test]
    fn test_failed_batch_stops_sending() {
        let mut d = device("+NWICEXMSG:0\r\nOK\r\n");
        let mut msg = Message::new();
        for i in 0..10 {
            msg.add_bool(&format!("k{i}"), true).unwrap();
        }
        assert_eq!(d.send_msg(&msg), Err(AtError::CommandFailed(0)));
        assert_eq!(sent(&d).matches("AT+NWICEXMSG").count(), 1);
    }

    #[test]
    fn test_later_batch_failure_keeps_earlier_batches() {
        let mut d = device(&format!("{ACK}+NWICEXMSG:0\r\nOK\r\n"));
        let mut msg = Message::new();
        for i in 0..10 {
            msg.add_bool(&format!("k{i}"), true).unwrap();
        }
        assert_eq!(d.send_msg(&msg), Err(AtError::CommandFailed(0)));

        let text = sent(&d);
        let batches: Vec<&str> = text.split_terminator("\r\n").collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].matches(",k").count(), 8);
        assert!(batches[1].starts_with("AT+NWICEXMSG 1,k8,01,1,k9,01,"));
        assert_eq!(d.engine().transport().pending_rx(), 0);
    }

    #[test]
    fn test_send_direct_variants() {
        let mut d = device(&ACK.repeat(3));
        d.send_direct_str("status", "ok").unwrap();
        d.send_direct_bool("door", false).unwrap();
        d.send_direct_num("t", -2.5).unwrap();
        assert_eq!(
            sent(&d),
            "AT+NWICEXMSG 0,status,ok,\r\n\
             AT+NWICEXMSG 1,door,00,\r\n\
             AT+NWICEXMSG 3,t,c004000000000000,\r\n"
        );
    }

    #[test]
    fn test_get_cmd_with_parameters() {
        let mut d = device("+NWICGETCMD:led on\r\nOK\r\n");
        let cmd = d.get_cmd().unwrap();
        assert_eq!(cmd.command, "led");
        assert_eq!(cmd.parameters.as_deref(), Some("on"));
        assert_eq!(sent(&d), "AT+NWICGETCMD\r\n");
    }

    #[test]
    fn test_get_cmd_no_commands() {
        let mut d = device("ERROR:-7\r\n");
        assert_eq!(d.get_cmd(), Err(AtError::NoCommands));
    }

    #[test]
    fn test_get_cmd_other_error_code() {
        let mut d = device("ERROR:-2\r\n");
        assert_eq!(d.get_cmd(), Err(AtError::CommandFailed(-2)));
    }

    #[test]
    fn test_poll_cmd() {
        let mut d = device("ERROR:-7\r\n+NWICGETCMD:reboot\r\nOK\r\n");
        assert_eq!(d.poll_cmd(), Ok(None));
        let cmd = d.poll_cmd().unwrap().unwrap();
        assert_eq!(cmd.command, "reboot");
        assert_eq!(cmd.parameters, None);
    }

    #[test]
    fn test_simple_settings() {
        let mut d = device(&"OK\r\n".repeat(5));
        d.set_iotc_connection_type(IotcMode::Azure).unwrap();
        d.set_iotc_auth_type(AuthType::X509).unwrap();
        d.set_iotc_cpid("CPID").unwrap();
        d.set_iotc_duid("dev-1").unwrap();
        d.set_iotc_env("prod").unwrap();
        assert_eq!(
            sent(&d),
            concat!(
                "AT+NWICCT 2\r\nAT+NWICAT 1\r\nAT+NWICCPID CPID\r\n",
                "AT+NWICDUID dev-1\r\nAT+NWICENV prod\r\n",
            )
        );
    }

    #[test]
    fn test_iotc_start_runs_setup_then_start() {
        let mut d = device("+NWICSETUPEND:1\r\nOK\r\n+NWICSTARTEND:1\r\nOK\r\n");
        d.iotc_start().unwrap();
        assert_eq!(sent(&d), "AT+NWICSETUP\r\nAT+NWICSTART\r\n");
    }

    #[test]
    fn test_iotc_start_stops_after_failed_setup() {
        let mut d = device("+NWICSETUPEND:0\r\nOK\r\n");
        assert_eq!(d.iotc_start(), Err(AtError::CommandFailed(0)));
        assert_eq!(sent(&d), "AT+NWICSETUP\r\n");
    }

    #[test]
    fn test_wifi_join_ignores_stop_result() {
        // No session: the stop only gets a bare OK and then times out.
        let mut d = device("OK\r\n");
        d.engine_mut().transport_mut().push_delay(Duration::from_secs(5));
        d.engine_mut().transport_mut().push_str("+WFJAP:1\r\nOK\r\n");
        let wifi = WifiConfig {
            ssid: "lab".to_string(),
            key: None,
            hidden: true,
            connect_timeout_ms: 0,
        };
        d.set_wifi_config(&wifi).unwrap();
        assert_eq!(sent(&d), "AT+NWICSTOP\r\nAT+WFJAPA lab,,1\r\n");
    }

    #[test]
    fn test_device_cert_upload() {
        let mut d = device("OK\r\nOK\r\n");
        d.set_device_cert("CERT", "KEY").unwrap();
        assert_eq!(
            d.engine().transport().sent(),
            b"\x1bC1,CERT\x03\x1bC2,KEY\x03".to_vec()
        );
    }

    #[test]
    fn test_invalid_config_rejected_before_io() {
        let config = Config {
            wifi: Some(WifiConfig {
                ssid: String::new(),
                key: None,
                hidden: false,
                connect_timeout_ms: 0,
            }),
            ..Config::default()
        };
        let result = Da16k::init(ScriptedTransport::new(), &config);
        assert!(matches!(result, Err(AtError::InvalidArgument(_))));
    }

    #[test]
    fn test_init_open_failure() {
        let mut transport = ScriptedTransport::new();
        transport.fail_open();
        assert!(matches!(
            Da16k::init(transport, &Config::default()),
            Err(AtError::Transport(_))
        ));
    }

    #[test]
    fn test_deinit_returns_closed_transport() {
        let d = device("");
        let transport = d.deinit();
        assert!(!transport.is_open());
        assert_eq!(transport.close_count(), 1);
    }
}
