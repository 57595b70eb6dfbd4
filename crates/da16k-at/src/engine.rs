//! The AT transaction engine.
//!
//! [`AtEngine`] owns the transport and the three scratch buffers a
//! transaction needs: the send buffer, the receive line buffer and the saved
//! response buffer. Every operation takes `&mut self`, so one engine runs one
//! transaction at a time; sharing an engine between threads needs a lock
//! around each complete transaction, since the saved response is only valid
//! until the next classification.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use da16k_metrics::metric_defs;
use log::{debug, error, warn};

use crate::classify::{self, Classification};
use crate::commands::{CertType, ETX, UART_TIMEOUT};
use crate::error::{AtError, AtResult};
use crate::line::{LineReader, RX_BUFFER_SIZE};
use crate::transport::Transport;

/// Default send buffer capacity in bytes.
pub const TX_BUFFER_SIZE: usize = 256;

/// Bytes reserved in the send buffer for the CRLF terminator.
const CRLF_RESERVE: usize = 2;

/// AT command engine over a byte transport.
pub struct AtEngine<T> {
    transport: T,
    send_buffer: BytesMut,
    tx_capacity: usize,
    reader: LineReader,
    saved_response: Vec<u8>,
    saved_capacity: usize,
}

impl<T: Transport> AtEngine<T> {
    /// Create an engine with the default buffer sizes.
    pub fn new(transport: T) -> Self {
        AtEngine {
            transport,
            send_buffer: BytesMut::with_capacity(TX_BUFFER_SIZE),
            tx_capacity: TX_BUFFER_SIZE,
            reader: LineReader::default(),
            saved_response: Vec::with_capacity(RX_BUFFER_SIZE),
            saved_capacity: RX_BUFFER_SIZE,
        }
    }

    /// Create an engine with custom send and receive buffer sizes.
    ///
    /// The saved response buffer has the same capacity as the receive buffer.
    pub fn with_buffer_sizes(
        transport: T,
        tx_capacity: usize,
        rx_capacity: usize,
    ) -> AtResult<Self> {
        if tx_capacity <= CRLF_RESERVE {
            return Err(AtError::InvalidArgument(format!(
                "send buffer of {tx_capacity} bytes cannot hold a command"
            )));
        }
        Ok(AtEngine {
            transport,
            send_buffer: BytesMut::with_capacity(tx_capacity),
            tx_capacity,
            reader: LineReader::new(rx_capacity)?,
            saved_response: Vec::with_capacity(rx_capacity),
            saved_capacity: rx_capacity,
        })
    }

    /// Open the transport.
    pub fn open(&mut self) -> AtResult<()> {
        self.transport.open().map_err(AtError::from)
    }

    /// Close the transport.
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// The last line received, complete or partial.
    pub fn last_line(&self) -> &[u8] {
        self.reader.contents()
    }

    // ========================================================================
    // Transmission
    // ========================================================================

    /// Format a command into the send buffer and transmit it.
    ///
    /// With `add_crlf` the command is terminated; without it the content is
    /// sent as-is so a command can be assembled from several calls (finish it
    /// with a terminated call, e.g. an empty format). Nothing is transmitted
    /// when formatting fails or the result does not fit the send buffer with
    /// room for the terminator.
    pub fn send_formatted(&mut self, add_crlf: bool, args: fmt::Arguments<'_>) -> AtResult<()> {
        self.send_buffer.clear();

        let mut writer = BoundedWriter {
            buffer: &mut self.send_buffer,
            capacity: self.tx_capacity,
            written: 0,
        };
        if fmt::write(&mut writer, args).is_err() {
            return Err(AtError::InvalidArgument("command formatting failed".to_string()));
        }
        let length = writer.written;

        if length + CRLF_RESERVE >= self.tx_capacity {
            return Err(AtError::MessageTooLong {
                max: self.tx_capacity - CRLF_RESERVE - 1,
                actual: length,
            });
        }

        if add_crlf {
            self.send_buffer.extend_from_slice(b"\r\n");
        }

        debug!("TX buffer: '{}'", String::from_utf8_lossy(&self.send_buffer).escape_debug());

        self.transport
            .send(&self.send_buffer)
            .map_err(|e| AtError::Transport(e.to_string()))?;

        metrics::counter!(metric_defs::AT_TX_BYTES.name).increment(self.send_buffer.len() as u64);
        if add_crlf {
            metrics::counter!(metric_defs::AT_COMMANDS_SENT.name).increment(1);
        }
        Ok(())
    }

    /// Send a terminated command. The caller classifies the response.
    pub fn send_command(&mut self, args: fmt::Arguments<'_>) -> AtResult<()> {
        self.send_formatted(true, args)
    }

    /// Send part of a command without a terminator.
    pub fn send_raw(&mut self, args: fmt::Arguments<'_>) -> AtResult<()> {
        self.send_formatted(false, args)
    }

    // ========================================================================
    // Reception
    // ========================================================================

    /// Receive response lines until the response is classified.
    ///
    /// With `expected_marker`, the payload of the first `<marker>:<payload>`
    /// line is saved. With `error_possible`, an `ERROR:<code>` line is
    /// accepted in its place and its code saved. Without a marker, a bare
    /// `OK` completes the response.
    ///
    /// Line reader errors end the wait immediately. The result is
    /// [`AtError::ErrorCode`] for an error response, [`AtError::NoOk`] when a
    /// payload arrived without `OK`, or the line reader error when nothing
    /// usable arrived.
    pub fn receive_and_validate(
        &mut self,
        error_possible: bool,
        expected_marker: Option<&str>,
        timeout: Duration,
    ) -> AtResult<()> {
        let started = Instant::now();
        let mut state = Classification::new();
        let mut last_error = None;

        self.saved_response.clear();

        loop {
            if let Err(err) = self.reader.read_line(&mut self.transport, timeout) {
                if let AtError::Overflow { max } = err {
                    warn!(
                        "RX buffer overflow ({} bytes), contents: {}",
                        max,
                        self.reader.contents_str()
                    );
                }
                last_error = Some(err);
                break;
            }

            let line = self.reader.contents();
            if !classify::is_blank(line) {
                debug!("Response line received: {}", String::from_utf8_lossy(line));
            }

            if let Some(payload) = state.feed(line, error_possible, expected_marker) {
                let take = payload.len().min(self.saved_capacity.saturating_sub(1));
                self.saved_response.extend_from_slice(&payload[..take]);
            }

            if state.is_complete() {
                break;
            }
        }

        let result = state.outcome(self.response_code(), last_error);
        if state.response_extracted {
            debug!("Saved response: {}", self.response_str());
        }

        let outcome = match &result {
            Ok(()) => "success",
            Err(err) => err.label(),
        };
        metrics::counter!(metric_defs::AT_TRANSACTIONS.name, "outcome" => outcome).increment(1);
        metrics::histogram!(metric_defs::AT_TRANSACTION_TIME.name)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        result
    }

    /// Copy of the payload saved by the last classification.
    pub fn response_str(&self) -> String {
        String::from_utf8_lossy(&self.saved_response).into_owned()
    }

    /// Leading integer of the payload saved by the last classification.
    pub fn response_code(&self) -> i32 {
        classify::parse_response_code(&self.saved_response)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Send a terminated command and check its response.
    ///
    /// With `expected_marker`, the response payload must be the code `1`;
    /// any other code yields [`AtError::CommandFailed`] and stays readable
    /// through [`response_code`](Self::response_code). Without a marker, a
    /// bare `OK` is enough.
    pub fn send_and_check(
        &mut self,
        timeout: Duration,
        expected_marker: Option<&str>,
        args: fmt::Arguments<'_>,
    ) -> AtResult<()> {
        if let Err(err) = self.send_formatted(true, args) {
            error!("Error sending message: {err}");
            return Err(err);
        }

        self.receive_and_validate(false, expected_marker, timeout)?;

        if expected_marker.is_some() {
            let code = self.response_code();
            if code != 1 {
                error!("AT command not successful. Return code: {code}");
                return Err(AtError::CommandFailed(code));
            }
        }

        Ok(())
    }

    /// Upload a PEM certificate or key into one of the module's slots.
    ///
    /// The transfer is the mode-entry sequence, the text verbatim and an ETX
    /// byte, answered by a bare `OK`.
    pub fn send_certificate(&mut self, cert_type: CertType, cert: &str) -> AtResult<()> {
        let results = [
            self.transport.send(&cert_type.mode_sequence()),
            self.transport.send(cert.as_bytes()),
            self.transport.send(&[ETX]),
        ];
        if let Some(Err(err)) = results.into_iter().find(Result::is_err) {
            error!("Certificate transfer failed: {err}");
            return Err(AtError::Transport(err.to_string()));
        }
        metrics::counter!(metric_defs::AT_TX_BYTES.name).increment(cert.len() as u64 + 5);

        self.receive_and_validate(false, None, UART_TIMEOUT)
    }
}

/// `fmt::Write` sink that measures the full formatted length but never
/// stores more than `capacity` bytes.
struct BoundedWriter<'a> {
    buffer: &'a mut BytesMut,
    capacity: usize,
    written: usize,
}

impl fmt::Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.capacity.saturating_sub(self.buffer.len());
        let take = s.len().min(room);
        self.buffer.extend_from_slice(&s.as_bytes()[..take]);
        self.written += s.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::ScriptedTransport;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn engine(response: &str) -> AtEngine<ScriptedTransport> {
        AtEngine::new(ScriptedTransport::with_response(response))
    }

    struct FailingDisplay;

    impl fmt::Display for FailingDisplay {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn test_send_formatted_appends_crlf() {
        let mut e = engine("");
        e.send_formatted(true, format_args!("AT+NWICCT {}", 1)).unwrap();
        assert_eq!(e.transport().sent_str(), "AT+NWICCT 1\r\n");
        assert_eq!(e.transport().writes().len(), 1);
    }

    #[test]
    fn test_send_raw_parts() {
        let mut e = engine("");
        e.send_raw(format_args!("AT+NWICEXMSG ")).unwrap();
        e.send_raw(format_args!("{},{},{},", 0, "key", "value")).unwrap();
        e.send_command(format_args!("")).unwrap();
        assert_eq!(e.transport().sent_str(), "AT+NWICEXMSG 0,key,value,\r\n");
        assert_eq!(e.transport().writes().len(), 3);
    }

    #[test]
    fn test_message_too_long_sends_nothing() {
        let mut e = AtEngine::with_buffer_sizes(ScriptedTransport::new(), 16, 32).unwrap();
        let err = e.send_command(format_args!("{}", "x".repeat(14))).unwrap_err();
        assert_eq!(err, AtError::MessageTooLong { max: 13, actual: 14 });
        assert!(e.transport().sent().is_empty());

        e.send_command(format_args!("{}", "x".repeat(13))).unwrap();
        assert_eq!(e.transport().sent().len(), 15);
    }

    #[test]
    fn test_limit_applies_without_crlf_too() {
        let mut e = AtEngine::with_buffer_sizes(ScriptedTransport::new(), 16, 32).unwrap();
        assert!(matches!(
            e.send_raw(format_args!("{}", "x".repeat(14))),
            Err(AtError::MessageTooLong { .. })
        ));
    }

    #[test]
    fn test_formatting_failure_is_invalid_argument() {
        let mut e = engine("");
        assert!(matches!(
            e.send_command(format_args!("AT{}", FailingDisplay)),
            Err(AtError::InvalidArgument(_))
        ));
        assert!(e.transport().sent().is_empty());
    }

    #[test]
    fn test_send_failure_is_transport_error() {
        let mut e = engine("");
        e.transport_mut().fail_sends_after(0);
        assert!(matches!(
            e.send_command(format_args!("AT")),
            Err(AtError::Transport(_))
        ));
    }

    #[test]
    fn test_expected_marker_success() {
        let mut e = engine("+CMD:hello\r\nOK\r\n");
        e.receive_and_validate(false, Some("+CMD"), TIMEOUT).unwrap();
        assert_eq!(e.response_str(), "hello");
    }

    #[test]
    fn test_error_code_response() {
        let mut e = engine("ERROR:-7\r\nOK\r\n");
        assert_eq!(
            e.receive_and_validate(true, Some("+CMD"), TIMEOUT),
            Err(AtError::ErrorCode(-7))
        );
        assert_eq!(e.response_code(), -7);
    }

    #[test]
    fn test_bare_ok() {
        let mut e = engine("OK\r\n");
        e.receive_and_validate(false, None, TIMEOUT).unwrap();
        assert_eq!(e.response_str(), "");
    }

    #[test]
    fn test_echo_and_blank_lines_skipped() {
        let mut e = engine("AT+NWICGETCMD\r\n\r\n   \r\n+NWICGETCMD:led on\r\n\r\nOK\r\n");
        e.receive_and_validate(true, Some("+NWICGETCMD"), TIMEOUT).unwrap();
        assert_eq!(e.response_str(), "led on");
    }

    #[test]
    fn test_payload_without_ok() {
        let mut e = engine("+CMD:1\r\n");
        assert_eq!(
            e.receive_and_validate(false, Some("+CMD"), TIMEOUT),
            Err(AtError::NoOk)
        );
    }

    #[test]
    fn test_silence_is_timeout() {
        let mut e = engine("");
        assert_eq!(
            e.receive_and_validate(false, None, TIMEOUT),
            Err(AtError::Timeout)
        );
    }

    #[test]
    fn test_overflow_propagates() {
        let mut e = AtEngine::with_buffer_sizes(
            ScriptedTransport::with_response("+CMD:this line is far too long\r\nOK\r\n"),
            64,
            8,
        )
        .unwrap();
        assert_eq!(
            e.receive_and_validate(false, Some("+CMD"), TIMEOUT),
            Err(AtError::Overflow { max: 8 })
        );
        assert_eq!(e.last_line(), b"+CMD:th");
    }

    #[test]
    fn test_saved_response_cleared_each_call() {
        let mut e = engine("+CMD:first\r\nOK\r\n");
        e.receive_and_validate(false, Some("+CMD"), TIMEOUT).unwrap();
        assert_eq!(e.response_str(), "first");
        assert_eq!(
            e.receive_and_validate(false, Some("+CMD"), TIMEOUT),
            Err(AtError::Timeout)
        );
        assert_eq!(e.response_str(), "");
    }

    #[test]
    fn test_transport_error_mid_response() {
        let mut e = engine("+CMD:");
        e.transport_mut().push_error(TransportError::Io("parity".to_string()));
        assert!(matches!(
            e.receive_and_validate(false, Some("+CMD"), TIMEOUT),
            Err(AtError::Transport(_))
        ));
    }

    #[test]
    fn test_send_and_check_code_one() {
        let mut e = engine("+NWICSTOPEND:1\r\nOK\r\n");
        e.send_and_check(TIMEOUT, Some("+NWICSTOPEND"), format_args!("AT+NWICSTOP"))
            .unwrap();
        assert_eq!(e.transport().sent_str(), "AT+NWICSTOP\r\n");
    }

    #[test]
    fn test_send_and_check_other_code_fails() {
        let mut e = engine("+NWICSTOPEND:-3\r\nOK\r\n");
        assert_eq!(
            e.send_and_check(TIMEOUT, Some("+NWICSTOPEND"), format_args!("AT+NWICSTOP")),
            Err(AtError::CommandFailed(-3))
        );
        assert_eq!(e.response_code(), -3);
    }

    #[test]
    fn test_send_and_check_without_marker() {
        let mut e = engine("OK\r\n");
        e.send_and_check(TIMEOUT, None, format_args!("AT+NWICCPID {}", "abc"))
            .unwrap();
    }

    #[test]
    fn test_send_and_check_send_failure_skips_receive() {
        let mut e = engine("OK\r\n");
        e.transport_mut().fail_sends_after(0);
        assert!(matches!(
            e.send_and_check(TIMEOUT, None, format_args!("AT")),
            Err(AtError::Transport(_))
        ));
        assert_eq!(e.transport().pending_rx(), 4);
    }

    #[test]
    fn test_send_certificate_framing() {
        let mut e = engine("OK\r\n");
        e.send_certificate(CertType::MqttDeviceCert, "-----BEGIN CERTIFICATE-----")
            .unwrap();
        assert_eq!(
            e.transport().sent(),
            b"\x1bC1,-----BEGIN CERTIFICATE-----\x03".to_vec()
        );
    }

    #[test]
    fn test_send_certificate_transport_failure() {
        let mut e = engine("OK\r\n");
        e.transport_mut().fail_sends_after(1);
        assert!(matches!(
            e.send_certificate(CertType::MqttDeviceKey, "key"),
            Err(AtError::Transport(_))
        ));
    }

    #[test]
    fn test_tiny_send_buffer_rejected() {
        assert!(AtEngine::with_buffer_sizes(ScriptedTransport::new(), 2, 32).is_err());
        assert!(AtEngine::with_buffer_sizes(ScriptedTransport::new(), 16, 0).is_err());
    }
}
