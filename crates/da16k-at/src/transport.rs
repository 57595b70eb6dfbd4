//! Byte-stream transports the engine runs on.
//!
//! The engine never touches the medium directly; everything goes through the
//! [`Transport`] trait. Two implementations live here:
//!
//! - [`ScriptedTransport`]: a deterministic in-memory script of received
//!   bytes, gaps and errors that records everything sent. Used for tests and
//!   for replaying captured module output.
//! - [`ChannelTransport`]: one half of a crossbeam channel pair. The other
//!   half, [`ModuleEndpoint`], can be driven from another thread to play the
//!   module's role (or to bridge to a reader thread owning a real port).

use std::collections::VecDeque;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::classify::find_subslice;
use crate::error::TransportError;

/// A byte-stream connection to the module.
pub trait Transport {
    /// Open the underlying medium.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Write all of `data`.
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive a single byte, waiting at most `timeout` for it to arrive.
    fn receive_byte(&mut self, timeout: Duration) -> Result<u8, TransportError>;

    /// Close the underlying medium.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<(), TransportError> {
        (**self).open()
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn receive_byte(&mut self, timeout: Duration) -> Result<u8, TransportError> {
        (**self).receive_byte(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

// ============================================================================
// Scripted Transport
// ============================================================================

/// One step of a receive script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxEvent {
    /// A byte becomes available.
    Byte(u8),
    /// The line stays silent for this long before the next event.
    Delay(Duration),
    /// The transport reports an error.
    Error(TransportError),
}

/// In-memory transport replaying a receive script.
///
/// A [`RxEvent::Delay`] longer than the caller's per-byte timeout is consumed
/// and reported as [`TransportError::Timeout`]; shorter delays are skipped.
/// An exhausted script reports a timeout as well.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    rx: VecDeque<RxEvent>,
    writes: Vec<Vec<u8>>,
    open: bool,
    fail_open: bool,
    sends_before_failure: Option<usize>,
    open_count: usize,
    close_count: usize,
}

impl ScriptedTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose receive script is `data`.
    pub fn with_response(data: &str) -> Self {
        let mut transport = Self::new();
        transport.push_str(data);
        transport
    }

    /// Append bytes to the receive script.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().map(|&b| RxEvent::Byte(b)));
    }

    /// Append a string to the receive script.
    pub fn push_str(&mut self, data: &str) {
        self.push_bytes(data.as_bytes());
    }

    /// Append a silent gap to the receive script.
    pub fn push_delay(&mut self, delay: Duration) {
        self.rx.push_back(RxEvent::Delay(delay));
    }

    /// Append an error to the receive script.
    pub fn push_error(&mut self, err: TransportError) {
        self.rx.push_back(RxEvent::Error(err));
    }

    /// Make the next `open()` fail.
    pub fn fail_open(&mut self) {
        self.fail_open = true;
    }

    /// Let `count` sends succeed, then fail every following one.
    pub fn fail_sends_after(&mut self, count: usize) {
        self.sends_before_failure = Some(count);
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// All bytes sent so far, concatenated.
    pub fn sent(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// All bytes sent so far as (lossy) text.
    pub fn sent_str(&self) -> String {
        String::from_utf8_lossy(&self.sent()).into_owned()
    }

    /// Number of receive events not yet consumed.
    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }

    /// Whether the transport is currently open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// How many times `open()` succeeded.
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    /// How many times `close()` was called.
    pub fn close_count(&self) -> usize {
        self.close_count
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.fail_open {
            self.fail_open = false;
            return Err(TransportError::Io("open failed".to_string()));
        }
        self.open = true;
        self.open_count += 1;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if let Some(remaining) = self.sends_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(TransportError::Io("send failed".to_string()));
            }
            *remaining -= 1;
        }
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn receive_byte(&mut self, timeout: Duration) -> Result<u8, TransportError> {
        loop {
            match self.rx.pop_front() {
                None => return Err(TransportError::Timeout),
                Some(RxEvent::Byte(b)) => return Ok(b),
                Some(RxEvent::Delay(gap)) if gap > timeout => return Err(TransportError::Timeout),
                Some(RxEvent::Delay(_)) => continue,
                Some(RxEvent::Error(err)) => return Err(err),
            }
        }
    }

    fn close(&mut self) {
        self.open = false;
        self.close_count += 1;
    }
}

// ============================================================================
// Channel Transport
// ============================================================================

/// Host side of an in-process byte channel.
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<u8>,
    open: bool,
}

/// Module side of an in-process byte channel.
///
/// Receives whatever the host writes and feeds bytes back to it.
pub struct ModuleEndpoint {
    rx: Receiver<Vec<u8>>,
    tx: Sender<u8>,
    pending: Vec<u8>,
}

/// Create a connected host/module channel pair.
pub fn channel_pair() -> (ChannelTransport, ModuleEndpoint) {
    let (host_tx, module_rx) = crossbeam_channel::unbounded();
    let (module_tx, host_rx) = crossbeam_channel::unbounded();
    (
        ChannelTransport {
            tx: host_tx,
            rx: host_rx,
            open: false,
        },
        ModuleEndpoint {
            rx: module_rx,
            tx: module_tx,
            pending: Vec::new(),
        },
    )
}

impl ChannelTransport {
    /// Whether `open()` has been called without a matching `close()`.
    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Transport for ChannelTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.open = true;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn receive_byte(&mut self, timeout: Duration) -> Result<u8, TransportError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TransportError::Timeout,
            RecvTimeoutError::Disconnected => TransportError::Closed,
        })
    }

    fn close(&mut self) {
        self.open = false;
    }
}

impl ModuleEndpoint {
    /// Send bytes to the host.
    ///
    /// Returns false once the host side has been dropped.
    pub fn reply(&self, data: &[u8]) -> bool {
        data.iter().all(|&b| self.tx.send(b).is_ok())
    }

    /// Send a string to the host.
    pub fn reply_str(&self, data: &str) -> bool {
        self.reply(data.as_bytes())
    }

    /// Read host bytes until `delimiter` has been seen.
    ///
    /// Returns the bytes before the delimiter; the delimiter itself is
    /// consumed. Returns `None` when nothing completes within `timeout` of
    /// the last write or when the host has gone away; bytes gathered so far
    /// are kept for the next call.
    pub fn read_until(&mut self, delimiter: &[u8], timeout: Duration) -> Option<Vec<u8>> {
        loop {
            if let Some(pos) = find_subslice(&self.pending, delimiter) {
                let rest = self.pending.split_off(pos + delimiter.len());
                let mut item = std::mem::replace(&mut self.pending, rest);
                item.truncate(pos);
                return Some(item);
            }
            match self.rx.recv_timeout(timeout) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(_) => return None,
            }
        }
    }

    /// Read one CRLF-terminated command line from the host.
    pub fn read_line(&mut self, timeout: Duration) -> Option<String> {
        self.read_until(b"\r\n", timeout)
            .map(|line| String::from_utf8_lossy(&line).into_owned())
    }
}
