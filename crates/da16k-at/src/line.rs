//! CRLF line framing over a byte transport.
//!
//! Response lines are pulled one byte at a time so the timeout applies to
//! the gap between bytes rather than to the whole line: a slow module that
//! dribbles its output still succeeds as long as no single gap exceeds the
//! timeout.

use std::time::Duration;

use bytes::BytesMut;
use da16k_metrics::metric_defs;

use crate::error::{AtError, AtResult};
use crate::transport::Transport;

/// Default receive line capacity in bytes.
pub const RX_BUFFER_SIZE: usize = 512;

/// Fixed-capacity line buffer.
///
/// After every call the logical content is followed by at least one zero
/// byte; the write cursor never exceeds `capacity - 1`.
#[derive(Debug)]
pub struct LineReader {
    buffer: BytesMut,
    len: usize,
}

impl LineReader {
    /// Create a reader with the given buffer capacity.
    pub fn new(capacity: usize) -> AtResult<Self> {
        if capacity == 0 {
            return Err(AtError::InvalidArgument(
                "line buffer capacity must be non-zero".to_string(),
            ));
        }
        Ok(LineReader {
            buffer: BytesMut::zeroed(capacity),
            len: 0,
        })
    }

    /// Buffer capacity in bytes, including the terminating zero.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Content of the last read, complete or partial.
    ///
    /// After an [`AtError::Overflow`] this is the part of the line that fit.
    pub fn contents(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Content of the last read as (lossy) text.
    pub fn contents_str(&self) -> String {
        String::from_utf8_lossy(self.contents()).into_owned()
    }

    /// Receive one CRLF-terminated line, excluding the terminator.
    ///
    /// Returns [`AtError::Overflow`] when `capacity - 1` bytes arrive without
    /// a terminator. The bytes read so far stay in the buffer and the rest of
    /// the line is left on the transport, so the next call picks up where
    /// this one stopped.
    pub fn read_line<T>(&mut self, transport: &mut T, timeout: Duration) -> AtResult<&[u8]>
    where
        T: Transport + ?Sized,
    {
        let capacity = self.buffer.len();
        if capacity == 0 {
            return Err(AtError::InvalidArgument(
                "line buffer capacity must be non-zero".to_string(),
            ));
        }

        self.buffer.fill(0);
        self.len = 0;

        let upper_bound = capacity - 1;
        let mut last = 0u8;

        loop {
            if self.len >= upper_bound {
                metrics::counter!(metric_defs::AT_LINE_OVERFLOWS.name).increment(1);
                return Err(AtError::Overflow { max: capacity });
            }

            let byte = match transport.receive_byte(timeout) {
                Ok(byte) => byte,
                Err(err) => {
                    let err = AtError::from(err);
                    if err == AtError::Timeout {
                        metrics::counter!(metric_defs::AT_TIMEOUTS.name).increment(1);
                    }
                    return Err(err);
                }
            };
            metrics::counter!(metric_defs::AT_RX_BYTES.name).increment(1);

            if last == b'\r' && byte == b'\n' {
                // Drop the CR; the LF was never stored.
                self.len -= 1;
                self.buffer[self.len] = 0;
                metrics::counter!(metric_defs::AT_LINES_RECEIVED.name).increment(1);
                return Ok(&self.buffer[..self.len]);
            }

            self.buffer[self.len] = byte;
            self.len += 1;
            last = byte;
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        LineReader {
            buffer: BytesMut::zeroed(RX_BUFFER_SIZE),
            len: 0,
        }
    }
}
