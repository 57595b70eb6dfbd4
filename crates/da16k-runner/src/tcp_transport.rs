//! TCP transport to a serial bridge.
//!
//! Modules on a bench are usually reached through a TCP-to-UART bridge
//! (ser2net, a simulator's UART server, etc.) that forwards raw bytes both
//! ways. This transport speaks to such a bridge with blocking std sockets.

use std::io::{self, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use da16k_at::{Transport, TransportError};
use tracing::{debug, info};

/// Shortest read timeout handed to the socket; zero would mean "forever".
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

struct Connection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    read_timeout: Option<Duration>,
}

/// Byte transport over a TCP connection.
pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
    connection: Option<Connection>,
}

impl TcpTransport {
    /// Create an unconnected transport; [`Transport::open`] connects.
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        TcpTransport {
            address: address.into(),
            connect_timeout,
            connection: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
        }))
    }
}

fn io_error(err: io::Error) -> TransportError {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => TransportError::Closed,
        _ => TransportError::Io(err.to_string()),
    }
}

impl Transport for TcpTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let stream = self
            .connect()
            .map_err(|e| TransportError::Io(format!("connect to {}: {e}", self.address)))?;
        stream.set_nodelay(true).map_err(io_error)?;
        let reader = BufReader::new(stream.try_clone().map_err(io_error)?);

        info!("Connected to UART bridge at {}", self.address);
        self.connection = Some(Connection {
            writer: stream,
            reader,
            read_timeout: None,
        });
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let conn = self.connection.as_mut().ok_or(TransportError::Closed)?;
        conn.writer.write_all(data).map_err(io_error)?;
        conn.writer.flush().map_err(io_error)
    }

    fn receive_byte(&mut self, timeout: Duration) -> Result<u8, TransportError> {
        let conn = self.connection.as_mut().ok_or(TransportError::Closed)?;

        let timeout = timeout.max(MIN_READ_TIMEOUT);
        if conn.read_timeout != Some(timeout) {
            conn.reader
                .get_ref()
                .set_read_timeout(Some(timeout))
                .map_err(io_error)?;
            conn.read_timeout = Some(timeout);
        }

        let mut byte = [0u8; 1];
        match conn.reader.read(&mut byte) {
            Ok(0) => Err(TransportError::Closed),
            Ok(_) => Ok(byte[0]),
            Err(err) => Err(io_error(err)),
        }
    }

    fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            let _ = conn.writer.shutdown(std::net::Shutdown::Both);
            debug!("Disconnected from {}", self.address);
        }
    }
}
