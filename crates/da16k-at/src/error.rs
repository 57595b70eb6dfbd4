//! Error types for the AT transaction engine.

use thiserror::Error;

/// Errors reported by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No byte arrived within the per-byte timeout.
    #[error("timeout waiting for byte")]
    Timeout,

    /// The transport is closed or was never opened.
    #[error("transport closed")]
    Closed,

    /// Any other I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Outcome of a failed AT transaction.
///
/// Success is `Ok(..)`; every other classification is one of these variants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AtError {
    /// Bad input; nothing was transmitted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An allocation failed; prior state is preserved.
    #[error("out of memory")]
    OutOfMemory,

    /// The transport failed to send or receive.
    #[error("transport failure: {0}")]
    Transport(String),

    /// No byte arrived within the per-byte timeout.
    #[error("timeout waiting for response")]
    Timeout,

    /// A response line exceeded the receive buffer.
    #[error("response line exceeds {max} byte buffer")]
    Overflow { max: usize },

    /// The formatted command does not fit the send buffer.
    #[error("message too long: max {max} bytes, got {actual}")]
    MessageTooLong { max: usize, actual: usize },

    /// The module answered with `ERROR:<code>`.
    #[error("module returned error code {0}")]
    ErrorCode(i32),

    /// A response was extracted but no `OK` terminator arrived.
    #[error("response received without OK")]
    NoOk,

    /// The command was answered but its result code was not `1`.
    #[error("AT command failed with code {0}")]
    CommandFailed(i32),

    /// No cloud-to-device command is pending.
    #[error("no commands pending")]
    NoCommands,
}

impl AtError {
    /// Whether this is the non-error "nothing pending" poll result.
    pub fn is_no_commands(&self) -> bool {
        matches!(self, AtError::NoCommands)
    }

    /// The numeric code reported by the module, if any.
    pub fn response_code(&self) -> Option<i32> {
        match self {
            AtError::ErrorCode(code) | AtError::CommandFailed(code) => Some(*code),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AtError::InvalidArgument(_) => "invalid_argument",
            AtError::OutOfMemory => "out_of_memory",
            AtError::Transport(_) => "transport",
            AtError::Timeout => "timeout",
            AtError::Overflow { .. } => "overflow",
            AtError::MessageTooLong { .. } => "message_too_long",
            AtError::ErrorCode(_) => "error_code",
            AtError::NoOk => "no_ok",
            AtError::CommandFailed(_) => "command_failed",
            AtError::NoCommands => "no_commands",
        }
    }
}

impl From<TransportError> for AtError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => AtError::Timeout,
            other => AtError::Transport(other.to_string()),
        }
    }
}

/// Result type alias for AT operations.
pub type AtResult<T> = Result<T, AtError>;
