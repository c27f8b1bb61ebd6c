//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::ReplyCode;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Every variant is terminal for the send attempt that produced it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server could not be reached.
    #[error("Cannot connect to {addr}: {source}")]
    Connect {
        /// `host:port` that was dialed.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// TLS handshake after STARTTLS failed.
    #[error("TLS handshake failed: {0}")]
    Tls(#[source] io::Error),

    /// The configured domain is not usable as a TLS server name.
    #[error("Invalid TLS server name: {0}")]
    InvalidServerName(String),

    /// Server replied with a code other than the expected one.
    #[error("SMTP error: {line} (expected {expected})")]
    Protocol {
        /// Code the client was waiting for.
        expected: ReplyCode,
        /// Final reply line exactly as the server sent it.
        line: String,
    },

    /// A connect, handshake or command/reply round trip took too long.
    #[error("Timed out after {after:?} waiting for {stage}")]
    Timeout {
        /// What was being waited on (e.g. `EHLO`).
        stage: &'static str,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// The peer closed the connection while a reply was pending.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// A reply line grew beyond the accepted maximum.
    #[error("Reply line exceeds {0} bytes")]
    LineTooLong(usize),

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Creates a protocol error from the expected code and the offending line.
    #[must_use]
    pub fn protocol(expected: ReplyCode, line: impl Into<String>) -> Self {
        Self::Protocol {
            expected,
            line: line.into(),
        }
    }

    /// Returns the server line that caused a protocol error, if any.
    #[must_use]
    pub fn server_line(&self) -> Option<&str> {
        match self {
            Self::Protocol { line, .. } => Some(line),
            _ => None,
        }
    }

    /// Returns true if the server rejected with a transient (4xx) reply.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.server_line()
            .is_some_and(|line| line.as_bytes().first() == Some(&b'4'))
    }

    /// Returns true if the server rejected with a permanent (5xx) reply.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.server_line()
            .is_some_and(|line| line.as_bytes().first() == Some(&b'5'))
    }
}
