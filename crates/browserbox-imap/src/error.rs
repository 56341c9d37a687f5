//! Error types for the IMAP transport.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to an IMAP server.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A server response could not be parsed.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// An outgoing command could not be serialized.
    #[error("Failed to compile command: {0}")]
    Compile(String),

    /// Server returned a tagged NO response.
    #[error("Server returned NO: {text}")]
    No {
        /// Bracketed response code, if any.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },

    /// Server returned a tagged BAD response.
    #[error("Server returned BAD: {text}")]
    Bad {
        /// Bracketed response code, if any.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },

    /// Nothing was received from the server in time after the last write.
    #[error("Socket timed out after {0:?}")]
    SocketTimeout(Duration),

    /// The connection has been closed and can't be used anymore.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A precheck failed, the command it guarded was never sent.
    #[error("Precheck failed: {0}")]
    Precheck(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns the bracketed response code of a NO or BAD response.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::No { code, .. } | Self::Bad { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns true if the error tears the connection down.
    ///
    /// NO/BAD responses and failed prechecks only affect a single command.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::No { .. }
                | Self::Bad { .. }
                | Self::Precheck(_)
                | Self::InvalidState(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_of_no_response() {
        let err = Error::No {
            code: Some("ALREADYEXISTS".to_string()),
            text: "Mailbox exists".to_string(),
        };
        assert_eq!(err.code(), Some("ALREADYEXISTS"));
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Server returned NO: Mailbox exists");
    }

    #[test]
    fn test_transport_errors_are_fatal() {
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::SocketTimeout(Duration::from_secs(10)).is_fatal());
        assert!(Error::Compile("bad atom".into()).is_fatal());
        assert_eq!(Error::ConnectionClosed.code(), None);
    }
}
