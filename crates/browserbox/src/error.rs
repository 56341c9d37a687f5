//! Error types for the mailbox session.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`crate::BrowserBox`].
#[derive(Debug, Error)]
pub enum Error {
    /// Transport, protocol or server error.
    #[error(transparent)]
    Imap(#[from] browserbox_imap::Error),

    /// No credentials were configured.
    #[error("Authentication information not provided")]
    MissingCredentials,

    /// The server did not send its greeting in time.
    #[error("{session} Timeout creating connection to the IMAP server after {after:?}")]
    ConnectionTimeout {
        /// Session identifier.
        session: String,
        /// Configured connection timeout.
        after: Duration,
    },

    /// TLS is required but the server refused STARTTLS.
    #[error("TLS is required but the server refused STARTTLS")]
    TlsRequired,
}

impl Error {
    /// Returns the bracketed response code of a NO or BAD response, e.g.
    /// `ALREADYEXISTS`.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Imap(e) => e.code(),
            _ => None,
        }
    }

    /// Returns true if the connection is unusable after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Imap(e) => e.is_fatal(),
            Self::MissingCredentials => false,
            Self::ConnectionTimeout { .. } | Self::TlsRequired => true,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_passes_through() {
        let err = Error::from(browserbox_imap::Error::No {
            code: Some("ALREADYEXISTS".to_string()),
            text: "Mailbox already exists".to_string(),
        });
        assert_eq!(err.code(), Some("ALREADYEXISTS"));
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Server returned NO: Mailbox already exists");
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::ConnectionTimeout {
            session: "[3]".to_string(),
            after: Duration::from_secs(90),
        };
        assert!(err.to_string().starts_with("[3] Timeout creating connection"));
        assert!(err.is_fatal());
        assert_eq!(err.code(), None);
    }
}
