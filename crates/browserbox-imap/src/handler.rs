//! Connection-level callbacks.
//!
//! IMAP servers may send responses at any time, not just in reply to a
//! command. The driver reports those, together with lifecycle changes, to
//! a [`ClientHandler`].
//!
//! # Example
//!
//! ```
//! use browserbox_imap::handler::ClientHandler;
//! use browserbox_imap::types::Response;
//!
//! struct ExistsCounter {
//!     last: Option<u32>,
//! }
//!
//! impl ClientHandler for ExistsCounter {
//!     fn on_untagged(&mut self, response: &Response) {
//!         if response.command == "EXISTS" {
//!             self.last = response.nr;
//!         }
//!     }
//! }
//! ```

use crate::Error;
use crate::connection::ImapClient;
use crate::types::Response;

/// Receives connection events from the driver task.
///
/// All methods have no-op defaults. They run on the driver task, so they
/// must not block; spawn a task for anything that awaits.
pub trait ClientHandler: Send + 'static {
    /// The greeting was received and commands are flowing.
    fn on_ready(&mut self, client: &ImapClient) {
        let _ = client;
    }

    /// An untagged response that no running command collected.
    fn on_untagged(&mut self, response: &Response) {
        let _ = response;
    }

    /// The command queue has been empty for a while.
    fn on_idle(&mut self, client: &ImapClient) {
        let _ = client;
    }

    /// A fatal error; [`ClientHandler::on_close`] follows.
    fn on_error(&mut self, error: Error) {
        let _ = error;
    }

    /// The connection is gone. Called once.
    fn on_close(&mut self) {}

    /// The server presented a certificate (DER) during a TLS upgrade.
    fn on_cert(&mut self, certificate: &[u8]) {
        let _ = certificate;
    }
}

/// A no-op handler that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ClientHandler for NoopHandler {}

/// A handler that logs events using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ClientHandler for LoggingHandler {
    fn on_ready(&mut self, _client: &ImapClient) {
        tracing::debug!("Connection ready");
    }

    fn on_untagged(&mut self, response: &Response) {
        tracing::debug!(command = %response.command, nr = ?response.nr, "Unsolicited response");
    }

    fn on_idle(&mut self, _client: &ImapClient) {
        tracing::trace!("Connection idle");
    }

    fn on_error(&mut self, error: Error) {
        tracing::warn!(error = %error, "Connection error");
    }

    fn on_close(&mut self) {
        tracing::debug!("Connection closed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handlers_accept_events() {
        let response = crate::parser::parse(b"* 3 EXISTS").unwrap();

        let mut noop = NoopHandler;
        noop.on_untagged(&response);
        noop.on_error(Error::ConnectionClosed);
        noop.on_cert(b"der");
        noop.on_close();

        let mut logging = LoggingHandler;
        logging.on_untagged(&response);
        logging.on_error(Error::ConnectionClosed);
        logging.on_close();
    }
}
