//! Session events.
//!
//! A [`SessionObserver`] receives everything the server reports on its
//! own: new and expunged messages, flag changes, mailbox switches, errors
//! and the end of the connection.

use tokio::sync::mpsc;

use crate::Error;
use crate::parse::{MailboxInfo, Message};

/// Unsolicited mailbox changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// `* n EXISTS`: the mailbox now holds `n` messages.
    Exists(u32),
    /// `* n EXPUNGE`: message `n` was removed.
    Expunge(u32),
    /// `* n FETCH`: message data changed, usually its flags.
    Fetch(Message),
}

/// Receives session events.
///
/// All methods default to no-ops. They are called from the connection task
/// and must not block.
pub trait SessionObserver: Send + Sync + 'static {
    /// The selected mailbox changed.
    fn on_update(&self, update: Update) {
        let _ = update;
    }

    /// Login succeeded.
    fn on_auth(&self) {}

    /// A mailbox was selected.
    fn on_select_mailbox(&self, path: &str, info: &MailboxInfo) {
        let _ = (path, info);
    }

    /// The mailbox at `path` is no longer selected.
    fn on_close_mailbox(&self, path: &str) {
        let _ = path;
    }

    /// A connection or bootstrap error. The session closes afterwards.
    fn on_error(&self, error: &Error) {
        let _ = error;
    }

    /// The connection is gone.
    fn on_close(&self) {}

    /// The server presented a certificate (DER) during STARTTLS.
    fn on_cert(&self, certificate: &[u8]) {
        let _ = certificate;
    }
}

/// Ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Logs events using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_update(&self, update: Update) {
        match update {
            Update::Exists(nr) => tracing::debug!(nr, "Mailbox size changed"),
            Update::Expunge(nr) => tracing::debug!(nr, "Message expunged"),
            Update::Fetch(message) => tracing::debug!(nr = message.nr, "Message updated"),
        }
    }

    fn on_auth(&self) {
        tracing::info!("Authenticated");
    }

    fn on_select_mailbox(&self, path: &str, info: &MailboxInfo) {
        tracing::debug!(path, exists = ?info.exists, "Mailbox selected");
    }

    fn on_close_mailbox(&self, path: &str) {
        tracing::debug!(path, "Mailbox closed");
    }

    fn on_error(&self, error: &Error) {
        tracing::warn!(error = %error, "Session error");
    }

    fn on_close(&self) {
        tracing::debug!("Session closed");
    }
}

/// Events forwarded by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// See [`SessionObserver::on_update`].
    Update(Update),
    /// See [`SessionObserver::on_auth`].
    Auth,
    /// See [`SessionObserver::on_select_mailbox`].
    SelectMailbox {
        /// Mailbox path.
        path: String,
        /// Parsed SELECT response.
        info: MailboxInfo,
    },
    /// See [`SessionObserver::on_close_mailbox`].
    CloseMailbox(String),
    /// See [`SessionObserver::on_error`]; carries the error message.
    Error(String),
    /// See [`SessionObserver::on_close`].
    Close,
    /// See [`SessionObserver::on_cert`].
    Cert(Vec<u8>),
}

/// Forwards every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    /// Creates the observer and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl SessionObserver for ChannelObserver {
    fn on_update(&self, update: Update) {
        self.send(SessionEvent::Update(update));
    }

    fn on_auth(&self) {
        self.send(SessionEvent::Auth);
    }

    fn on_select_mailbox(&self, path: &str, info: &MailboxInfo) {
        self.send(SessionEvent::SelectMailbox {
            path: path.to_string(),
            info: info.clone(),
        });
    }

    fn on_close_mailbox(&self, path: &str) {
        self.send(SessionEvent::CloseMailbox(path.to_string()));
    }

    fn on_error(&self, error: &Error) {
        self.send(SessionEvent::Error(error.to_string()));
    }

    fn on_close(&self) {
        self.send(SessionEvent::Close);
    }

    fn on_cert(&self, certificate: &[u8]) {
        self.send(SessionEvent::Cert(certificate.to_vec()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_update(Update::Exists(3));
        observer.on_close_mailbox("INBOX");
        observer.on_error(&Error::MissingCredentials);
        observer.on_close();

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Update(Update::Exists(3)));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::CloseMailbox("INBOX".into()));
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Error("Authentication information not provided".into())
        );
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Close);
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_auth();
    }
}
