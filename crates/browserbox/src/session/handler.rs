//! Connection callbacks of a session.

use std::sync::Arc;

use browserbox_imap::{ClientHandler, ImapClient, Response, ResponseCode};
use tokio::sync::oneshot;

use super::{BrowserBox, Shared};
use crate::Error;
use crate::observer::Update;
use crate::parse::parse_message;

/// Routes untagged responses into the session state and the observer.
pub(super) struct SessionHandler {
    shared: Arc<Shared>,
    ready: Option<oneshot::Sender<()>>,
}

impl SessionHandler {
    pub fn new(shared: Arc<Shared>, ready: oneshot::Sender<()>) -> Self {
        Self {
            shared,
            ready: Some(ready),
        }
    }
}

impl ClientHandler for SessionHandler {
    fn on_ready(&mut self, _client: &ImapClient) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(());
        }
    }

    fn on_untagged(&mut self, response: &Response) {
        match response.command.as_str() {
            "CAPABILITY" => {
                let capability = response
                    .attributes
                    .iter()
                    .map(|a| a.text().trim().to_ascii_uppercase())
                    .filter(|c| !c.is_empty())
                    .collect();
                self.shared.set_capability(capability);
            }
            "OK" => {
                if let Some(capability) = response.code.as_ref().and_then(ResponseCode::capabilities) {
                    self.shared.set_capability(capability);
                }
            }
            "EXISTS" => {
                if let Some(nr) = response.nr {
                    self.shared.observer.on_update(Update::Exists(nr));
                }
            }
            "EXPUNGE" => {
                if let Some(nr) = response.nr {
                    self.shared.observer.on_update(Update::Expunge(nr));
                }
            }
            "FETCH" => {
                self.shared
                    .observer
                    .on_update(Update::Fetch(parse_message(response)));
            }
            _ => {}
        }
    }

    fn on_idle(&mut self, client: &ImapClient) {
        let session = BrowserBox {
            client: client.clone(),
            shared: Arc::clone(&self.shared),
        };
        if session.is_authenticated() {
            session.enter_idle();
        }
    }

    fn on_error(&mut self, error: browserbox_imap::Error) {
        tracing::error!(session = %self.shared.config.session_id, error = %error, "Connection error");
        self.shared.observer.on_error(&Error::Imap(error));
    }

    fn on_close(&mut self) {
        self.shared.lock_idle().reset();
        self.shared.observer.on_close();
    }

    fn on_cert(&mut self, certificate: &[u8]) {
        self.shared.observer.on_cert(certificate);
    }
}
