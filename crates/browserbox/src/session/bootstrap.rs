//! Connection setup: greeting, CAPABILITY, STARTTLS, ID and login.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use browserbox_imap::{Attribute, ExecOptions, ImapClient, ImapStream, Request, Transport};
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};

use super::handler::SessionHandler;
use super::{BrowserBox, Shared};
use crate::config::{Auth, Config};
use crate::observer::SessionObserver;
use crate::state::State;
use crate::{Error, Result};

/// Error details sent by the server in the XOAUTH2 continuation.
#[derive(Debug, Deserialize)]
struct XOAuth2Error {
    status: Option<String>,
    schemes: Option<String>,
    scope: Option<String>,
}

impl BrowserBox {
    /// Connects, upgrades to TLS if possible, and logs in.
    ///
    /// The server greeting must arrive within
    /// [`Timeouts::connection`](crate::Timeouts).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, TLS upgrade or login fails. The
    /// error is reported to the observer as well.
    pub async fn connect(config: Config, observer: impl SessionObserver) -> Result<Self> {
        tracing::debug!(
            session = %config.session_id,
            host = %config.host,
            port = config.port,
            "Connecting"
        );
        let deadline = Instant::now() + config.timeouts.connection;
        let connecting = ImapStream::connect(
            &config.host,
            config.port,
            config.use_secure_transport,
            &config.ca,
        );
        let stream = match timeout_at(deadline, connecting).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                let error = Error::from(e);
                observer.on_error(&error);
                return Err(error);
            }
            Err(_) => {
                let error = timeout_error(&config);
                observer.on_error(&error);
                return Err(error);
            }
        };
        Self::start(stream, config, Box::new(observer), deadline).await
    }

    /// Runs a session over an established stream.
    ///
    /// # Errors
    ///
    /// See [`BrowserBox::connect`].
    pub async fn connect_with<S: Transport>(
        stream: S,
        config: Config,
        observer: impl SessionObserver,
    ) -> Result<Self> {
        let deadline = Instant::now() + config.timeouts.connection;
        Self::start(stream, config, Box::new(observer), deadline).await
    }

    async fn start<S: Transport>(
        stream: S,
        config: Config,
        observer: Box<dyn SessionObserver>,
        deadline: Instant,
    ) -> Result<Self> {
        let options = config.client_options();
        let shared = Arc::new(Shared::new(config, observer));
        let (ready_tx, ready_rx) = oneshot::channel();
        let client = ImapClient::spawn(
            stream,
            options,
            SessionHandler::new(Arc::clone(&shared), ready_tx),
        );
        let session = Self { client, shared };

        match timeout_at(deadline, ready_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(browserbox_imap::Error::ConnectionClosed.into()),
            Err(_) => {
                let error = timeout_error(&session.shared.config);
                tracing::error!(session = %session.session_id(), error = %error, "No greeting");
                return Err(session.abort(error).await);
            }
        }

        session.bootstrap().await?;
        Ok(session)
    }

    async fn bootstrap(&self) -> Result<()> {
        tracing::debug!(session = %self.session_id(), "Connection established");
        self.change_state(State::NotAuthenticated);

        if let Err(e) = self.update_capability(false).await {
            tracing::debug!(session = %self.session_id(), error = %e, "CAPABILITY failed");
        }

        if let Err(e) = self.upgrade_connection().await {
            return Err(self.abort(e).await);
        }

        let id = self.shared.config.id.clone();
        if let Err(e) = self.update_id(id.as_deref()).await {
            tracing::error!(session = %self.session_id(), error = %e, "Error updating server id");
        }

        let auth = self.shared.config.auth.clone();
        let login = match auth {
            Some(auth) => self.login(&auth).await,
            None => Err(Error::MissingCredentials),
        };
        if let Err(e) = login {
            return Err(self.abort(e).await);
        }

        self.shared.observer.on_auth();
        Ok(())
    }

    /// Reports a setup failure and closes the connection.
    async fn abort(&self, error: Error) -> Error {
        self.shared.observer.on_error(&error);
        self.client.close().await;
        error
    }

    /// Runs CAPABILITY.
    ///
    /// Skipped, returning `false`, if the list is already known and
    /// `forced` is not set, or if TLS is required but not active yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn update_capability(&self, forced: bool) -> Result<bool> {
        let known = !self.lock_state().capability.is_empty();
        if known && !forced {
            return Ok(false);
        }
        if !self.client.is_secure() && self.shared.config.require_tls {
            return Ok(false);
        }

        self.exec(Request::new("CAPABILITY"), ExecOptions::default())
            .await?;
        Ok(true)
    }

    /// Runs STARTTLS and upgrades the connection.
    ///
    /// Skipped if the connection is secure already, or if the server does
    /// not advertise STARTTLS (or it is disabled) and TLS is not required.
    /// Returns true if the connection was upgraded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsRequired`] if TLS is required and the server
    /// refused, or the command or handshake error.
    pub async fn upgrade_connection(&self) -> Result<bool> {
        if self.client.is_secure() {
            return Ok(false);
        }
        let config = &self.shared.config;
        if (!self.has_capability("STARTTLS") || config.ignore_tls) && !config.require_tls {
            return Ok(false);
        }

        match self.exec(Request::new("STARTTLS"), ExecOptions::default()).await {
            Ok(_) => {}
            Err(Error::Imap(e)) if config.require_tls && !e.is_fatal() => {
                tracing::error!(session = %self.session_id(), error = %e, "STARTTLS refused");
                return Err(Error::TlsRequired);
            }
            Err(e) => return Err(e),
        }

        self.lock_state().capability.clear();
        let upgraded = self.client.upgrade().await?;
        tracing::debug!(session = %self.session_id(), "Connection upgraded to TLS");

        if let Err(e) = self.update_capability(false).await {
            tracing::debug!(session = %self.session_id(), error = %e, "CAPABILITY failed");
        }
        Ok(upgraded)
    }

    /// Runs ID (RFC 2971) with the given client fields, or `NIL`.
    ///
    /// Returns the server's fields, or `None` without the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn update_id(
        &self,
        id: Option<&[(String, String)]>,
    ) -> Result<Option<BTreeMap<String, String>>> {
        if !self.has_capability("ID") {
            return Ok(None);
        }

        let fields = id.map_or(Attribute::Nil, |fields| {
            Attribute::list(
                fields
                    .iter()
                    .flat_map(|(key, value)| {
                        [Attribute::string(key.as_str()), Attribute::string(value.as_str())]
                    })
                    .collect(),
            )
        });
        let response = self
            .exec(Request::new("ID").attribute(fields), ExecOptions::accept(["ID"]))
            .await?;

        let Some(item) = response.payload("ID").first() else {
            return Ok(None);
        };
        let values = item
            .attributes
            .first()
            .and_then(|a| a.as_list())
            .unwrap_or_default();
        let server_id: BTreeMap<String, String> = values
            .chunks(2)
            .map(|pair| {
                let key = pair[0].text().trim().to_lowercase();
                let value = pair.get(1).map(Attribute::text).unwrap_or_default();
                (key, value)
            })
            .collect();

        tracing::debug!(session = %self.session_id(), ?server_id, "Server id updated");
        self.lock_state().server_id = Some(server_id.clone());
        Ok(Some(server_id))
    }

    /// Logs in with AUTHENTICATE XOAUTH2 if the server supports it and a
    /// token is set, otherwise with LOGIN.
    ///
    /// Capabilities are refreshed afterwards, from the completion if the
    /// server included them.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials.
    pub async fn login(&self, auth: &Auth) -> Result<()> {
        let mut options = ExecOptions::accept(["CAPABILITY"]);
        let request = match &auth.xoauth2 {
            Some(token) if self.has_capability("AUTH=XOAUTH2") => {
                let session = self.session_id().to_string();
                options = options.on_continuation(Box::new(move |payload: &str| {
                    log_xoauth2_error(&session, payload);
                    Some(b"\r\n".to_vec())
                }));
                Request::new("AUTHENTICATE")
                    .attribute(Attribute::atom("XOAUTH2"))
                    .attribute(Attribute::sensitive(Attribute::atom(xoauth2_token(
                        &auth.user, token,
                    ))))
            }
            _ => Request::new("LOGIN")
                .attribute(Attribute::string(auth.user.as_str()))
                .attribute(Attribute::sensitive(Attribute::string(
                    auth.pass.as_deref().unwrap_or_default(),
                ))),
        };

        let response = self.exec(request, options).await?;
        self.change_state(State::Authenticated);
        self.lock_state().authenticated = true;

        if response.code.as_ref().is_some_and(|code| code.is("CAPABILITY")) {
            return Ok(());
        }
        if let Some(listed) = response.payload("CAPABILITY").last() {
            let capability = listed
                .attributes
                .iter()
                .map(|a| a.text().trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
            self.shared.set_capability(capability);
            return Ok(());
        }
        self.update_capability(true).await?;
        Ok(())
    }
}

fn timeout_error(config: &Config) -> Error {
    Error::ConnectionTimeout {
        session: config.session_id.clone(),
        after: config.timeouts.connection,
    }
}

/// SASL XOAUTH2 initial response.
fn xoauth2_token(user: &str, token: &str) -> String {
    STANDARD.encode(format!("user={user}\x01auth=Bearer {token}\x01\x01"))
}

/// The server answers a rejected token with a base64 JSON continuation.
fn log_xoauth2_error(session: &str, payload: &str) {
    let parsed = STANDARD
        .decode(payload.trim())
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_slice::<XOAuth2Error>(&json).map_err(|e| e.to_string()));
    match parsed {
        Ok(details) => tracing::error!(
            session = %session,
            status = ?details.status,
            schemes = ?details.schemes,
            scope = ?details.scope,
            "XOAUTH2 token rejected"
        ),
        Err(e) => tracing::error!(session = %session, error = %e, "Error parsing XOAUTH2 payload"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_xoauth2_token() {
        let token = xoauth2_token(
            "someuser@example.com",
            "ya29.vF9dft4qmTc2Nvb3RlckBhdHRhdmlzdGEuY29tCg",
        );
        assert_eq!(
            token,
            "dXNlcj1zb21ldXNlckBleGFtcGxlLmNvbQFhdXRoPUJlYXJlciB5YTI5LnZGOWRmdDRxbVRjMk52YjNSbGNrQmhkSFJoZG1semRHRXVZMjl0Q2cBAQ=="
        );
    }

    #[test]
    fn test_xoauth2_error_payload() {
        let json = br#"{"status":"401","schemes":"bearer mac","scope":"https://mail.google.com/"}"#;
        let details: XOAuth2Error = serde_json::from_slice(json).unwrap();
        assert_eq!(details.status.as_deref(), Some("401"));
        assert_eq!(details.scope.as_deref(), Some("https://mail.google.com/"));

        // Malformed payloads are only logged.
        log_xoauth2_error("[1]", "not base64!");
        log_xoauth2_error("[1]", &STANDARD.encode(json));
    }
}
