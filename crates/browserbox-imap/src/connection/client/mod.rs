//! Cloneable handle to a running IMAP connection.
//!
//! The connection itself lives in a driver task that owns the stream and
//! the [`Framer`](crate::protocol::Framer). Handles talk to it over a
//! channel; every command resolves through its own [`ResponseFuture`].

mod driver;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use super::config::ClientOptions;
use super::stream::{ImapStream, Transport};
use crate::handler::ClientHandler;
use crate::protocol::{CommandId, Priority};
use crate::types::{Request, Response};
use crate::{Error, Result};

/// A boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Runs before a command is sent, once it reached the head of the queue.
///
/// Commands issued from the precheck with [`Priority::Before`] on
/// [`PrecheckContext::ctx`] run ahead of the held command. An error removes
/// the held command and completes it with that error.
pub type Precheck = Box<dyn FnOnce(PrecheckContext) -> BoxFuture<Result<()>> + Send>;

/// Answers a `+` continuation of a running command.
///
/// Receives the text after the `+`; returned bytes are written as-is.
pub type ContinuationHandler = Box<dyn FnMut(&str) -> Option<Vec<u8>> + Send>;

/// Passed to a [`Precheck`].
#[derive(Debug, Clone)]
pub struct PrecheckContext {
    /// The connection.
    pub client: ImapClient,
    /// The held command; use it with [`Priority::Before`].
    pub ctx: CommandId,
}

/// Per-command options for [`ImapClient::exec`].
#[derive(Default)]
pub struct ExecOptions {
    /// Untagged response kinds collected into the completion payload.
    pub accept_untagged: Vec<String>,
    /// Queue position.
    pub priority: Priority,
    /// Runs before the command is sent.
    pub precheck: Option<Precheck>,
    /// Handles `+` continuations once all literals are sent.
    pub on_continuation: Option<ContinuationHandler>,
}

impl std::fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecOptions")
            .field("accept_untagged", &self.accept_untagged)
            .field("priority", &self.priority)
            .field("precheck", &self.precheck.is_some())
            .field("on_continuation", &self.on_continuation.is_some())
            .finish()
    }
}

impl ExecOptions {
    /// Collects the given untagged responses.
    #[must_use]
    pub fn accept<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accept_untagged: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the queue position.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets a precheck.
    #[must_use]
    pub fn precheck(mut self, precheck: Precheck) -> Self {
        self.precheck = Some(precheck);
        self
    }

    /// Sets the continuation handler.
    #[must_use]
    pub fn on_continuation(mut self, handler: ContinuationHandler) -> Self {
        self.on_continuation = Some(handler);
        self
    }
}

pub(crate) enum Command {
    Exec {
        request: Request,
        options: ExecOptions,
        reply: oneshot::Sender<Result<Response>>,
    },
    Raw(Vec<u8>),
    Upgrade {
        reply: oneshot::Sender<Result<bool>>,
    },
    PrecheckDone {
        id: CommandId,
        result: Result<()>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Resolves to the tagged response of one command.
///
/// NO and BAD completions resolve to `Ok`; use [`Response::into_result`]
/// to turn them into errors.
#[derive(Debug)]
#[must_use = "the command runs regardless, but its response is lost"]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<Response>>,
}

impl Future for ResponseFuture {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(Error::ConnectionClosed)))
    }
}

/// Handle to an IMAP connection.
///
/// Cheap to clone. The connection closes once [`ImapClient::close`] is
/// called, the server goes away, or every handle is dropped.
#[derive(Debug, Clone)]
pub struct ImapClient {
    tx: mpsc::UnboundedSender<Command>,
    secure: Arc<AtomicBool>,
    session_id: Arc<str>,
}

impl ImapClient {
    /// Opens a TCP (or TLS) connection and starts the driver.
    ///
    /// The returned client is usable immediately; commands wait for the
    /// server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or TLS handshake fails.
    pub async fn connect(options: ClientOptions, handler: impl ClientHandler) -> Result<Self> {
        let stream = ImapStream::connect(
            &options.host,
            options.port,
            options.use_secure_transport,
            &options.ca,
        )
        .await?;
        Ok(Self::spawn(stream, options, handler))
    }

    /// Starts the driver over an existing stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S: Transport>(stream: S, options: ClientOptions, handler: impl ClientHandler) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let secure = Arc::new(AtomicBool::new(stream.is_secure()));
        let session_id: Arc<str> = Arc::from(options.session_id.as_str());
        let span = tracing::info_span!("imap", session = %session_id);

        let driver = driver::Driver::new(
            options,
            Box::new(handler),
            tx.downgrade(),
            Arc::clone(&secure),
            Arc::clone(&session_id),
        );
        tokio::spawn(driver.run(stream, rx).instrument(span));

        Self {
            tx,
            secure,
            session_id,
        }
    }

    /// Queues a command.
    ///
    /// The command is queued when this is called, not when the future is
    /// first polled.
    pub fn exec(&self, request: impl Into<Request>, options: ExecOptions) -> ResponseFuture {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Exec {
            request: request.into(),
            options,
            reply,
        });
        ResponseFuture { rx }
    }

    /// Writes raw bytes outside of the command queue, e.g. `DONE\r\n`.
    pub fn send_raw(&self, data: impl Into<Vec<u8>>) {
        let _ = self.tx.send(Command::Raw(data.into()));
    }

    /// Upgrades the connection to TLS.
    ///
    /// Returns `false` if it was already secure.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails; the connection is closed then.
    pub async fn upgrade(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Upgrade { reply })
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.unwrap_or(Err(Error::ConnectionClosed))
    }

    /// Closes the connection and waits for the driver to finish.
    ///
    /// Queued commands resolve to [`Error::ConnectionClosed`].
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Close { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Returns true once the connection runs over TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure.load(Ordering::Acquire)
    }

    /// Returns true if the driver has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns the session identifier used in logs.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns a handle that does not keep the connection open.
    #[must_use]
    pub fn downgrade(&self) -> WeakImapClient {
        WeakImapClient {
            tx: self.tx.downgrade(),
            secure: Arc::clone(&self.secure),
            session_id: Arc::clone(&self.session_id),
        }
    }

    pub(crate) fn from_parts(
        tx: mpsc::UnboundedSender<Command>,
        secure: Arc<AtomicBool>,
        session_id: Arc<str>,
    ) -> Self {
        Self {
            tx,
            secure,
            session_id,
        }
    }
}

/// A non-owning [`ImapClient`], for timers and callbacks that must not
/// keep a dropped connection alive.
#[derive(Debug, Clone)]
pub struct WeakImapClient {
    tx: mpsc::WeakUnboundedSender<Command>,
    secure: Arc<AtomicBool>,
    session_id: Arc<str>,
}

impl WeakImapClient {
    /// Returns the client if any [`ImapClient`] handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ImapClient> {
        Some(ImapClient::from_parts(
            self.tx.upgrade()?,
            Arc::clone(&self.secure),
            Arc::clone(&self.session_id),
        ))
    }
}
