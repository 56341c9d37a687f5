//! The task that owns the stream and the framer.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::Instrument;

use super::{Command, ContinuationHandler, ImapClient, Precheck, PrecheckContext};
use crate::Error;
use crate::connection::config::ClientOptions;
use crate::connection::stream::Transport;
use crate::handler::ClientHandler;
use crate::protocol::{CommandId, Framer, FramerEvent, QueueOptions};
use crate::types::Response;

const READ_BUFFER_SIZE: usize = 16 * 1024;

struct Pending {
    reply: oneshot::Sender<crate::Result<Response>>,
    on_continuation: Option<ContinuationHandler>,
}

enum Step {
    Read(io::Result<usize>),
    Command(Option<Command>),
    Timeout,
}

pub(super) struct Driver {
    framer: Framer,
    options: ClientOptions,
    handler: Box<dyn ClientHandler>,
    tx: mpsc::WeakUnboundedSender<Command>,
    secure: Arc<AtomicBool>,
    session_id: Arc<str>,
    pending: HashMap<CommandId, Pending>,
    prechecks: HashMap<CommandId, Precheck>,
    close_waiters: Vec<oneshot::Sender<()>>,
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

impl Driver {
    pub(super) fn new(
        options: ClientOptions,
        handler: Box<dyn ClientHandler>,
        tx: mpsc::WeakUnboundedSender<Command>,
        secure: Arc<AtomicBool>,
        session_id: Arc<str>,
    ) -> Self {
        Self {
            framer: Framer::new(options.framer.clone()),
            options,
            handler,
            tx,
            secure,
            session_id,
            pending: HashMap::new(),
            prechecks: HashMap::new(),
            close_waiters: Vec::new(),
        }
    }

    pub(super) async fn run<S: Transport>(
        mut self,
        mut stream: S,
        mut rx: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

        if stream.is_secure()
            && let Some(cert) = stream.peer_certificate()
        {
            self.handler.on_cert(&cert);
        }

        loop {
            self.settle(&mut stream).await;
            if self.framer.is_destroyed() {
                break;
            }

            let deadline = self.framer.poll_timeout().map(Instant::from_std);
            let step = tokio::select! {
                read = stream.read_buf(&mut buf) => Step::Read(read),
                command = rx.recv() => Step::Command(command),
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Step::Timeout,
            };

            match step {
                Step::Read(Ok(0)) => {
                    tracing::debug!("Server closed the connection");
                    self.framer.destroy();
                }
                Step::Read(Ok(_)) => {
                    self.framer.handle_input(&buf, now());
                    buf.clear();
                }
                Step::Read(Err(e)) => self.framer.handle_error(e.into()),
                Step::Command(None) => {
                    tracing::debug!("All client handles dropped");
                    self.framer.destroy();
                }
                Step::Command(Some(Command::Upgrade { reply })) => {
                    if stream.is_secure() {
                        let _ = reply.send(Ok(false));
                        continue;
                    }
                    self.settle(&mut stream).await;
                    let host = self.options.host.clone();
                    let ca = self.options.ca.clone();
                    match stream.upgrade(host, ca).await {
                        Ok(upgraded) => {
                            stream = upgraded;
                            self.secure.store(true, Ordering::Release);
                            tracing::debug!("Connection upgraded to TLS");
                            if let Some(cert) = stream.peer_certificate() {
                                self.handler.on_cert(&cert);
                            }
                            let _ = reply.send(Ok(true));
                        }
                        Err(e) => {
                            tracing::error!(?e, "TLS upgrade failed");
                            let _ = reply.send(Err(e));
                            self.framer.destroy();
                            self.dispatch_events();
                            drop(rx);
                            self.finish();
                            return;
                        }
                    }
                }
                Step::Command(Some(Command::Close { reply })) => {
                    self.close_waiters.push(reply);
                    self.settle(&mut stream).await;
                    self.framer.destroy();
                }
                Step::Command(Some(command)) => self.handle_command(command),
                Step::Timeout => self.framer.handle_timeout(now()),
            }
        }

        if let Err(e) = stream.shutdown().await {
            tracing::trace!(?e, "Error shutting down stream");
        }
        self.dispatch_events();
        drop(rx);
        self.finish();
    }

    fn finish(&mut self) {
        for waiter in self.close_waiters.drain(..) {
            let _ = waiter.send(());
        }
        tracing::debug!(session = %self.session_id, "Driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Exec {
                request,
                options,
                reply,
            } => {
                let queue_options = QueueOptions {
                    accept_untagged: options.accept_untagged,
                    priority: options.priority,
                    precheck: options.precheck.is_some(),
                };
                let id = self.framer.enqueue(request, queue_options, now());
                if let Some(precheck) = options.precheck {
                    self.prechecks.insert(id, precheck);
                }
                self.pending.insert(
                    id,
                    Pending {
                        reply,
                        on_continuation: options.on_continuation,
                    },
                );
            }
            Command::Raw(data) => self.framer.send_raw(data, now()),
            Command::PrecheckDone { id, result } => self.framer.precheck_done(id, result, now()),
            Command::Upgrade { reply } => {
                let _ = reply.send(Err(Error::InvalidState(
                    "upgrade handled by the driver loop".to_string(),
                )));
            }
            Command::Close { reply } => self.close_waiters.push(reply),
        }
    }

    /// Dispatches events and writes pending data until both run dry.
    async fn settle<S: Transport>(&mut self, stream: &mut S) {
        loop {
            self.dispatch_events();
            match write_all(&mut self.framer, stream).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => self.framer.handle_error(e.into()),
            }
        }
    }

    fn client(&self) -> Option<ImapClient> {
        let tx = self.tx.upgrade()?;
        Some(ImapClient::from_parts(
            tx,
            Arc::clone(&self.secure),
            Arc::clone(&self.session_id),
        ))
    }

    fn dispatch_events(&mut self) {
        while let Some(event) = self.framer.poll_event() {
            match event {
                FramerEvent::Ready => {
                    if let Some(client) = self.client() {
                        self.handler.on_ready(&client);
                    }
                }
                FramerEvent::Untagged(response) => self.handler.on_untagged(&response),
                FramerEvent::Completed { id, result } => {
                    self.prechecks.remove(&id);
                    if let Some(pending) = self.pending.remove(&id) {
                        let _ = pending.reply.send(result);
                    }
                }
                FramerEvent::Continuation { id, text } => {
                    let reply = self
                        .pending
                        .get_mut(&id)
                        .and_then(|p| p.on_continuation.as_mut())
                        .and_then(|handler| handler(&text));
                    match reply {
                        Some(data) => self.framer.send_raw(data, now()),
                        None => tracing::trace!(command = %id, "Ignoring continuation"),
                    }
                }
                FramerEvent::Precheck { id } => self.start_precheck(id),
                FramerEvent::Idle => {
                    if let Some(client) = self.client() {
                        self.handler.on_idle(&client);
                    }
                }
                FramerEvent::Error(error) => self.handler.on_error(error),
                FramerEvent::Closed => self.handler.on_close(),
            }
        }
    }

    fn start_precheck(&mut self, id: CommandId) {
        let Some(precheck) = self.prechecks.remove(&id) else {
            self.framer.precheck_done(id, Ok(()), now());
            return;
        };
        let Some(client) = self.client() else {
            self.framer
                .precheck_done(id, Err(Error::ConnectionClosed), now());
            return;
        };

        let future = precheck(PrecheckContext {
            client: client.clone(),
            ctx: id,
        });
        tokio::spawn(
            async move {
                let result = future.await;
                let _ = client.tx.send(Command::PrecheckDone { id, result });
            }
            .in_current_span(),
        );
    }
}

/// Writes everything the framer has queued. Returns true if anything was written.
async fn write_all<S: Transport>(framer: &mut Framer, stream: &mut S) -> io::Result<bool> {
    let mut wrote = false;
    while let Some(transmit) = framer.poll_transmit() {
        stream.write_all(&transmit.data).await?;
        wrote = true;
    }
    if wrote {
        stream.flush().await?;
    }
    Ok(wrote)
}
