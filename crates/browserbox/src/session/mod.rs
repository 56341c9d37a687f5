//! The mailbox session.
//!
//! [`BrowserBox`] logs in, keeps the capability list current, cycles IDLE
//! or NOOP while the queue is empty and exposes one `async fn` per mailbox
//! or message operation.
//!
//! Handles are cheap to clone. Every clone talks to the same connection and
//! shares the same session state.

mod bootstrap;
mod handler;
mod idle;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use browserbox_imap::{
    Attribute, CommandId, ExecOptions, ImapClient, Priority, Request, Response, ResponseCode,
    WeakImapClient,
};

use crate::command::{
    CommandOptions, FlagUpdate, SearchQuery, build_fetch, build_search, build_store,
};
use crate::config::Config;
use crate::observer::SessionObserver;
use crate::parse::{self, MailboxInfo, MailboxTree, Message, Namespaces};
use crate::state::{SessionState, State};
use crate::{Result, utf7};

use idle::IdleState;

/// A boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Runs before a command is sent. See [`CommandOptions::precheck`].
pub type Precheck = Box<dyn FnOnce(PrecheckContext) -> BoxFuture<Result<()>> + Send>;

/// Passed to a precheck.
#[derive(Debug, Clone)]
pub struct PrecheckContext {
    /// The session. Commands issued with [`CommandOptions::ctx`] set to
    /// [`PrecheckContext::ctx`] are sent before the held command.
    pub session: BrowserBox,
    /// The held command.
    pub ctx: CommandId,
}

/// State shared between the handles and the connection callbacks.
struct Shared {
    config: Config,
    observer: Box<dyn SessionObserver>,
    state: Mutex<SessionState>,
    idle: Mutex<IdleState>,
}

impl Shared {
    fn new(config: Config, observer: Box<dyn SessionObserver>) -> Self {
        Self {
            config,
            observer,
            state: Mutex::new(SessionState::default()),
            idle: Mutex::new(IdleState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock order: `idle` before `state`.
    fn lock_idle(&self) -> MutexGuard<'_, IdleState> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_capability(&self, capability: Vec<String>) {
        tracing::debug!(session = %self.config.session_id, ?capability, "Capabilities updated");
        self.lock_state().capability = capability;
    }
}

/// An IMAP session.
///
/// Created by [`BrowserBox::connect`], which returns once the user is
/// logged in.
#[derive(Clone)]
pub struct BrowserBox {
    client: ImapClient,
    shared: Arc<Shared>,
}

impl fmt::Debug for BrowserBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserBox")
            .field("session_id", &self.session_id())
            .field("host", &self.shared.config.host)
            .field("state", &self.state())
            .field("selected_mailbox", &self.selected_mailbox())
            .finish_non_exhaustive()
    }
}

/// A handle for timers; it does not keep the connection open.
struct WeakSession {
    client: WeakImapClient,
    shared: Weak<Shared>,
}

impl WeakSession {
    fn upgrade(&self) -> Option<BrowserBox> {
        Some(BrowserBox {
            client: self.client.upgrade()?,
            shared: self.shared.upgrade()?,
        })
    }
}

impl BrowserBox {
    /// Returns the session state.
    #[must_use]
    pub fn state(&self) -> State {
        self.shared.lock_state().state
    }

    /// Returns the capabilities advertised by the server, upper-cased.
    #[must_use]
    pub fn capability(&self) -> Vec<String> {
        self.shared.lock_state().capability.clone()
    }

    /// Returns true if the server advertised `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.shared.lock_state().has_capability(capability)
    }

    /// Returns the server ID fields, keys lower-cased.
    #[must_use]
    pub fn server_id(&self) -> Option<BTreeMap<String, String>> {
        self.shared.lock_state().server_id.clone()
    }

    /// Returns the path of the selected mailbox.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<String> {
        self.shared.lock_state().selected_mailbox.clone()
    }

    /// Returns true once login succeeded.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.shared.lock_state().authenticated
    }

    /// Returns true if the connection runs over TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.client.is_secure()
    }

    /// Returns the session identifier used in logs.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.shared.config.session_id
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn client(&self) -> &ImapClient {
        &self.client
    }

    fn downgrade(&self) -> WeakSession {
        WeakSession {
            client: self.client.downgrade(),
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.shared.lock_state()
    }

    fn change_state(&self, new: State) {
        let closed = {
            let mut state = self.lock_state();
            if state.state != new {
                tracing::debug!(session = %self.session_id(), from = %state.state, to = %new, "Entering state");
            }
            state.change_state(new)
        };
        if let Some(path) = closed {
            self.shared.observer.on_close_mailbox(&path);
        }
    }

    /// Sends LOGOUT and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns the LOGOUT error; the connection is closed regardless.
    pub async fn close(&self) -> Result<()> {
        tracing::debug!(session = %self.session_id(), "Closing connection");
        self.change_state(State::Logout);
        let result = self.exec(Request::new("LOGOUT"), ExecOptions::default()).await;
        self.client.close().await;
        result.map(|_| ())
    }

    /// Runs a command after ending IDLE.
    ///
    /// A `[CAPABILITY ...]` code on the completion replaces the capability
    /// list.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures and NO or BAD completions.
    pub async fn exec(&self, request: impl Into<Request>, options: ExecOptions) -> Result<Response> {
        self.break_idle();
        let response = self.client.exec(request, options).await?;
        if let Some(capability) = response.code.as_ref().and_then(ResponseCode::capabilities) {
            self.shared.set_capability(capability);
        }
        Ok(response.into_result()?)
    }

    /// Runs a command with session-level options.
    async fn run(
        &self,
        request: Request,
        accept: &[&str],
        options: CommandOptions,
    ) -> Result<Response> {
        let mut exec = ExecOptions::accept(accept.iter().copied());
        if let Some(ctx) = options.ctx {
            exec = exec.priority(Priority::Before(ctx));
        }
        if let Some(precheck) = options.precheck {
            exec = exec.precheck(self.wrap_precheck(precheck));
        }
        self.exec(request, exec).await
    }

    /// Hands the precheck a session handle instead of the bare connection.
    fn wrap_precheck(&self, precheck: Precheck) -> browserbox_imap::Precheck {
        type Connection<T> = browserbox_imap::Result<T>;

        let shared = Arc::clone(&self.shared);
        Box::new(
            move |held: browserbox_imap::PrecheckContext| -> BoxFuture<Connection<()>> {
                let context = PrecheckContext {
                    session: Self {
                        client: held.client,
                        shared,
                    },
                    ctx: held.ctx,
                };
                Box::pin(async move {
                    precheck(context)
                        .await
                        .map_err(|e| browserbox_imap::Error::Precheck(Box::new(e)))
                })
            },
        )
    }

    /// Runs NAMESPACE (RFC 2342).
    ///
    /// Returns `None` if the server lacks the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn list_namespaces(&self) -> Result<Option<Namespaces>> {
        if !self.has_capability("NAMESPACE") {
            return Ok(None);
        }
        let response = self
            .run(Request::new("NAMESPACE"), &["NAMESPACE"], CommandOptions::default())
            .await?;
        Ok(parse::parse_namespace(&response))
    }

    /// Runs LIST and LSUB and builds the mailbox tree.
    ///
    /// A failing LSUB leaves every mailbox unsubscribed.
    ///
    /// # Errors
    ///
    /// Returns an error if LIST fails.
    pub async fn list_mailboxes(&self) -> Result<MailboxTree> {
        let list = Request::new("LIST")
            .attribute(Attribute::string(""))
            .attribute(Attribute::string("*"));
        let response = self.run(list, &["LIST"], CommandOptions::default()).await?;

        let mut tree = MailboxTree::default();
        tree.add_listed(&response);

        let lsub = Request::new("LSUB")
            .attribute(Attribute::string(""))
            .attribute(Attribute::string("*"));
        match self.run(lsub, &["LSUB"], CommandOptions::default()).await {
            Ok(response) => tree.add_subscribed(&response),
            Err(e) => {
                tracing::debug!(session = %self.session_id(), error = %e, "LSUB failed");
            }
        }
        Ok(tree)
    }

    /// Creates a mailbox. `path` is encoded as modified UTF-7.
    ///
    /// Returns `true` if the mailbox already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if CREATE fails for any other reason.
    pub async fn create_mailbox(&self, path: &str) -> Result<bool> {
        let request = Request::new("CREATE").attribute(Attribute::string(utf7::encode(path)));
        match self.run(request, &[], CommandOptions::default()).await {
            Ok(_) => Ok(false),
            Err(e) if e.code().is_some_and(|c| c.eq_ignore_ascii_case("ALREADYEXISTS")) => {
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs SELECT, or EXAMINE with [`CommandOptions::read_only`].
    ///
    /// `path` is sent as listed by the server. Selecting another mailbox
    /// reports the previous one as closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox can't be opened.
    pub async fn select_mailbox(&self, path: &str, options: CommandOptions) -> Result<MailboxInfo> {
        let command = if options.read_only { "EXAMINE" } else { "SELECT" };
        let mut request = Request::new(command).attribute(Attribute::string(path));
        if options.condstore && self.has_capability("CONDSTORE") {
            request = request.attribute(Attribute::list(vec![Attribute::atom("CONDSTORE")]));
        }

        let response = self
            .run(request, &["EXISTS", "FLAGS", "OK"], options)
            .await?;

        self.change_state(State::Selected);
        let previous = self
            .lock_state()
            .selected_mailbox
            .replace(path.to_string());
        if let Some(previous) = previous.filter(|previous| previous != path) {
            self.shared.observer.on_close_mailbox(&previous);
        }

        let info = parse::parse_select(&response);
        self.shared.observer.on_select_mailbox(path, &info);
        Ok(info)
    }

    /// Runs FETCH, or UID FETCH with [`CommandOptions::by_uid`].
    ///
    /// Items are data item names such as `uid`, `flags` or
    /// `body.peek[header.fields (subject)]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn list_messages<S: AsRef<str>>(
        &self,
        sequence: &str,
        items: &[S],
        options: CommandOptions,
    ) -> Result<Vec<Message>> {
        let request = build_fetch(
            sequence,
            items,
            options.by_uid,
            options.changed_since.as_deref(),
        );
        let response = self.run(request, &["FETCH"], options).await?;
        Ok(parse::parse_fetch(&response))
    }

    /// Runs SEARCH, or UID SEARCH with [`CommandOptions::by_uid`].
    ///
    /// Returns the matching numbers in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn search(&self, query: &SearchQuery, options: CommandOptions) -> Result<Vec<u32>> {
        let request = build_search(query, options.by_uid);
        let response = self.run(request, &["SEARCH"], options).await?;
        Ok(parse::parse_search(&response))
    }

    /// Runs STORE, or UID STORE with [`CommandOptions::by_uid`].
    ///
    /// Returns the updated messages; empty with [`CommandOptions::silent`].
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_flags(
        &self,
        sequence: &str,
        update: &FlagUpdate,
        options: CommandOptions,
    ) -> Result<Vec<Message>> {
        let request = build_store(sequence, update, options.by_uid, options.silent);
        let response = self.run(request, &["FETCH"], options).await?;
        Ok(parse::parse_fetch(&response))
    }

    /// Appends a message to `destination`.
    ///
    /// Flags default to `\Seen`.
    ///
    /// # Errors
    ///
    /// Returns an error if APPEND fails.
    pub async fn upload(
        &self,
        destination: &str,
        message: impl Into<Vec<u8>>,
        mut options: CommandOptions,
    ) -> Result<()> {
        let flags = options
            .flags
            .take()
            .unwrap_or_else(|| vec!["\\Seen".to_string()]);
        let request = Request::new("APPEND")
            .attribute(Attribute::string(destination))
            .attribute(Attribute::list(flags.into_iter().map(Attribute::atom).collect()))
            .attribute(Attribute::literal(message));
        self.run(request, &[], options).await?;
        Ok(())
    }

    /// Flags messages `\Deleted` and expunges them.
    ///
    /// With [`CommandOptions::by_uid`] and UIDPLUS only `sequence` is
    /// expunged. Otherwise plain EXPUNGE removes every message flagged
    /// `\Deleted` in the mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if STORE or EXPUNGE fails.
    pub async fn delete_messages(&self, sequence: &str, options: CommandOptions) -> Result<()> {
        let rest = options.clone_without_precheck();
        let by_uid = options.by_uid;
        self.set_flags(sequence, &FlagUpdate::add(["\\Deleted"]), options)
            .await?;

        let expunge = if by_uid && self.has_capability("UIDPLUS") {
            Request::new("UID EXPUNGE").attribute(Attribute::sequence(sequence))
        } else {
            Request::new("EXPUNGE")
        };
        self.run(expunge, &[], rest).await?;
        Ok(())
    }

    /// Copies messages to `destination`.
    ///
    /// Returns the server's completion text.
    ///
    /// # Errors
    ///
    /// Returns an error if COPY fails.
    pub async fn copy_messages(
        &self,
        sequence: &str,
        destination: &str,
        options: CommandOptions,
    ) -> Result<String> {
        let request = Request::new(if options.by_uid { "UID COPY" } else { "COPY" })
            .attribute(Attribute::sequence(sequence))
            .attribute(Attribute::string(destination));
        let response = self.run(request, &[], options).await?;
        Ok(response
            .human_readable
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "COPY completed".to_string()))
    }

    /// Moves messages to `destination`.
    ///
    /// Without the MOVE extension this copies, then deletes. The precheck
    /// only guards the first command.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the commands fails.
    pub async fn move_messages(
        &self,
        sequence: &str,
        destination: &str,
        options: CommandOptions,
    ) -> Result<()> {
        if self.has_capability("MOVE") {
            let request = Request::new(if options.by_uid { "UID MOVE" } else { "MOVE" })
                .attribute(Attribute::sequence(sequence))
                .attribute(Attribute::string(destination));
            self.run(request, &["OK"], options).await?;
            return Ok(());
        }

        let rest = options.clone_without_precheck();
        self.copy_messages(sequence, destination, options).await?;
        self.delete_messages(sequence, rest).await
    }
}
