//! Request builders and per-command options.

mod fetch;
mod search;
mod store;

use std::future::Future;

use browserbox_imap::CommandId;

pub use search::{SearchQuery, SearchValue};
pub use store::FlagUpdate;
pub(crate) use fetch::build_fetch;
pub(crate) use search::build_search;
pub(crate) use store::build_store;

use crate::session::{BoxFuture, Precheck, PrecheckContext};

/// Modifiers accepted by the message and mailbox operations.
///
/// Each operation reads only the fields that apply to it.
#[derive(Default)]
pub struct CommandOptions {
    /// Use the `UID` variant of the command.
    pub by_uid: bool,
    /// Use `FLAGS.SILENT` with STORE.
    pub silent: bool,
    /// `CHANGEDSINCE` modifier for FETCH (RFC 4551).
    pub changed_since: Option<String>,
    /// Open the mailbox with EXAMINE.
    pub read_only: bool,
    /// Enable CONDSTORE on SELECT, if the server supports it.
    pub condstore: bool,
    /// Flags for APPEND. Defaults to `\Seen`.
    pub flags: Option<Vec<String>>,
    /// Runs once the command reaches the head of the queue.
    pub precheck: Option<Precheck>,
    /// Queue the command ahead of this one. Use the id handed to a precheck.
    pub ctx: Option<CommandId>,
}

impl std::fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandOptions")
            .field("by_uid", &self.by_uid)
            .field("silent", &self.silent)
            .field("changed_since", &self.changed_since)
            .field("read_only", &self.read_only)
            .field("condstore", &self.condstore)
            .field("flags", &self.flags)
            .field("precheck", &self.precheck.is_some())
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl CommandOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses UID FETCH, UID STORE, UID COPY, ...
    #[must_use]
    pub const fn by_uid(mut self) -> Self {
        self.by_uid = true;
        self
    }

    /// Suppresses the untagged FETCH after STORE.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Only fetch messages changed since `modseq`.
    #[must_use]
    pub fn changed_since(mut self, modseq: impl Into<String>) -> Self {
        self.changed_since = Some(modseq.into());
        self
    }

    /// Opens the mailbox read-only.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Requests CONDSTORE on SELECT.
    #[must_use]
    pub const fn condstore(mut self) -> Self {
        self.condstore = true;
        self
    }

    /// Sets the flags of an uploaded message.
    #[must_use]
    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = Some(flags.into_iter().map(Into::into).collect());
        self
    }

    /// Runs `check` before the command is sent.
    ///
    /// Commands issued from the check with [`CommandOptions::ctx`] set to
    /// [`PrecheckContext::ctx`] run first. An error cancels the command.
    #[must_use]
    pub fn precheck<F, Fut>(mut self, check: F) -> Self
    where
        F: FnOnce(PrecheckContext) -> Fut + Send + 'static,
        Fut: Future<Output = crate::Result<()>> + Send + 'static,
    {
        self.precheck = Some(Box::new(move |ctx| -> BoxFuture<crate::Result<()>> {
            Box::pin(check(ctx))
        }));
        self
    }

    /// Queues the command ahead of `ctx`.
    #[must_use]
    pub const fn ctx(mut self, ctx: CommandId) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Returns the options without their precheck.
    #[must_use]
    pub fn without_precheck(mut self) -> Self {
        self.precheck = None;
        self
    }

    /// Copies every option except the precheck, which runs only once.
    pub(crate) fn clone_without_precheck(&self) -> Self {
        Self {
            by_uid: self.by_uid,
            silent: self.silent,
            changed_since: self.changed_since.clone(),
            read_only: self.read_only,
            condstore: self.condstore,
            flags: self.flags.clone(),
            precheck: None,
            ctx: self.ctx,
        }
    }
}
