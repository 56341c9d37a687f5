//! # browserbox
//!
//! A high level IMAP session on top of [`browserbox_imap`].
//!
//! [`BrowserBox::connect`] opens the connection, upgrades it with STARTTLS
//! when offered, exchanges ID and logs in with LOGIN or XOAUTH2. While no
//! command is queued the session keeps an IDLE open (or sends periodic
//! NOOPs) so that new mail is reported to the [`SessionObserver`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use browserbox::{Auth, BrowserBox, CommandOptions, Config, LoggingObserver, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> browserbox::Result<()> {
//!     let config = Config::builder("imap.example.com")
//!         .use_secure_transport(true)
//!         .auth(Auth::login("user@example.com", "password"))
//!         .build();
//!     let session = BrowserBox::connect(config, LoggingObserver).await?;
//!
//!     let tree = session.list_mailboxes().await?;
//!     for mailbox in tree.iter() {
//!         println!("{} {:?}", mailbox.path, mailbox.special_use);
//!     }
//!
//!     session.select_mailbox("INBOX", CommandOptions::new()).await?;
//!     let unseen = session
//!         .search(&SearchQuery::new().flag("unseen"), CommandOptions::new().by_uid())
//!         .await?;
//!     let messages = session
//!         .list_messages("1:*", &["uid", "flags", "envelope"], CommandOptions::new())
//!         .await?;
//!     println!("{} unseen of {}", unseen.len(), messages.len());
//!
//!     session.close().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod config;
mod error;
pub mod mime_words;
pub mod observer;
pub mod parse;
mod session;
pub mod special_use;
mod state;
pub mod utf7;

pub use command::{CommandOptions, FlagUpdate, SearchQuery, SearchValue};
pub use config::{Auth, Config, ConfigBuilder, Timeouts};
pub use error::{Error, Result};
pub use observer::{
    ChannelObserver, LoggingObserver, NoopObserver, SessionEvent, SessionObserver, Update,
};
pub use parse::{
    Address, BodyNode, Envelope, FetchValue, Mailbox, MailboxInfo, MailboxTree, Message,
    Namespace, Namespaces,
};
pub use session::{BoxFuture, BrowserBox, Precheck, PrecheckContext};
pub use state::State;
