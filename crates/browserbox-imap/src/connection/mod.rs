//! IMAP connection management.
//!
//! This module provides:
//! - Connection options (host, port, TLS, trusted certificates)
//! - The plaintext/TLS stream and the [`Transport`] seam used by tests
//! - [`ImapClient`], a cloneable handle to the driver task

mod client;
mod config;
mod stream;

pub use client::{
    BoxFuture, ContinuationHandler, ExecOptions, ImapClient, Precheck, PrecheckContext,
    ResponseFuture, WeakImapClient,
};
pub use config::ClientOptions;
pub use stream::{ImapStream, Transport, create_tls_connector};
