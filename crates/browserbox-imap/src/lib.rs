//! # browserbox-imap
//!
//! The transport layer of an IMAP client: it frames the server byte stream
//! into responses (literals included), serializes commands, and keeps a
//! queue with exactly one command in flight.
//!
//! ## Layers
//!
//! - [`parser`] and [`compiler`]: convert between wire bytes and the
//!   [`Response`] / [`Request`] trees
//! - [`protocol`]: the sans-I/O [`Framer`](protocol::Framer) owning the
//!   queue and the idle and socket timers
//! - [`connection`]: [`ImapClient`], a tokio task driving the framer over
//!   a TCP or TLS stream, with STARTTLS upgrades
//!
//! ## Quick Start
//!
//! ```ignore
//! use browserbox_imap::{ClientOptions, ExecOptions, ImapClient, Request};
//! use browserbox_imap::handler::LoggingHandler;
//!
//! #[tokio::main]
//! async fn main() -> browserbox_imap::Result<()> {
//!     let options = ClientOptions::new("imap.example.com", 993);
//!     let client = ImapClient::connect(options, LoggingHandler).await?;
//!
//!     let response = client
//!         .exec(Request::new("CAPABILITY"), ExecOptions::accept(["CAPABILITY"]))
//!         .await?
//!         .into_result()?;
//!     for capability in response.payload("CAPABILITY") {
//!         println!("{capability:?}");
//!     }
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod compiler;
pub mod connection;
mod error;
pub mod handler;
pub mod parser;
pub mod protocol;
pub mod types;

pub use connection::{
    ClientOptions, ContinuationHandler, ExecOptions, ImapClient, ImapStream, Precheck,
    PrecheckContext, ResponseFuture, Transport, WeakImapClient,
};
pub use error::{Error, Result};
pub use handler::ClientHandler;
pub use protocol::{CommandId, FramerConfig, Priority};
pub use types::{Attribute, Request, Response, ResponseCode, Status};
