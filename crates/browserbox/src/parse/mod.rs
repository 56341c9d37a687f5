//! Typed results built from command responses.
//!
//! Each parser works on the [`Response`](browserbox_imap::Response) of a
//! completed command and the untagged responses collected in its payload.

mod bodystructure;
mod envelope;
mod fetch;
mod list;
mod namespace;
mod search;
mod select;

pub use bodystructure::{BodyNode, parse_bodystructure};
pub use envelope::{Address, Envelope, parse_envelope};
pub use fetch::{FetchValue, Message, parse_fetch, parse_message};
pub use list::{Mailbox, MailboxTree};
pub use namespace::{Namespace, Namespaces, parse_namespace};
pub use search::parse_search;
pub use select::{MailboxInfo, parse_select};

use browserbox_imap::Attribute;

/// A slot holds a value unless it is missing or `NIL`.
fn present(attribute: Option<&Attribute>) -> bool {
    attribute.is_some_and(|a| !a.is_nil())
}

/// The text of a scalar, if it is not empty.
fn non_empty(attribute: Option<&Attribute>) -> Option<String> {
    attribute
        .and_then(Attribute::value)
        .filter(|v| !v.is_empty())
        .map(std::borrow::Cow::into_owned)
}

/// The lowercased text of a scalar, or an empty string.
fn lowercase(attribute: Option<&Attribute>) -> String {
    attribute.map(Attribute::text).unwrap_or_default().to_lowercase()
}
