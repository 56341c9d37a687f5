//! NAMESPACE response parsing (RFC 2342).

use browserbox_imap::{Attribute, Response};

/// The namespaces of a server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    /// Personal namespaces, `None` when the server sent `NIL`.
    pub personal: Option<Vec<Namespace>>,
    /// Other users' namespaces.
    pub users: Option<Vec<Namespace>>,
    /// Shared namespaces.
    pub shared: Option<Vec<Namespace>>,
}

/// A single namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    /// Mailbox name prefix, e.g. `INBOX.`.
    pub prefix: String,
    /// Hierarchy delimiter; `None` for a flat namespace.
    pub delimiter: Option<String>,
}

/// Parses the last `* NAMESPACE` of the payload.
#[must_use]
pub fn parse_namespace(response: &Response) -> Option<Namespaces> {
    let attributes = &response.payload("NAMESPACE").last()?.attributes;
    if attributes.is_empty() {
        return None;
    }
    Some(Namespaces {
        personal: element(attributes.first()),
        users: element(attributes.get(1)),
        shared: element(attributes.get(2)),
    })
}

fn element(attribute: Option<&Attribute>) -> Option<Vec<Namespace>> {
    let list = attribute?.as_list()?;
    Some(
        list.iter()
            .filter_map(Attribute::as_list)
            .filter(|ns| !ns.is_empty())
            .map(|ns| Namespace {
                prefix: ns[0].text(),
                delimiter: ns
                    .get(1)
                    .and_then(Attribute::value)
                    .map(std::borrow::Cow::into_owned),
            })
            .collect(),
    )
}
