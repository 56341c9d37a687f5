//! FETCH response parsing.

use std::collections::BTreeMap;

use browserbox_imap::{Attribute, Response, compiler};

use super::bodystructure::{BodyNode, parse_bodystructure};
use super::envelope::{Envelope, parse_envelope};

/// One message of a FETCH response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Sequence number.
    pub nr: u32,
    /// Data items keyed by lowercased name, e.g. `uid`, `flags` or
    /// `body[header.fields (subject)]`.
    pub values: BTreeMap<String, FetchValue>,
}

/// A FETCH data item value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchValue {
    /// `NIL`.
    Null,
    /// `UID` and `RFC822.SIZE`.
    Number(u64),
    /// Any other scalar.
    Text(String),
    /// A literal, e.g. a body section.
    Bytes(Vec<u8>),
    /// `FLAGS`.
    Flags(Vec<String>),
    /// `ENVELOPE`.
    Envelope(Envelope),
    /// `BODYSTRUCTURE`.
    BodyStructure(BodyNode),
    /// Any other list, unparsed.
    List(Vec<Attribute>),
}

impl FetchValue {
    /// Returns the value as text. Literals are decoded lossily.
    #[must_use]
    pub fn as_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Self::Text(text) => Some(text.as_str().into()),
            Self::Bytes(bytes) => Some(String::from_utf8_lossy(bytes)),
            Self::Number(n) => Some(n.to_string().into()),
            _ => None,
        }
    }
}

impl Message {
    /// Returns a data item by its lowercased name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FetchValue> {
        self.values.get(key)
    }

    /// Returns the UID, if fetched.
    #[must_use]
    pub fn uid(&self) -> Option<u64> {
        match self.get("uid") {
            Some(FetchValue::Number(uid)) => Some(*uid),
            _ => None,
        }
    }

    /// Returns the flags, if fetched.
    #[must_use]
    pub fn flags(&self) -> Option<&[String]> {
        match self.get("flags") {
            Some(FetchValue::Flags(flags)) => Some(flags),
            _ => None,
        }
    }

    /// Returns the envelope, if fetched.
    #[must_use]
    pub fn envelope(&self) -> Option<&Envelope> {
        match self.get("envelope") {
            Some(FetchValue::Envelope(envelope)) => Some(envelope),
            _ => None,
        }
    }

    /// Returns the body structure, if fetched.
    #[must_use]
    pub fn bodystructure(&self) -> Option<&BodyNode> {
        match self.get("bodystructure") {
            Some(FetchValue::BodyStructure(node)) => Some(node),
            _ => None,
        }
    }
}

/// Parses every `FETCH` collected in the response payload.
#[must_use]
pub fn parse_fetch(response: &Response) -> Vec<Message> {
    response.payload("FETCH").iter().map(parse_message).collect()
}

/// Parses a single untagged `* n FETCH (...)`.
#[must_use]
pub fn parse_message(item: &Response) -> Message {
    let params = match item.attributes.first() {
        Some(Attribute::List(items)) => items.as_slice(),
        Some(other) => std::slice::from_ref(other),
        None => &[],
    };

    let values = params
        .chunks(2)
        .map(|pair| {
            let key = fetch_key(&pair[0]);
            let value = pair
                .get(1)
                .map_or(FetchValue::Null, |v| parse_value(&key, v));
            (key, value)
        })
        .collect();

    Message {
        nr: item.nr.unwrap_or(0),
        values,
    }
}

/// `BODY[HEADER]<0>` becomes `body[header]`.
fn fetch_key(attribute: &Attribute) -> String {
    let key = compiler::render(attribute).to_lowercase();
    if let Some(open) = key.rfind('<')
        && let Some(digits) = key[open + 1..].strip_suffix('>')
        && !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
    {
        return key[..open].to_string();
    }
    key
}

fn parse_value(key: &str, value: &Attribute) -> FetchValue {
    match value {
        Attribute::Nil => FetchValue::Null,
        Attribute::List(items) => match key {
            "flags" => FetchValue::Flags(items.iter().map(Attribute::text).collect()),
            "envelope" => FetchValue::Envelope(parse_envelope(items)),
            "bodystructure" => FetchValue::BodyStructure(parse_bodystructure(items)),
            "modseq" => FetchValue::Text(
                items
                    .first()
                    .and_then(Attribute::value)
                    .map_or_else(|| "0".to_string(), std::borrow::Cow::into_owned),
            ),
            _ => FetchValue::List(items.clone()),
        },
        Attribute::Literal(bytes) => FetchValue::Bytes(bytes.clone()),
        scalar => match key {
            "uid" | "rfc822.size" => FetchValue::Number(scalar.as_number().unwrap_or(0)),
            "modseq" => FetchValue::Text(
                scalar
                    .value()
                    .filter(|v| !v.is_empty())
                    .map_or_else(|| "0".to_string(), std::borrow::Cow::into_owned),
            ),
            _ => FetchValue::Text(scalar.text()),
        },
    }
}
