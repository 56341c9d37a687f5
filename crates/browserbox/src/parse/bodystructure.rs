//! BODYSTRUCTURE parsing (RFC 3501 section 7.4.2).
//!
//! Every node gets a part path usable with `BODY[<part>]`: children of a
//! multipart are numbered from 1, and the body of an embedded
//! `message/rfc822` shares the path of its parent.

use std::collections::BTreeMap;

use browserbox_imap::Attribute;

use super::envelope::{Envelope, parse_envelope};
use super::{lowercase, present};
use crate::mime_words;

/// A node of the MIME tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyNode {
    /// Part path such as `1.2`; `None` for the root.
    pub part: Option<String>,
    /// Lowercased content type, e.g. `text/plain` or `multipart/mixed`.
    pub content_type: String,
    /// Content type parameters with lowercased keys and decoded values.
    pub parameters: Option<BTreeMap<String, String>>,
    /// `Content-ID`.
    pub id: Option<String>,
    /// `Content-Description`.
    pub description: Option<String>,
    /// Lowercased transfer encoding.
    pub encoding: Option<String>,
    /// Size in octets.
    pub size: Option<u64>,
    /// Envelope of an embedded `message/rfc822`.
    pub envelope: Option<Envelope>,
    /// Line count of `text/*` and `message/rfc822` parts.
    pub line_count: Option<u64>,
    /// Lowercased MD5 of the body.
    pub md5: Option<String>,
    /// Lowercased disposition, e.g. `attachment`.
    pub disposition: Option<String>,
    /// Disposition parameters with lowercased keys and decoded values.
    pub disposition_parameters: Option<BTreeMap<String, String>>,
    /// Lowercased content languages.
    pub language: Option<Vec<String>>,
    /// Content location.
    pub location: Option<String>,
    /// Children of a multipart, or the body of a `message/rfc822`.
    pub child_nodes: Vec<BodyNode>,
}

impl BodyNode {
    /// Visits this node and all descendants depth-first.
    pub fn walk(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        Box::new(std::iter::once(self).chain(self.child_nodes.iter().flat_map(Self::walk)))
    }
}

/// Parses a BODYSTRUCTURE list.
#[must_use]
pub fn parse_bodystructure(value: &[Attribute]) -> BodyNode {
    parse_node(value, &[])
}

fn parse_node(node: &[Attribute], path: &[usize]) -> BodyNode {
    let mut current = BodyNode {
        part: (!path.is_empty()).then(|| join_path(path)),
        ..BodyNode::default()
    };
    let slot = |i: usize| node.get(i).filter(|a| present(Some(a)));
    let mut i = 0;

    if matches!(node.first(), Some(Attribute::List(_))) {
        let mut part = 0;
        while let Some(Attribute::List(child)) = node.get(i) {
            part += 1;
            let mut child_path = path.to_vec();
            child_path.push(part);
            current.child_nodes.push(parse_node(child, &child_path));
            i += 1;
        }

        current.content_type = format!("multipart/{}", lowercase(node.get(i)));
        i += 1;

        // Extension fields may stop after any position, so the trailing
        // element is read too (`body-ext-mpart` may be just the parameters).
        if i < node.len() {
            current.parameters = slot(i).map(parameters);
            i += 1;
        }
    } else {
        current.content_type = format!("{}/{}", lowercase(node.first()), lowercase(node.get(1)));
        i = 2;

        current.parameters = slot(i).map(parameters);
        current.id = slot(i + 1).map(Attribute::text);
        current.description = slot(i + 2).map(Attribute::text);
        current.encoding = slot(i + 3).map(|a| a.text().to_lowercase());
        current.size = slot(i + 4).map(|a| a.as_number().unwrap_or(0));
        i += 5;

        if current.content_type == "message/rfc822" {
            current.envelope = slot(i).and_then(Attribute::as_list).map(parse_envelope);
            if let Some(body) = slot(i + 1) {
                let body = body.as_list().unwrap_or_default();
                current.child_nodes.push(parse_node(body, path));
            }
            current.line_count = slot(i + 2).map(|a| a.as_number().unwrap_or(0));
            i += 3;
        } else if current.content_type.starts_with("text/") {
            current.line_count = slot(i).map(|a| a.as_number().unwrap_or(0));
            i += 1;
        }

        if i < node.len() {
            current.md5 = slot(i).map(|a| a.text().to_lowercase());
            i += 1;
        }
    }

    if i < node.len() {
        if let Some(disposition) = slot(i).and_then(Attribute::as_list).filter(|d| !d.is_empty()) {
            current.disposition = Some(lowercase(disposition.first()));
            if let Some(params @ Attribute::List(_)) = disposition.get(1) {
                current.disposition_parameters = Some(parameters(params));
            }
        }
        i += 1;
    }

    if i < node.len() {
        current.language = slot(i).map(|language| match language {
            Attribute::List(items) => items.iter().map(|a| lowercase(Some(a))).collect(),
            other => vec![lowercase(Some(other))],
        });
        i += 1;
    }

    if i < node.len() {
        current.location = slot(i).map(Attribute::text);
    }

    current
}

fn join_path(path: &[usize]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Turns `("charset" "utf-8" "name" "a.txt")` into a map.
fn parameters(list: &Attribute) -> BTreeMap<String, String> {
    let items = match list {
        Attribute::List(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };
    items
        .chunks(2)
        .map(|pair| {
            let key = lowercase(pair.first());
            let value = pair.get(1).map(Attribute::text).unwrap_or_default();
            (key, mime_words::decode(&value))
        })
        .collect()
}
