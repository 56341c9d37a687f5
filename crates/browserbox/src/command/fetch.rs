//! FETCH and UID FETCH.

use browserbox_imap::parser::parse_attributes;
use browserbox_imap::{Attribute, Request};

/// Builds a FETCH command.
///
/// Items are upper-cased. Plain words become atoms, anything else is parsed
/// as attribute syntax so `BODY.PEEK[HEADER.FIELDS (SUBJECT)]` keeps its
/// section. Without items `FAST` is fetched.
pub fn build_fetch<S: AsRef<str>>(
    sequence: &str,
    items: &[S],
    by_uid: bool,
    changed_since: Option<&str>,
) -> Request {
    let mut query = Vec::new();
    for item in items {
        let item = item.as_ref().trim().to_uppercase();
        if item.is_empty() {
            continue;
        }
        if item.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            query.push(Attribute::atom(item));
        } else {
            match parse_attributes(item.as_bytes()) {
                Ok(parsed) if !parsed.is_empty() => query.extend(parsed),
                _ => query.push(Attribute::atom(item)),
            }
        }
    }
    if query.is_empty() {
        query.push(Attribute::atom("FAST"));
    }

    let items = if query.len() == 1 {
        query.remove(0)
    } else {
        Attribute::List(query)
    };

    let mut request = Request::new(if by_uid { "UID FETCH" } else { "FETCH" })
        .attribute(Attribute::sequence(sequence))
        .attribute(items);
    if let Some(modseq) = changed_since {
        request = request.attribute(Attribute::list(vec![
            Attribute::atom("CHANGEDSINCE"),
            Attribute::atom(modseq),
        ]));
    }
    request
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use browserbox_imap::compiler;

    use super::*;

    fn wire(request: &Request) -> String {
        compiler::compile_for_log("W1", request)
    }

    #[test]
    fn test_single_item_is_bare() {
        let request = build_fetch("1:*", &["uid"], false, None);
        assert_eq!(wire(&request), "W1 FETCH 1:* UID");
    }

    #[test]
    fn test_item_list() {
        let request = build_fetch(
            "1:*",
            &["uid", "flags", "body.peek[header.fields (subject date)]"],
            true,
            None,
        );
        assert_eq!(
            wire(&request),
            "W1 UID FETCH 1:* (UID FLAGS BODY.PEEK[HEADER.FIELDS (SUBJECT DATE)])"
        );
    }

    #[test]
    fn test_partial_and_changedsince() {
        let request = build_fetch("5", &["BODY.PEEK[]<0.1024>", "modseq"], true, Some("12345"));
        assert_eq!(
            wire(&request),
            "W1 UID FETCH 5 (BODY.PEEK[]<0.1024> MODSEQ) (CHANGEDSINCE 12345)"
        );
    }

    #[test]
    fn test_default_is_fast() {
        let request = build_fetch::<&str>("1", &[], false, None);
        assert_eq!(wire(&request), "W1 FETCH 1 FAST");
    }

    #[test]
    fn test_unparsable_item_stays_atom() {
        let request = build_fetch("1", &["body[unterminated"], false, None);
        assert_eq!(request.attributes[1], Attribute::atom("BODY[UNTERMINATED"));
    }
}
