//! ENVELOPE parsing (RFC 3501 section 7.4.2).

use browserbox_imap::Attribute;

use super::non_empty;
use crate::mime_words;

/// A parsed message envelope.
///
/// Empty fields are `None` or empty. Names and the subject are decoded
/// from RFC 2047 encoded words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// `Date` header as sent by the server.
    pub date: Option<String>,
    /// Decoded subject.
    pub subject: Option<String>,
    /// `From` addresses.
    pub from: Vec<Address>,
    /// `Sender` addresses.
    pub sender: Vec<Address>,
    /// `Reply-To` addresses.
    pub reply_to: Vec<Address>,
    /// `To` addresses.
    pub to: Vec<Address>,
    /// `Cc` addresses.
    pub cc: Vec<Address>,
    /// `Bcc` addresses.
    pub bcc: Vec<Address>,
    /// `In-Reply-To` header.
    pub in_reply_to: Option<String>,
    /// `Message-ID` header.
    pub message_id: Option<String>,
}

/// An envelope address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Decoded display name, possibly empty.
    pub name: String,
    /// `mailbox@host`.
    pub address: String,
}

/// Parses the ten envelope fields.
#[must_use]
pub fn parse_envelope(value: &[Attribute]) -> Envelope {
    let field = |i: usize| value.get(i);
    Envelope {
        date: non_empty(field(0)),
        subject: non_empty(field(1)).map(|s| mime_words::decode(&s)),
        from: addresses(field(2)),
        sender: addresses(field(3)),
        reply_to: addresses(field(4)),
        to: addresses(field(5)),
        cc: addresses(field(6)),
        bcc: addresses(field(7)),
        in_reply_to: non_empty(field(8)),
        message_id: non_empty(field(9)),
    }
}

fn addresses(list: Option<&Attribute>) -> Vec<Address> {
    let Some(items) = list.and_then(Attribute::as_list) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Attribute::as_list)
        .map(|addr| {
            let part = |i: usize| addr.get(i).map(Attribute::text).unwrap_or_default();
            Address {
                name: mime_words::decode(&part(0)),
                address: format!("{}@{}", part(2), part(3)),
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use browserbox_imap::parser::parse_attributes;

    use super::*;

    fn envelope(text: &str) -> Envelope {
        let attrs = parse_attributes(text.as_bytes()).unwrap();
        parse_envelope(attrs[0].as_list().unwrap())
    }

    #[test]
    fn test_full_envelope() {
        let env = envelope(
            r#"("Mon, 2 Sep 2013 05:30:13 -0700" "=?utf-8?Q?hello_w=C3=B6rld?=" (("Kalle" NIL "kalle" "example.com")) (("Kalle" NIL "kalle" "example.com")) NIL (("=?ISO-8859-1?Q?Andr=E9?=" NIL "andre" "example.org") (NIL NIL "bob" "example.net")) NIL NIL "<parent@example.com>" "<abc@example.com>")"#,
        );
        assert_eq!(env.date.as_deref(), Some("Mon, 2 Sep 2013 05:30:13 -0700"));
        assert_eq!(env.subject.as_deref(), Some("hello w\u{f6}rld"));
        assert_eq!(env.from[0].name, "Kalle");
        assert_eq!(env.from[0].address, "kalle@example.com");
        assert!(env.reply_to.is_empty());
        assert_eq!(env.to.len(), 2);
        assert_eq!(env.to[0].name, "Andr\u{e9}");
        assert_eq!(env.to[1].name, "");
        assert_eq!(env.to[1].address, "bob@example.net");
        assert!(env.cc.is_empty());
        assert_eq!(env.in_reply_to.as_deref(), Some("<parent@example.com>"));
        assert_eq!(env.message_id.as_deref(), Some("<abc@example.com>"));
    }

    #[test]
    fn test_nil_fields() {
        let env = envelope("(NIL NIL NIL NIL NIL NIL NIL NIL NIL NIL)");
        assert_eq!(env, Envelope::default());
    }

    #[test]
    fn test_short_envelope() {
        let env = envelope(r#"("date" "")"#);
        assert_eq!(env.date.as_deref(), Some("date"));
        assert_eq!(env.subject, None);
        assert!(env.bcc.is_empty());
    }
}
