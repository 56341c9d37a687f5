//! SELECT and EXAMINE response parsing.

use browserbox_imap::{Attribute, Response};

/// Information about a freshly selected mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxInfo {
    /// The mailbox was opened read-only (`[READ-ONLY]`).
    pub read_only: bool,
    /// Number of messages.
    pub exists: Option<u32>,
    /// Flags defined in the mailbox.
    pub flags: Vec<String>,
    /// Flags the client can change permanently.
    pub permanent_flags: Vec<String>,
    /// `UIDVALIDITY`.
    pub uid_validity: Option<u64>,
    /// `UIDNEXT`.
    pub uid_next: Option<u64>,
    /// `HIGHESTMODSEQ`, kept as text since it is a 64-bit unsigned value.
    pub highest_modseq: Option<String>,
}

/// Parses the tagged completion of SELECT or EXAMINE together with its
/// collected `EXISTS`, `FLAGS` and `OK` responses.
#[must_use]
pub fn parse_select(response: &Response) -> MailboxInfo {
    let mut mailbox = MailboxInfo {
        read_only: response.code.as_ref().is_some_and(|c| c.is("READ-ONLY")),
        ..MailboxInfo::default()
    };

    if let Some(exists) = response.payload("EXISTS").last() {
        mailbox.exists = Some(exists.nr.unwrap_or(0));
    }

    if let Some(flags) = response
        .payload("FLAGS")
        .last()
        .and_then(|f| f.attributes.first())
        .and_then(Attribute::as_list)
    {
        mailbox.flags = flags.iter().map(|f| f.text().trim().to_string()).collect();
    }

    for code in response.payload("OK").iter().filter_map(|ok| ok.code.as_ref()) {
        match code.name.as_str() {
            "PERMANENTFLAGS" => mailbox.permanent_flags = code.values(),
            "UIDVALIDITY" => mailbox.uid_validity = Some(code.number().unwrap_or(0)),
            "UIDNEXT" => mailbox.uid_next = Some(code.number().unwrap_or(0)),
            "HIGHESTMODSEQ" => {
                mailbox.highest_modseq = Some(code.text().unwrap_or_else(|| "0".to_string()));
            }
            _ => {}
        }
    }

    mailbox
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use browserbox_imap::parser;

    use super::*;

    fn untagged(line: &[u8]) -> Response {
        let mut response = parser::parse(line).unwrap();
        response.normalize_numbered();
        response
    }

    #[test]
    fn test_select_response() {
        let mut response = parser::parse(b"W3 OK [READ-WRITE] SELECT completed").unwrap();
        response.payload.insert(
            "EXISTS".into(),
            vec![untagged(b"* 18 EXISTS"), untagged(b"* 19 EXISTS")],
        );
        response.payload.insert(
            "FLAGS".into(),
            vec![untagged(br"* FLAGS (\Answered \Flagged \Deleted \Seen \Draft)")],
        );
        response.payload.insert(
            "OK".into(),
            vec![
                untagged(br"* OK [PERMANENTFLAGS (\Deleted \Seen \*)] Limited"),
                untagged(b"* OK [UIDVALIDITY 3857529045] UIDs valid"),
                untagged(b"* OK [UIDNEXT 4392] Predicted next UID"),
                untagged(b"* OK [HIGHESTMODSEQ 715194045007] Highest"),
                untagged(b"* OK [UNSEEN 12] Message 12 is first unseen"),
            ],
        );

        let info = parse_select(&response);
        assert!(!info.read_only);
        assert_eq!(info.exists, Some(19));
        assert_eq!(info.flags.len(), 5);
        assert_eq!(info.flags[0], "\\Answered");
        assert_eq!(info.permanent_flags, ["\\Deleted", "\\Seen", "\\*"]);
        assert_eq!(info.uid_validity, Some(3_857_529_045));
        assert_eq!(info.uid_next, Some(4392));
        assert_eq!(info.highest_modseq.as_deref(), Some("715194045007"));
    }

    #[test]
    fn test_read_only() {
        let response = parser::parse(b"W3 OK [READ-ONLY] EXAMINE completed").unwrap();
        let info = parse_select(&response);
        assert!(info.read_only);
        assert_eq!(info.exists, None);
        assert!(info.flags.is_empty());
    }
}
