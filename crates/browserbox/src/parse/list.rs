//! LIST and LSUB responses folded into a mailbox tree.

use browserbox_imap::{Attribute, Response};

use crate::{special_use, utf7};

/// The mailbox hierarchy returned by [`crate::BrowserBox::list_mailboxes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxTree {
    /// Top-level mailboxes.
    pub children: Vec<Mailbox>,
}

/// A mailbox, or a hierarchy level implied by a deeper path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mailbox {
    /// Decoded name of this level.
    pub name: String,
    /// Hierarchy delimiter.
    pub delimiter: String,
    /// Full path as sent by the server (modified UTF-7).
    pub path: String,
    /// Mailbox flags from LIST and LSUB.
    pub flags: Vec<String>,
    /// Returned by LIST.
    pub listed: bool,
    /// Returned by LSUB.
    pub subscribed: bool,
    /// Detected special-use flag, e.g. `\Sent`.
    pub special_use: Option<String>,
    /// Child mailboxes.
    pub children: Vec<Mailbox>,
}

impl MailboxTree {
    /// Adds every `* LIST` of the response.
    pub fn add_listed(&mut self, response: &Response) {
        for item in response.payload("LIST") {
            let Some((flags, delimiter, path)) = list_item(item) else {
                continue;
            };
            let branch = self.ensure_path(&path, &delimiter);
            branch.flags = flags;
            branch.listed = true;
            branch.detect_special_use();
        }
    }

    /// Marks every mailbox of the `* LSUB` responses as subscribed.
    pub fn add_subscribed(&mut self, response: &Response) {
        for item in response.payload("LSUB") {
            let Some((flags, delimiter, path)) = list_item(item) else {
                continue;
            };
            let branch = self.ensure_path(&path, &delimiter);
            for flag in flags {
                if !branch.flags.contains(&flag) {
                    branch.flags.push(flag);
                }
            }
            branch.subscribed = true;
        }
    }

    /// Finds a mailbox by its raw path.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Mailbox> {
        self.iter().find(|mailbox| mailbox.path == path)
    }

    /// Iterates over all mailboxes depth-first.
    pub fn iter(&self) -> impl Iterator<Item = &Mailbox> {
        self.children.iter().flat_map(Mailbox::walk)
    }

    /// Returns the node for `path`, creating missing levels.
    fn ensure_path(&mut self, path: &str, delimiter: &str) -> &mut Mailbox {
        let names: Vec<&str> = if delimiter.is_empty() {
            vec![path]
        } else {
            path.split(delimiter).collect()
        };

        let mut branch = &mut self.children;
        let mut depth = 0;
        loop {
            let name = utf7::decode(names[depth]);
            let pos = match branch.iter().position(|c| same_name(&c.name, &name)) {
                Some(pos) => pos,
                None => {
                    branch.push(Mailbox {
                        name,
                        delimiter: delimiter.to_string(),
                        path: names[..=depth].join(delimiter),
                        ..Mailbox::default()
                    });
                    branch.len() - 1
                }
            };
            depth += 1;
            if depth == names.len() {
                return &mut branch[pos];
            }
            branch = &mut branch[pos].children;
        }
    }
}

impl Mailbox {
    fn walk(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        Box::new(std::iter::once(self).chain(self.children.iter().flat_map(Self::walk)))
    }

    /// Server flags win; otherwise the name is looked up in the table of
    /// localized folder names and the matching flag is added.
    fn detect_special_use(&mut self) {
        if let Some(flag) = special_use::from_flags(&self.flags) {
            self.special_use = Some(flag.to_string());
        } else if let Some(flag) = special_use::from_name(&self.name) {
            self.flags.push(flag.to_string());
            self.special_use = Some(flag.to_string());
        }
    }
}

/// `INBOX` matches case-insensitively, everything else exactly.
fn same_name(a: &str, b: &str) -> bool {
    let normalize = |name: &str| {
        if name.eq_ignore_ascii_case("INBOX") {
            "INBOX".to_string()
        } else {
            name.to_string()
        }
    };
    normalize(a) == normalize(b)
}

/// Splits `* LIST (flags) "delimiter" path` into its parts.
fn list_item(item: &Response) -> Option<(Vec<String>, String, String)> {
    if item.attributes.len() < 3 {
        return None;
    }
    let flags = match &item.attributes[0] {
        Attribute::List(items) => items.iter().map(Attribute::text).collect(),
        Attribute::Nil => Vec::new(),
        other => vec![other.text()],
    };
    let delimiter = item.attributes[1]
        .value()
        .map_or_else(|| "/".to_string(), std::borrow::Cow::into_owned);
    let path = item.attributes[2].text();
    Some((flags, delimiter, path))
}
