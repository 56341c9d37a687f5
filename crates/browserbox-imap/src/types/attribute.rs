//! Typed attribute tree shared by requests and responses.

use std::borrow::Cow;

/// A node of the IMAP attribute grammar.
///
/// Server responses are parsed into this tree and client requests are
/// compiled from it, so command builders and response parsers work over
/// the same checked structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// `NIL`.
    Nil,
    /// A bare atom, optionally carrying a body section and partial range.
    Atom(Atom),
    /// A quoted string.
    String(String),
    /// A byte-counted literal (`{n}\r\n...`).
    Literal(Vec<u8>),
    /// A sequence set such as `1:*` or `2,4,7`.
    Sequence(String),
    /// A number. Only produced by request builders.
    Number(u64),
    /// A parenthesized list.
    List(Vec<Attribute>),
    /// A value masked in logs (passwords, tokens). Request-only.
    Sensitive(Box<Attribute>),
}

/// An atom with optional `[section]` and `<partial>` suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Atom {
    /// The atom text.
    pub value: String,
    /// Body section, e.g. `HEADER.FIELDS (SUBJECT)` in `BODY[HEADER.FIELDS (SUBJECT)]`.
    pub section: Option<Vec<Attribute>>,
    /// Partial range, e.g. `<0.1024>`.
    pub partial: Option<Partial>,
}

/// A partial fetch range (`<start>` or `<start.length>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partial {
    /// First octet.
    pub start: u64,
    /// Number of octets, if given.
    pub length: Option<u64>,
}

impl Attribute {
    /// Creates a plain atom.
    #[must_use]
    pub fn atom(value: impl Into<String>) -> Self {
        Self::Atom(Atom {
            value: value.into(),
            section: None,
            partial: None,
        })
    }

    /// Creates a quoted string.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates a literal.
    #[must_use]
    pub fn literal(value: impl Into<Vec<u8>>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a sequence set.
    #[must_use]
    pub fn sequence(value: impl Into<String>) -> Self {
        Self::Sequence(value.into())
    }

    /// Creates a list.
    #[must_use]
    pub const fn list(items: Vec<Self>) -> Self {
        Self::List(items)
    }

    /// Wraps a value so it never shows up in logs.
    #[must_use]
    pub fn sensitive(inner: Self) -> Self {
        Self::Sensitive(Box::new(inner))
    }

    /// Creates an atom when the text is a valid atom, otherwise a quoted string.
    #[must_use]
    pub fn astring(value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() && value.bytes().all(is_atom_char) {
            Self::atom(value)
        } else {
            Self::String(value)
        }
    }

    /// Returns the scalar value as text.
    ///
    /// Literals are decoded lossily. Lists and `NIL` have no value.
    #[must_use]
    pub fn value(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Atom(atom) => Some(Cow::Borrowed(atom.value.as_str())),
            Self::String(s) | Self::Sequence(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Literal(bytes) => Some(String::from_utf8_lossy(bytes)),
            Self::Number(n) => Some(Cow::Owned(n.to_string())),
            Self::Sensitive(inner) => inner.value(),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Returns the scalar value as text, or an empty string.
    #[must_use]
    pub fn text(&self) -> String {
        self.value().map(Cow::into_owned).unwrap_or_default()
    }

    /// Returns the raw bytes of a string-like value.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Atom(atom) => Some(atom.value.as_bytes()),
            Self::String(s) | Self::Sequence(s) => Some(s.as_bytes()),
            Self::Literal(bytes) => Some(bytes),
            Self::Sensitive(inner) => inner.bytes(),
            Self::Nil | Self::Number(_) | Self::List(_) => None,
        }
    }

    /// Returns the list items if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the atom if this is an atom.
    #[must_use]
    pub const fn as_atom(&self) -> Option<&Atom> {
        match self {
            Self::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    /// Returns true for `NIL`.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Parses the value as an unsigned number.
    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            other => other.value().and_then(|v| v.trim().parse().ok()),
        }
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<u64> for Attribute {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for Attribute {
    fn from(value: u32) -> Self {
        Self::Number(u64::from(value))
    }
}

impl From<Vec<Self>> for Attribute {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

/// Returns true if the byte may appear in an atom (RFC 3501 `ATOM-CHAR`).
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b > 0x20
        && b < 0x7F
        && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\' | b']')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_astring_picks_atom_or_string() {
        assert_eq!(Attribute::astring("INBOX"), Attribute::atom("INBOX"));
        assert_eq!(
            Attribute::astring("Sent Items"),
            Attribute::String("Sent Items".into())
        );
        assert_eq!(Attribute::astring(""), Attribute::String(String::new()));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Attribute::atom("UID").value().unwrap(), "UID");
        assert_eq!(Attribute::literal(b"a\r\nb".to_vec()).text(), "a\r\nb");
        assert_eq!(Attribute::Nil.value(), None);
        assert_eq!(Attribute::atom("42").as_number(), Some(42));
        assert_eq!(Attribute::Number(7).text(), "7");
        assert_eq!(
            Attribute::sensitive(Attribute::string("secret")).text(),
            "secret"
        );
    }
}
