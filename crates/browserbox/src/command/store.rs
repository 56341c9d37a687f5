//! STORE and UID STORE.

use browserbox_imap::{Attribute, Request};

/// How STORE changes the flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagUpdate {
    /// `+FLAGS`.
    Add(Vec<String>),
    /// `FLAGS`.
    Set(Vec<String>),
    /// `-FLAGS`.
    Remove(Vec<String>),
}

impl FlagUpdate {
    /// Adds the given flags.
    pub fn add<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Add(flags.into_iter().map(Into::into).collect())
    }

    /// Replaces the flags.
    pub fn set<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(flags.into_iter().map(Into::into).collect())
    }

    /// Removes the given flags.
    pub fn remove<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Remove(flags.into_iter().map(Into::into).collect())
    }

    fn parts(&self) -> (&'static str, &[String]) {
        match self {
            Self::Add(flags) => ("+", flags),
            Self::Set(flags) => ("", flags),
            Self::Remove(flags) => ("-", flags),
        }
    }
}

/// Builds a STORE command.
pub fn build_store(sequence: &str, update: &FlagUpdate, by_uid: bool, silent: bool) -> Request {
    let (prefix, flags) = update.parts();
    let item = format!("{prefix}FLAGS{}", if silent { ".SILENT" } else { "" });
    Request::new(if by_uid { "UID STORE" } else { "STORE" })
        .attribute(Attribute::sequence(sequence))
        .attribute(Attribute::atom(item))
        .attribute(Attribute::list(
            flags.iter().map(|f| Attribute::atom(f.as_str())).collect(),
        ))
}
