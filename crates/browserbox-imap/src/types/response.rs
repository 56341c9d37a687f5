//! Parsed server responses.

use std::collections::BTreeMap;

use super::{Attribute, ResponseCode};
use crate::error::{Error, Result};

/// Status of a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }

    /// Parses a status keyword, case-insensitively.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// A single parsed server response line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    /// `*` for untagged, `+` for continuations, otherwise the command tag.
    pub tag: String,
    /// Upper-cased command or status keyword (`OK`, `FETCH`, `EXISTS`, ...).
    pub command: String,
    /// Message number of numbered untagged responses (`* 23 EXISTS`).
    pub nr: Option<u32>,
    /// Response arguments.
    pub attributes: Vec<Attribute>,
    /// Bracketed response code of a status response.
    pub code: Option<ResponseCode>,
    /// Trailing text of a status or continuation response.
    pub human_readable: Option<String>,
    /// Untagged responses collected for the command this response completes,
    /// keyed by upper-cased command name.
    pub payload: BTreeMap<String, Vec<Response>>,
}

impl Response {
    /// Returns true for `*` responses.
    #[must_use]
    pub fn is_untagged(&self) -> bool {
        self.tag == "*"
    }

    /// Returns true for `+` responses.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.tag == "+"
    }

    /// Returns the status if this is a status response.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        Status::parse(&self.command)
    }

    /// Returns the collected untagged responses of the given kind.
    #[must_use]
    pub fn payload(&self, name: &str) -> &[Self] {
        self.payload
            .get(&name.to_ascii_uppercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the name of the response code, if any.
    #[must_use]
    pub fn code_name(&self) -> Option<&str> {
        self.code.as_ref().map(|c| c.name.as_str())
    }

    /// Turns a NO or BAD completion into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] or [`Error::Bad`] carrying the response code and text.
    pub fn into_result(self) -> Result<Self> {
        let text = || {
            self.human_readable
                .clone()
                .unwrap_or_else(|| "Error".to_string())
        };
        let code = self.code_name().map(str::to_string);
        match self.status() {
            Some(Status::No) => Err(Error::No { code, text: text() }),
            Some(Status::Bad) => Err(Error::Bad { code, text: text() }),
            _ => Ok(self),
        }
    }

    /// Moves the message number of `* 23 EXISTS` style responses into `nr`.
    ///
    /// The parser yields `23` as the command and `EXISTS` as the first
    /// attribute; afterwards `command` is `EXISTS` and `nr` is 23.
    pub fn normalize_numbered(&mut self) {
        if !self.is_untagged() || self.command.is_empty() {
            return;
        }
        if !self.command.bytes().all(|b| b.is_ascii_digit()) {
            return;
        }
        let Ok(nr) = self.command.parse() else {
            return;
        };
        let Some(first) = self.attributes.first() else {
            return;
        };
        let Some(name) = first.value().map(|v| v.to_ascii_uppercase()) else {
            return;
        };
        self.attributes.remove(0);
        self.nr = Some(nr);
        self.command = name;
    }
}
