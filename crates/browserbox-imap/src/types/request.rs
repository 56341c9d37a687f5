//! Structured client commands.

use super::Attribute;

/// A command to send to the server.
///
/// The tag is not part of the request; the framer assigns one when the
/// command is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Command name, e.g. `UID FETCH`.
    pub command: String,
    /// Command arguments.
    pub attributes: Vec<Attribute>,
}

impl Request {
    /// Creates a request without arguments.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            attributes: Vec::new(),
        }
    }

    /// Creates a request with arguments.
    #[must_use]
    pub fn with_attributes(command: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            command: command.into(),
            attributes,
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<Attribute>) -> Self {
        self.attributes.push(attribute.into());
        self
    }
}

impl From<&str> for Request {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}
