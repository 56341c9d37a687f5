//! Outgoing protocol data.

use super::CommandId;

/// Data to transmit to the server.
///
/// The framer produces these and the I/O layer writes them in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    /// Raw bytes to send to the server.
    pub data: Vec<u8>,
    /// Command this chunk belongs to, `None` for raw writes such as `DONE`.
    pub command: Option<CommandId>,
}

impl Transmit {
    /// Creates a chunk of a queued command.
    #[must_use]
    pub const fn command(id: CommandId, data: Vec<u8>) -> Self {
        Self {
            data,
            command: Some(id),
        }
    }

    /// Creates a raw write.
    #[must_use]
    pub const fn raw(data: Vec<u8>) -> Self {
        Self {
            data,
            command: None,
        }
    }

    /// Returns the data as a string slice, if valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Returns the length of the data.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the transmit is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Transmit {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
