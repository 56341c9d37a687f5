//! Literal-aware response assembly.
//!
//! Bytes arrive in arbitrary chunks. A response ends at a line break unless
//! the line ends with a literal announcement (`{n}` or `{n+}`), in which case
//! the next `n` bytes and the following line belong to the same response.

use crate::{Error, Result};

/// Largest literal accepted from the server.
pub const DEFAULT_MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Splits an incoming byte stream into complete responses.
#[derive(Debug)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    command: Vec<u8>,
    literal_remaining: usize,
    max_literal_size: usize,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LITERAL_SIZE)
    }
}

impl LineAssembler {
    /// Creates an assembler with the given literal size limit.
    #[must_use]
    pub const fn new(max_literal_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            command: Vec::new(),
            literal_remaining: 0,
            max_literal_size,
        }
    }

    /// Returns true if a partial response is buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty() || !self.command.is_empty() || self.literal_remaining > 0
    }

    /// Feeds bytes and returns every response completed by them.
    ///
    /// Returned responses keep embedded `{n}\r\n<bytes>` literals but not the
    /// final line break.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the server announces a literal larger
    /// than the configured limit.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.buffer.extend_from_slice(data);

        let mut complete = Vec::new();
        let mut pos = 0;

        while pos < self.buffer.len() {
            if self.literal_remaining > 0 {
                let take = self.literal_remaining.min(self.buffer.len() - pos);
                self.command
                    .extend_from_slice(&self.buffer[pos..pos + take]);
                self.literal_remaining -= take;
                pos += take;
                continue;
            }

            let Some(offset) = self.buffer[pos..].iter().position(|&b| b == b'\n') else {
                break;
            };
            let end = pos + offset;
            let line = &self.buffer[pos..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if let Some(size) = literal_size(line) {
                if size > self.max_literal_size {
                    return Err(Error::Protocol(format!(
                        "literal of {size} bytes exceeds limit of {}",
                        self.max_literal_size
                    )));
                }
                self.command.extend_from_slice(line);
                self.command.extend_from_slice(b"\r\n");
                self.literal_remaining = size;
            } else {
                self.command.extend_from_slice(line);
                complete.push(std::mem::take(&mut self.command));
            }
            pos = end + 1;
        }

        self.buffer.drain(..pos);
        Ok(complete)
    }

    /// Drops all buffered data.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.command.clear();
        self.literal_remaining = 0;
    }
}

/// Returns the announced size if the line ends with `{n}` or `{n+}`.
fn literal_size(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
