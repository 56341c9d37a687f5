//! Request serialization.
//!
//! A request compiles into one or more chunks. Every chunk except the last
//! ends with a literal announcement (`{n}\r\n`); the next chunk may only be
//! sent once the server answered with a `+` continuation. The trailing CRLF
//! of the last chunk is added by the framer.

use crate::types::{Atom, Attribute, Request};
use crate::{Error, Result};

const HIDDEN: &str = "\"(* value hidden *)\"";

/// Compiles a tagged request into wire chunks.
///
/// # Errors
///
/// Returns [`Error::Compile`] if a value can't be represented, e.g. a quoted
/// string containing CR or LF, or an atom with special characters.
pub fn compile(tag: &str, request: &Request) -> Result<Vec<Vec<u8>>> {
    let mut writer = Writer::new(Mode::Wire);
    writer.header(tag, request);
    for attribute in &request.attributes {
        writer.push(b" ");
        writer.attribute(attribute)?;
    }
    Ok(writer.finish())
}

/// Renders a request for logging. Sensitive values are masked and literal
/// bodies are replaced by their size.
#[must_use]
pub fn compile_for_log(tag: &str, request: &Request) -> String {
    let mut writer = Writer::new(Mode::Log);
    writer.header(tag, request);
    for attribute in &request.attributes {
        writer.push(b" ");
        // Log rendering never fails: invalid values are shown verbatim.
        let _ = writer.attribute(attribute);
    }
    writer.into_log()
}

/// Renders a single attribute the way it would appear in a log line.
#[must_use]
pub fn render(attribute: &Attribute) -> String {
    let mut writer = Writer::new(Mode::Log);
    let _ = writer.attribute(attribute);
    writer.into_log()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Wire,
    Log,
}

struct Writer {
    mode: Mode,
    chunks: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl Writer {
    const fn new(mode: Mode) -> Self {
        Self {
            mode,
            chunks: Vec::new(),
            current: Vec::new(),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.current.extend_from_slice(bytes);
    }

    fn header(&mut self, tag: &str, request: &Request) {
        self.push(tag.as_bytes());
        self.push(b" ");
        self.push(request.command.as_bytes());
    }

    fn attribute(&mut self, attribute: &Attribute) -> Result<()> {
        match attribute {
            Attribute::Nil => self.push(b"NIL"),
            Attribute::Atom(atom) => self.atom(atom)?,
            Attribute::String(s) => self.quoted(s)?,
            Attribute::Literal(data) => self.literal(data),
            Attribute::Sequence(seq) => {
                if self.mode == Mode::Wire && !is_valid_sequence(seq) {
                    return Err(Error::Compile(format!("invalid sequence set: {seq:?}")));
                }
                self.push(seq.as_bytes());
            }
            Attribute::Number(n) => self.push(n.to_string().as_bytes()),
            Attribute::List(items) => self.list(items, b'(', b')')?,
            Attribute::Sensitive(inner) => {
                if self.mode == Mode::Log {
                    self.push(HIDDEN.as_bytes());
                } else {
                    self.attribute(inner)?;
                }
            }
        }
        Ok(())
    }

    fn atom(&mut self, atom: &Atom) -> Result<()> {
        if self.mode == Mode::Wire && !is_valid_atom(&atom.value) {
            return Err(Error::Compile(format!("invalid atom: {:?}", atom.value)));
        }
        self.push(atom.value.as_bytes());
        if let Some(section) = &atom.section {
            self.list(section, b'[', b']')?;
        }
        if let Some(partial) = atom.partial {
            let text = match partial.length {
                Some(length) => format!("<{}.{length}>", partial.start),
                None => format!("<{}>", partial.start),
            };
            self.push(text.as_bytes());
        }
        Ok(())
    }

    fn list(&mut self, items: &[Attribute], open: u8, close: u8) -> Result<()> {
        self.push(&[open]);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(b" ");
            }
            self.attribute(item)?;
        }
        self.push(&[close]);
        Ok(())
    }

    fn quoted(&mut self, s: &str) -> Result<()> {
        if self.mode == Mode::Wire && s.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
            return Err(Error::Compile(
                "quoted string can't contain CR, LF or NUL".to_string(),
            ));
        }
        self.current.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                self.current.push(b'\\');
            }
            self.current.push(b);
        }
        self.current.push(b'"');
        Ok(())
    }

    fn literal(&mut self, data: &[u8]) {
        if data.is_empty() {
            self.push(b"\"\"");
            return;
        }
        self.push(format!("{{{}}}", data.len()).as_bytes());
        match self.mode {
            Mode::Log => {}
            Mode::Wire => {
                self.push(b"\r\n");
                self.chunks.push(std::mem::take(&mut self.current));
                self.push(data);
            }
        }
    }

    fn finish(mut self) -> Vec<Vec<u8>> {
        self.chunks.push(self.current);
        self.chunks
    }

    fn into_log(self) -> String {
        String::from_utf8_lossy(&self.current).into_owned()
    }
}

fn is_valid_atom(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b > 0x20 && b < 0x7F && !matches!(b, b'(' | b')' | b'{' | b'"'))
}

fn is_valid_sequence(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'*' | b':' | b','))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Partial;

    #[test]
    fn test_simple_command() {
        let chunks = compile("W1", &Request::new("CAPABILITY")).unwrap();
        assert_eq!(chunks, vec![b"W1 CAPABILITY".to_vec()]);
    }

    #[test]
    fn test_strings_are_quoted_and_escaped() {
        let request = Request::new("LOGIN")
            .attribute(Attribute::string("user"))
            .attribute(Attribute::sensitive(Attribute::string("pa\"ss")));
        let chunks = compile("W2", &request).unwrap();
        assert_eq!(chunks, vec![br#"W2 LOGIN "user" "pa\"ss""#.to_vec()]);
        assert_eq!(
            compile_for_log("W2", &request),
            r#"W2 LOGIN "user" "(* value hidden *)""#
        );
    }

    #[test]
    fn test_literal_splits_chunks() {
        let request = Request::new("APPEND")
            .attribute(Attribute::string("INBOX"))
            .attribute(Attribute::list(vec![Attribute::atom("\\Seen")]))
            .attribute(Attribute::literal(b"Subject: hi".to_vec()));
        let chunks = compile("W3", &request).unwrap();
        assert_eq!(
            chunks,
            vec![
                b"W3 APPEND \"INBOX\" (\\Seen) {11}\r\n".to_vec(),
                b"Subject: hi".to_vec(),
            ]
        );
        assert_eq!(
            compile_for_log("W3", &request),
            "W3 APPEND \"INBOX\" (\\Seen) {11}"
        );
    }

    #[test]
    fn test_empty_literal_is_empty_string() {
        let request = Request::new("SEARCH").attribute(Attribute::literal(Vec::new()));
        assert_eq!(
            compile("W1", &request).unwrap(),
            vec![b"W1 SEARCH \"\"".to_vec()]
        );
    }

    #[test]
    fn test_atom_section_partial() {
        let atom = Attribute::Atom(Atom {
            value: "BODY.PEEK".into(),
            section: Some(vec![
                Attribute::atom("HEADER.FIELDS"),
                Attribute::list(vec![Attribute::atom("SUBJECT")]),
            ]),
            partial: Some(Partial {
                start: 0,
                length: Some(100),
            }),
        });
        assert_eq!(
            render(&atom),
            "BODY.PEEK[HEADER.FIELDS (SUBJECT)]<0.100>"
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        let request = Request::new("SELECT").attribute(Attribute::string("a\r\nb"));
        assert!(matches!(compile("W1", &request), Err(Error::Compile(_))));

        let request = Request::new("FETCH").attribute(Attribute::sequence("1 OR 2"));
        assert!(matches!(compile("W1", &request), Err(Error::Compile(_))));

        let request = Request::new("FETCH").attribute(Attribute::atom("has space"));
        assert!(matches!(compile("W1", &request), Err(Error::Compile(_))));
    }

    #[test]
    fn test_numbers_and_nil() {
        let request = Request::new("ID")
            .attribute(Attribute::Nil)
            .attribute(Attribute::Number(42));
        assert_eq!(
            compile("W9", &request).unwrap(),
            vec![b"W9 ID NIL 42".to_vec()]
        );
    }
}
