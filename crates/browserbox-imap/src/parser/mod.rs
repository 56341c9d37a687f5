//! IMAP response parser.
//!
//! Turns one assembled server response into a [`Response`]. The parser is
//! purely syntactic: it knows about tags, status responses with bracketed
//! codes, and the attribute grammar (lists, strings, literals, atoms with
//! sections and partials, sequences and `NIL`). Interpreting FETCH or LIST
//! data is left to the caller.
//!
//! # Example
//!
//! ```
//! use browserbox_imap::parser;
//!
//! let response = parser::parse(b"* OK [UIDNEXT 4392] Predicted next UID").unwrap();
//! assert_eq!(response.command, "OK");
//! assert_eq!(response.code.unwrap().number(), Some(4392));
//! assert_eq!(response.human_readable.as_deref(), Some("Predicted next UID"));
//! ```

pub mod lexer;

pub use lexer::{Lexer, Token};

use crate::Result;
use crate::types::{Atom, Attribute, Partial, Response, ResponseCode, Status};

/// Parses one response (without its trailing CRLF).
///
/// # Errors
///
/// Returns [`crate::Error::Parse`] with the byte position of the problem.
pub fn parse(input: &[u8]) -> Result<Response> {
    let mut lexer = Lexer::new(input);

    let tag = read_word(&mut lexer);
    if tag.is_empty() {
        return Err(lexer.error("Missing tag"));
    }

    if tag == "+" {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        return Ok(Response {
            tag,
            human_readable: text(lexer.take_rest()),
            ..Response::default()
        });
    }

    if lexer.advance() != Some(b' ') {
        return Err(lexer.error("Expected space after tag"));
    }

    let command = match lexer.next_token()? {
        Token::Atom(atom) => atom.to_ascii_uppercase(),
        token => return Err(lexer.error(&format!("Expected command, got {token:?}"))),
    };

    let mut response = Response {
        tag,
        command,
        ..Response::default()
    };

    if Status::parse(&response.command).is_some() {
        parse_status_tail(&mut lexer, &mut response);
    } else {
        response.attributes = parse_sequence_of(&mut lexer)?;
    }

    Ok(response)
}

/// Parses a space separated run of attributes, such as
/// `BODY.PEEK[HEADER.FIELDS (SUBJECT)] UID`.
///
/// # Errors
///
/// Returns [`crate::Error::Parse`] if the text is not valid attribute syntax.
pub fn parse_attributes(input: &[u8]) -> Result<Vec<Attribute>> {
    let mut lexer = Lexer::new(input);
    parse_sequence_of(&mut lexer)
}

fn parse_sequence_of(lexer: &mut Lexer<'_>) -> Result<Vec<Attribute>> {
    let mut attributes = Vec::new();
    loop {
        lexer.skip_spaces();
        if lexer.is_eof() {
            break;
        }
        attributes.push(parse_attribute(lexer)?);
    }
    Ok(attributes)
}

/// Reads the code and human readable text of OK/NO/BAD/BYE/PREAUTH.
///
/// A malformed code section is kept as part of the text.
fn parse_status_tail(lexer: &mut Lexer<'_>, response: &mut Response) {
    lexer.skip_spaces();

    if lexer.peek() == Some(b'[') {
        let checkpoint = lexer.position();
        match parse_code(lexer) {
            Ok(code) => response.code = Some(code),
            Err(err) => {
                tracing::trace!(error = %err, "Unparseable response code, keeping as text");
                lexer.rewind(checkpoint);
            }
        }
        lexer.skip_spaces();
    }

    response.human_readable = text(lexer.take_rest());
}

fn parse_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    if lexer.next_token()? != Token::LBracket {
        return Err(lexer.error("Expected ["));
    }

    let name = match lexer.next_token()? {
        Token::Atom(atom) => atom.to_ascii_uppercase(),
        token => return Err(lexer.error(&format!("Expected response code, got {token:?}"))),
    };

    let mut args = Vec::new();

    if name == "REFERRAL" {
        lexer.skip_spaces();
        let start = lexer.position();
        while let Some(b) = lexer.peek() {
            if b == b']' {
                break;
            }
            lexer.advance();
        }
        let url = String::from_utf8_lossy(&lexer.source()[start..lexer.position()]).into_owned();
        if lexer.advance() != Some(b']') {
            return Err(lexer.error("Unterminated response code"));
        }
        args.push(Attribute::atom(url));
        return Ok(ResponseCode { name, args });
    }

    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            Some(b']') => {
                lexer.advance();
                break;
            }
            None => return Err(lexer.error("Unterminated response code")),
            Some(_) => {
                let arg = parse_attribute(lexer)?;
                args.push(upper_scalar(arg));
            }
        }
    }

    Ok(ResponseCode { name, args })
}

fn upper_scalar(attribute: Attribute) -> Attribute {
    match attribute {
        Attribute::Atom(mut atom) => {
            atom.value.make_ascii_uppercase();
            Attribute::Atom(atom)
        }
        Attribute::String(s) => Attribute::String(s.to_ascii_uppercase()),
        Attribute::Sequence(s) => Attribute::Sequence(s.to_ascii_uppercase()),
        other => other,
    }
}

fn parse_attribute(lexer: &mut Lexer<'_>) -> Result<Attribute> {
    let start = lexer.position();
    match lexer.next_token()? {
        Token::LParen => parse_list(lexer, b')').map(Attribute::List),
        Token::QuotedString(s) => Ok(Attribute::String(s)),
        Token::Literal(data) => Ok(Attribute::Literal(data)),
        Token::Nil => Ok(Attribute::Nil),
        Token::Atom(value) => parse_atom_suffixes(lexer, value),
        Token::LBracket => {
            // Unquoted mailbox names such as `[Gmail]/Sent`.
            while let Some(b) = lexer.peek() {
                if matches!(b, b' ' | b'(' | b')') {
                    break;
                }
                lexer.advance();
            }
            let raw = &lexer.source()[start..lexer.position()];
            Ok(Attribute::atom(String::from_utf8_lossy(raw).into_owned()))
        }
        token => Err(lexer.error(&format!("Unexpected {token:?}"))),
    }
}

fn parse_list(lexer: &mut Lexer<'_>, close: u8) -> Result<Vec<Attribute>> {
    let mut items = Vec::new();
    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            Some(b) if b == close => {
                lexer.advance();
                return Ok(items);
            }
            None => return Err(lexer.error("Unterminated list")),
            Some(_) => items.push(parse_attribute(lexer)?),
        }
    }
}

fn parse_atom_suffixes(lexer: &mut Lexer<'_>, value: &str) -> Result<Attribute> {
    if lexer.peek() != Some(b'[') {
        if is_sequence(value) {
            return Ok(Attribute::sequence(value));
        }
        return Ok(Attribute::atom(value));
    }

    lexer.advance();
    let section = parse_list(lexer, b']')?;

    let partial = if lexer.peek() == Some(b'<') {
        lexer.advance();
        Some(parse_partial(lexer)?)
    } else {
        None
    };

    Ok(Attribute::Atom(Atom {
        value: value.to_string(),
        section: Some(section),
        partial,
    }))
}

fn parse_partial(lexer: &mut Lexer<'_>) -> Result<Partial> {
    let start = read_number(lexer)?;
    let length = if lexer.peek() == Some(b'.') {
        lexer.advance();
        Some(read_number(lexer)?)
    } else {
        None
    };
    if lexer.advance() != Some(b'>') {
        return Err(lexer.error("Expected > after partial"));
    }
    Ok(Partial { start, length })
}

fn read_number(lexer: &mut Lexer<'_>) -> Result<u64> {
    let mut n: u64 = 0;
    let mut digits = 0;
    while let Some(b @ b'0'..=b'9') = lexer.peek() {
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add(u64::from(b - b'0')))
            .ok_or_else(|| lexer.error("Number too large"))?;
        digits += 1;
        lexer.advance();
    }
    if digits == 0 {
        return Err(lexer.error("Expected number"));
    }
    Ok(n)
}

/// Returns true for sequence sets like `1:*` or `2,4,7`.
fn is_sequence(value: &str) -> bool {
    value.contains([':', ','])
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'*' | b':' | b','))
}

fn read_word(lexer: &mut Lexer<'_>) -> String {
    let start = lexer.position();
    while let Some(b) = lexer.peek() {
        if b == b' ' {
            break;
        }
        lexer.advance();
    }
    String::from_utf8_lossy(&lexer.source()[start..lexer.position()]).into_owned()
}

fn text(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_end();
    (!text.is_empty()).then(|| text.to_string())
}
