//! Modified UTF-7 mailbox names (RFC 3501 section 5.1.3).

use base64::Engine;
use base64::alphabet::IMAP_MUTF7;
use base64::engine::{GeneralPurpose, general_purpose::NO_PAD};

const ENGINE: GeneralPurpose = GeneralPurpose::new(&IMAP_MUTF7, NO_PAD);

const fn is_direct(c: char) -> bool {
    matches!(c, '\x20'..='\x25' | '\x27'..='\x7e')
}

/// Encodes a mailbox name.
#[must_use]
pub fn encode(name: &str) -> String {
    let mut output = String::with_capacity(name.len());
    let mut pending = String::new();

    for c in name.chars() {
        if is_direct(c) {
            flush(&mut pending, &mut output);
            output.push(c);
        } else if c == '&' {
            flush(&mut pending, &mut output);
            output.push_str("&-");
        } else {
            pending.push(c);
        }
    }
    flush(&mut pending, &mut output);
    output
}

fn flush(pending: &mut String, output: &mut String) {
    if pending.is_empty() {
        return;
    }
    let bytes: Vec<u8> = pending.encode_utf16().flat_map(u16::to_be_bytes).collect();
    output.push('&');
    output.push_str(&ENGINE.encode(bytes));
    output.push('-');
    pending.clear();
}

/// Decodes a mailbox name, or returns `None` if it is not valid modified UTF-7.
#[must_use]
pub fn try_decode(input: &str) -> Option<String> {
    let input = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut buffer = Vec::new();
    let mut i = 0;

    while i < input.len() {
        match input[i] {
            b'&' => {
                let start = i + 1;
                let end = start + input[start..].iter().position(|&b| b == b'-')?;
                if start == end {
                    output.push('&');
                } else {
                    buffer.clear();
                    ENGINE.decode_vec(&input[start..end], &mut buffer).ok()?;
                    let mut decoder = encoding_rs::UTF_16BE.new_decoder_without_bom_handling();
                    output.reserve(decoder.max_utf8_buffer_length_without_replacement(buffer.len())?);
                    let (result, _) =
                        decoder.decode_to_string_without_replacement(&buffer, &mut output, true);
                    if result != encoding_rs::DecoderResult::InputEmpty {
                        return None;
                    }
                }
                i = end;
            }
            c @ (0x20..=0x25 | 0x27..=0x7e) => output.push(char::from(c)),
            _ => return None,
        }
        i += 1;
    }
    Some(output)
}

/// Decodes a mailbox name. Invalid input is returned unchanged.
#[must_use]
pub fn decode(input: &str) -> String {
    try_decode(input).unwrap_or_else(|| input.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        assert_eq!(encode("INBOX/Sent Items"), "INBOX/Sent Items");
        assert_eq!(decode("INBOX/Sent Items"), "INBOX/Sent Items");
    }

    #[test]
    fn test_ampersand() {
        assert_eq!(encode("Tom & Jerry"), "Tom &- Jerry");
        assert_eq!(decode("Tom &- Jerry"), "Tom & Jerry");
    }

    #[test]
    fn test_rfc3501_example() {
        let name = "~peter/mail/\u{53f0}\u{5317}/\u{65e5}\u{672c}\u{8a9e}";
        assert_eq!(encode(name), "~peter/mail/&U,BTFw-/&ZeVnLIqe-");
        assert_eq!(decode("~peter/mail/&U,BTFw-/&ZeVnLIqe-"), name);
    }

    #[test]
    fn test_non_bmp() {
        assert_eq!(decode(&encode("mail \u{1f600}")), "mail \u{1f600}");
    }

    #[test]
    fn test_invalid_input_is_kept() {
        assert_eq!(try_decode("&Jjo"), None);
        assert_eq!(decode("&Jjo"), "&Jjo");
        assert_eq!(try_decode("caf\u{e9}"), None);
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(name in "\\PC*") {
            prop_assert_eq!(decode(&encode(&name)), name);
        }
    }
}
