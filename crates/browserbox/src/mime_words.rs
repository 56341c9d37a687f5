//! RFC 2047 encoded-word decoding for envelope and bodystructure strings.
//!
//! Format: `=?charset?encoding?encoded-text?=`, where encoding is `B`
//! (base64) or `Q` (quoted-printable with `_` for space). Whitespace between
//! two adjacent encoded words is dropped.

use base64::Engine;
use base64::engine::DecodePaddingMode;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use encoding_rs::Encoding;

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes all encoded words in `input`. Words that can't be decoded are
/// kept as they are.
#[must_use]
pub fn decode(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_word(candidate) {
            if !(after_word && before.chars().all(char::is_whitespace)) {
                output.push_str(before);
            }
            output.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            output.push_str(before);
            output.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }
    output.push_str(rest);
    output
}

/// Decodes the encoded word at the start of `word`. Returns the text and the
/// number of bytes consumed.
fn decode_word(word: &str) -> Option<(String, usize)> {
    let body = word.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let end = body.find("?=")?;
    let text = &body[..end];
    if charset.is_empty()
        || [charset, encoding, text]
            .iter()
            .any(|s| s.contains(char::is_whitespace))
    {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => BASE64.decode(text).ok()?,
        "Q" | "q" => decode_q(text)?,
        _ => return None,
    };

    // RFC 2231 language suffix: `utf-8*en`
    let label = charset.split('*').next().unwrap_or(charset);
    let encoding = Encoding::for_label(label.as_bytes())?;
    let decoded = encoding.decode_without_bom_handling(&bytes).0.into_owned();

    let consumed = word.len() - body.len() + end + 2;
    Some((decoded, consumed))
}

fn decode_q(text: &str) -> Option<Vec<u8>> {
    let mut result = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'_' => result.push(b' '),
            b'=' => {
                let hi = char::from(bytes.next()?).to_digit(16)?;
                let lo = char::from(bytes.next()?).to_digit(16)?;
                result.push(u8::try_from(hi * 16 + lo).ok()?);
            }
            other => result.push(other),
        }
    }
    Some(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(decode("hello world"), "hello world");
        assert_eq!(decode(""), "");
    }

    #[test]
    fn test_rfc2047_examples() {
        assert_eq!(decode("=?US-ASCII?Q?Keith_Moore?="), "Keith Moore");
        assert_eq!(
            decode("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?="),
            "Keld J\u{f8}rn Simonsen"
        );
        assert_eq!(decode("=?ISO-8859-1?Q?Andr=E9?= Pirard"), "Andr\u{e9} Pirard");
        assert_eq!(decode("=?utf-8?B?SMOpbGxv?="), "H\u{e9}llo");
    }

    #[test]
    fn test_adjacent_words_drop_whitespace() {
        assert_eq!(decode("=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?="), "ab");
        assert_eq!(decode("=?ISO-8859-1?Q?a?= x =?ISO-8859-1?Q?b?="), "a x b");
        assert_eq!(decode("(=?ISO-8859-1?Q?a?=  \r\n =?ISO-8859-1?Q?b?=)"), "(ab)");
    }

    #[test]
    fn test_unpadded_base64() {
        assert_eq!(decode("=?utf-8?b?SMOpbGxv?="), "H\u{e9}llo");
        assert_eq!(decode("=?utf-8?B?w6k?="), "\u{e9}");
    }

    #[test]
    fn test_invalid_words_are_kept() {
        assert_eq!(decode("=?bogus-charset?Q?x?="), "=?bogus-charset?Q?x?=");
        assert_eq!(decode("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode("a =? b"), "a =? b");
    }

    #[test]
    fn test_language_suffix() {
        assert_eq!(decode("=?utf-8*en?Q?hi?="), "hi");
    }

    proptest! {
        #[test]
        fn decode_never_panics(s in r"=\?.*\?.*\?.*\?=.*") {
            let _ = decode(&s);
        }
    }
}
