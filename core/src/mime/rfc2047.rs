/*
 * rfc2047.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Carteggio, a cross-platform email client.
 *
 * Carteggio is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Carteggio is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Carteggio.  If not, see <http://www.gnu.org/licenses/>.
 */

//! RFC 2047 encoded-words (e.g. =?charset?q?text?=) in both directions, plus charset lookup
//! shared with body text decoding.

use encoding_rs::Encoding;
use tracing::debug;

use crate::mime::base64;
use crate::mime::quoted_printable;

/// Longest encoded-word RFC 2047 allows.
pub const MAX_ENCODED_WORD_LENGTH: usize = 75;

const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Expand RFC 2047 encoded-words in the string.
///
/// Linear whitespace between two adjacent encoded-words is dropped. An encoded-word whose
/// charset is unknown is left in the output exactly as written.
pub fn decode_encoded_words(s: &str) -> String {
    let mut out = String::new();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut after_encoded_word = false;

    while pos < len {
        let Some(start) = find_encoded_word_start(bytes, pos) else {
            out.push_str(&s[pos..]);
            break;
        };
        let literal = &s[pos..start];
        let mut end = start;
        match decode_one_encoded_word(bytes, len, &mut end) {
            Some(decoded) => {
                let between_words = after_encoded_word && literal.chars().all(|c| c == ' ' || c == '\t');
                if !between_words {
                    out.push_str(literal);
                }
                out.push_str(&decoded);
                after_encoded_word = true;
                pos = end;
            }
            None => {
                out.push_str(literal);
                out.push_str("=?");
                after_encoded_word = false;
                pos = start + 2;
            }
        }
    }
    out
}

fn find_encoded_word_start(bytes: &[u8], from: usize) -> Option<usize> {
    let rest = bytes.get(from..)?;
    let needle = b"=?";
    rest.windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}

/// Decode one encoded-word starting at `pos`; on success `pos` is left after the closing `?=`.
fn decode_one_encoded_word(bytes: &[u8], len: usize, pos: &mut usize) -> Option<String> {
    let start = *pos;
    if start + 4 > len || &bytes[start..start + 2] != b"=?" {
        return None;
    }
    let charset_start = start + 2;
    let qmark1 = bytes[charset_start..].iter().position(|&b| b == b'?')? + charset_start;
    if qmark1 < charset_start + 1 || qmark1 + 2 >= len {
        return None;
    }
    let charset = std::str::from_utf8(&bytes[charset_start..qmark1]).ok()?.trim();
    let encoding = bytes[qmark1 + 1].to_ascii_lowercase();
    if bytes[qmark1 + 2] != b'?' {
        return None;
    }
    let payload_start = qmark1 + 3;
    let end_in_rest = bytes[payload_start..].windows(2).position(|w| w == b"?=")?;
    let payload_end = payload_start + end_in_rest;

    let payload = &bytes[payload_start..payload_end];
    let decoded_bytes = match encoding {
        b'b' => decode_b(payload),
        b'q' => decode_q(payload),
        _ => return None,
    };
    let Some(encoding) = lookup_charset(charset) else {
        debug!(charset, "unknown charset in encoded-word; keeping it verbatim");
        return None;
    };
    *pos = payload_end + 2;
    Some(encoding.decode_without_bom_handling(&decoded_bytes).0.into_owned())
}

fn decode_b(payload: &[u8]) -> Vec<u8> {
    let mut src_pos = 0;
    let mut dst = vec![0u8; payload.len() * 3 / 4 + 4];
    let mut dst_pos = 0;
    base64::decode(payload, &mut src_pos, &mut dst, &mut dst_pos, payload.len(), true);
    dst.truncate(dst_pos);
    dst
}

/// Q encoding: _ = space, rest is quoted-printable.
fn decode_q(payload: &[u8]) -> Vec<u8> {
    let mut preprocessed = Vec::with_capacity(payload.len() * 2);
    for &b in payload {
        if b == b'_' {
            preprocessed.extend_from_slice(b"=20");
        } else {
            preprocessed.push(b);
        }
    }
    let mut src_pos = 0;
    let mut dst = vec![0u8; preprocessed.len()];
    let mut dst_pos = 0;
    quoted_printable::decode(
        &preprocessed,
        &mut src_pos,
        &mut dst,
        &mut dst_pos,
        preprocessed.len(),
        true,
    );
    dst.truncate(dst_pos);
    dst
}

/// Resolve a MIME charset label. An RFC 2231 language suffix (`utf-8*en`) is ignored.
pub fn lookup_charset(label: &str) -> Option<&'static Encoding> {
    let label = label.split('*').next().unwrap_or(label).trim();
    Encoding::for_label_no_replacement(label.as_bytes())
}

/// Decode bytes in the named charset, falling back to lossy UTF-8 for unknown labels.
pub fn charset_bytes_to_string(bytes: &[u8], charset: &str) -> String {
    match lookup_charset(charset) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => {
            debug!(charset, "unknown charset; decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Header bytes as received: UTF-8 when valid, ISO-8859-1 otherwise.
pub fn header_bytes_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if !s.contains(REPLACEMENT_CHAR) => s.to_string(),
        _ => bytes.iter().map(|&b| b as char).collect::<String>(),
    }
}

fn is_q_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'!' | b'*' | b'+' | b'-' | b'/')
}

/// Encode `text` as one or more UTF-8 encoded-words separated by single spaces.
///
/// `used_chars` is the width already taken on the first line (typically `Name: `). Q is
/// chosen unless more than 30% of the bytes would need escaping. A word that would exceed
/// the 75-column limit is bisected at a character boundary and each half encoded on its own;
/// a single character is never split.
pub fn encode_encoded_word(text: &str, used_chars: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let bytes = text.as_bytes();
    let escaped = bytes.iter().filter(|&&b| b != b' ' && !is_q_safe(b)).count();
    let word = if escaped * 100 > bytes.len() * 30 {
        format!("=?utf-8?B?{}?=", encode_b(bytes))
    } else {
        format!("=?utf-8?Q?{}?=", encode_q(bytes))
    };
    let limit = MAX_ENCODED_WORD_LENGTH.saturating_sub(used_chars);
    let char_count = text.chars().count();
    if word.len() <= limit || char_count < 2 {
        return word;
    }
    let split = text
        .char_indices()
        .nth(char_count / 2)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let (first, second) = text.split_at(split);
    format!("{} {}", encode_encoded_word(first, used_chars), encode_encoded_word(second, 0))
}

fn encode_b(bytes: &[u8]) -> String {
    use ::base64::Engine as _;
    ::base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn encode_q(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        if b == b' ' {
            out.push('_');
        } else if is_q_safe(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("={:02X}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_encoded_words_b() {
        // =?UTF-8?B?SGVsbG8=?= -> Hello
        let s = "=?UTF-8?B?SGVsbG8=?=";
        assert_eq!(decode_encoded_words(s), "Hello");
    }

    #[test]
    fn decode_encoded_words_q() {
        let s = "=?UTF-8?Q?Hello_World?=";
        assert_eq!(decode_encoded_words(s), "Hello World");
    }

    #[test]
    fn decode_encoded_words_mixed() {
        let s = "Hello =?UTF-8?B?V29ybGQ=?=!";
        assert_eq!(decode_encoded_words(s), "Hello World!");
    }

    #[test]
    fn whitespace_between_adjacent_words_is_dropped() {
        let s = "=?utf-8?Q?caf?=  \t=?iso-8859-1?Q?=E9?= and =?utf-8?Q?more?=";
        assert_eq!(decode_encoded_words(s), "café and more");
    }

    #[test]
    fn unknown_charset_is_left_verbatim() {
        let s = "pre =?x-klingon?Q?abc?= post";
        assert_eq!(decode_encoded_words(s), s);
    }

    #[test]
    fn mostly_ascii_uses_q() {
        assert_eq!(
            encode_encoded_word("Grüße aus Köln, Deutschland", 0),
            "=?utf-8?Q?Gr=C3=BC=C3=9Fe_aus_K=C3=B6ln=2C_Deutschland?="
        );
        assert!(encode_encoded_word("日本語", 0).starts_with("=?utf-8?B?"));
    }

    #[test]
    fn long_text_is_bisected() {
        let text = "ünïcödé ".repeat(20);
        let encoded = encode_encoded_word(&text, 9);
        let words: Vec<&str> = encoded.split(' ').collect();
        assert!(words.len() > 1);
        assert!(words[0].len() <= MAX_ENCODED_WORD_LENGTH - 9);
        assert_eq!(decode_encoded_words(&encoded), text);
    }

    #[test]
    fn header_bytes_fall_back_to_latin1() {
        assert_eq!(header_bytes_to_string("café".as_bytes()), "café");
        assert_eq!(header_bytes_to_string(b"caf\xe9"), "café");
    }

    proptest! {
        #[test]
        fn encoded_word_round_trip(s in "\\PC*") {
            let encoded = encode_encoded_word(&s, 0);
            for word in encoded.split(' ').filter(|w| !w.is_empty()) {
                prop_assert!(word.len() <= MAX_ENCODED_WORD_LENGTH, "{}", word);
            }
            prop_assert_eq!(decode_encoded_words(&encoded), s);
        }
    }
}
