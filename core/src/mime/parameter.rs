/*
 * parameter.rs
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

//! Header parameters (RFC 2045 `name=value`) and RFC 2231 extended values.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use crate::mime::content_type::parse_parameter_list;
use crate::mime::header::unfold;
use crate::mime::rfc2047::{charset_bytes_to_string, decode_encoded_words};
use crate::mime::utils::is_token;

/// Bytes left as they are in an RFC 2231 extended value (`attribute-char`).
const ATTRIBUTE_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Longest extended value written in one section before continuing in `name*N*`.
const SECTION_LENGTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }
}

struct Section {
    name: String,
    index: u32,
    extended: bool,
    value: String,
}

/// Merge RFC 2231 sections (`name*0`, `name*1*`, `name*`) into plain parameters.
///
/// Extended sections carry `charset'language'percent-encoded` in the first segment; the
/// charset applies to the whole reassembled value. Plain parameters pass through, and an
/// extended value takes precedence over a plain one of the same name.
pub fn combine_rfc2231(parameters: Vec<Parameter>) -> Vec<Parameter> {
    let mut plain: Vec<Parameter> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();
    for p in parameters {
        let name = p.name.to_ascii_lowercase();
        let Some(star) = name.find('*') else {
            plain.push(Parameter::new(name, p.value));
            continue;
        };
        let base = name[..star].to_string();
        let suffix = &name[star + 1..];
        let (index, extended) = if suffix.is_empty() {
            (0, true)
        } else {
            let (digits, ext) = match suffix.strip_suffix('*') {
                Some(d) => (d, true),
                None => (suffix, false),
            };
            match digits.parse::<u32>() {
                Ok(i) => (i, ext),
                Err(_) => {
                    debug!(parameter = %name, "ignoring malformed RFC 2231 section");
                    continue;
                }
            }
        };
        sections.push(Section {
            name: base,
            index,
            extended,
            value: p.value,
        });
    }
    if sections.is_empty() {
        return plain;
    }
    sections.sort_by(|a, b| a.name.cmp(&b.name).then(a.index.cmp(&b.index)));

    let mut combined: Vec<Parameter> = Vec::new();
    let mut i = 0;
    while i < sections.len() {
        let name = sections[i].name.clone();
        let mut charset: Option<String> = None;
        let mut bytes: Vec<u8> = Vec::new();
        let mut expected = 0;
        while i < sections.len() && sections[i].name == name {
            let s = &sections[i];
            i += 1;
            if s.index != expected {
                continue;
            }
            expected += 1;
            let mut value = s.value.as_str();
            if s.extended && s.index == 0 {
                let mut parts = value.splitn(3, '\'');
                if let (Some(cs), Some(_lang), Some(rest)) = (parts.next(), parts.next(), parts.next()) {
                    if !cs.is_empty() {
                        charset = Some(cs.to_string());
                    }
                    value = rest;
                }
            }
            if s.extended {
                bytes.extend(percent_decode_str(value));
            } else {
                bytes.extend_from_slice(value.as_bytes());
            }
        }
        let value = match &charset {
            Some(cs) => charset_bytes_to_string(&bytes, cs),
            None => String::from_utf8_lossy(&bytes).into_owned(),
        };
        plain.retain(|p| p.name != name);
        combined.push(Parameter::new(name, value));
    }
    plain.extend(combined);
    plain
}

/// `name=value`, quoting and escaping the value unless it is a token.
pub fn format_parameter(name: &str, value: &str) -> String {
    if is_token(value) {
        format!("{}={}", name, value)
    } else {
        format!("{}=\"{}\"", name, value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Render a parameterized header value (`type; name=value ...`) for the wire.
///
/// ASCII parameters are written as ordinary (quoted when needed) values. Non-ASCII values
/// become RFC 2231 extended values in UTF-8, split into numbered sections when long.
pub fn encode_parameter_header(value: &str) -> String {
    let value = unfold(value);
    let (main, params) = match value.find(';') {
        Some(i) => (&value[..i], &value[i + 1..]),
        None => (value.as_str(), ""),
    };
    let mut out = main.trim().to_string();
    for p in parse_parameter_list(params).unwrap_or_default() {
        out.push_str("; ");
        if p.value.is_ascii() {
            out.push_str(&format_parameter(&p.name, &p.value));
            continue;
        }
        let encoded = format!("utf-8''{}", utf8_percent_encode(&p.value, ATTRIBUTE_CHAR));
        let sections = split_sections(&encoded);
        if sections.len() == 1 {
            out.push_str(&format!("{}*={}", p.name, encoded));
            continue;
        }
        let rendered: Vec<String> = sections
            .iter()
            .enumerate()
            .map(|(i, section)| format!("{}*{}*={}", p.name, i, section))
            .collect();
        out.push_str(&rendered.join("; "));
    }
    out
}

/// Cut a percent-encoded value into sections of at most `SECTION_LENGTH`, never inside `%XX`.
fn split_sections(encoded: &str) -> Vec<&str> {
    let bytes = encoded.as_bytes();
    let mut sections = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    while pos < bytes.len() {
        let unit = if bytes[pos] == b'%' { 3usize.min(bytes.len() - pos) } else { 1 };
        if pos + unit - start > SECTION_LENGTH && pos > start {
            sections.push(&encoded[start..pos]);
            start = pos;
        }
        pos += unit;
    }
    sections.push(&encoded[start..]);
    sections
}

/// Main value of a structured header (`name` None) or the named parameter.
///
/// Values are unquoted, RFC 2231 sections are combined and RFC 2047 encoded-words (used
/// by some mailers in filenames) are decoded.
pub fn get_header_parameter(header_value: &str, name: Option<&str>) -> Option<String> {
    let value = unfold(header_value);
    let (main, params) = match value.find(';') {
        Some(i) => (&value[..i], &value[i + 1..]),
        None => (value.as_str(), ""),
    };
    match name {
        None => {
            let main = main.trim();
            if main.is_empty() {
                None
            } else {
                Some(main.to_string())
            }
        }
        Some(name) => parse_parameter_list(params)?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| decode_encoded_words(&p.value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_value_with_charset() {
        let combined = combine_rfc2231(vec![Parameter::new("filename*", "utf-8''na%C3%AFve.txt")]);
        assert_eq!(combined, vec![Parameter::new("filename", "naïve.txt")]);
    }

    #[test]
    fn continuations_are_joined_in_order() {
        let combined = combine_rfc2231(vec![
            Parameter::new("name*1", "part.pdf"),
            Parameter::new("name*0*", "iso-8859-1'en'r%E9sum%E9-"),
            Parameter::new("charset", "us-ascii"),
        ]);
        assert_eq!(combined[0], Parameter::new("charset", "us-ascii"));
        assert_eq!(combined[1], Parameter::new("name", "résumé-part.pdf"));
    }

    #[test]
    fn header_parameter_lookup() {
        let value = "attachment;\r\n filename=\"=?utf-8?Q?caf=C3=A9.txt?=\"; size=42";
        assert_eq!(get_header_parameter(value, None).as_deref(), Some("attachment"));
        assert_eq!(get_header_parameter(value, Some("FILENAME")).as_deref(), Some("café.txt"));
        assert_eq!(get_header_parameter(value, Some("size")).as_deref(), Some("42"));
        assert_eq!(get_header_parameter(value, Some("missing")), None);
    }

    #[test]
    fn non_ascii_parameters_use_extended_values() {
        let encoded = encode_parameter_header("text/plain; charset=utf-8; name=\"résumé.txt\"");
        assert_eq!(encoded, "text/plain; charset=utf-8; name*=utf-8''r%C3%A9sum%C3%A9.txt");
        assert_eq!(get_header_parameter(&encoded, Some("name")).as_deref(), Some("résumé.txt"));
    }

    #[test]
    fn long_extended_values_are_sectioned() {
        let name = format!("{}.pdf", "é".repeat(30));
        let encoded = encode_parameter_header(&format!("attachment; filename=\"{}\"", name));
        assert!(encoded.contains("filename*0*=utf-8''"));
        assert!(encoded.contains("filename*1*="));
        assert_eq!(get_header_parameter(&encoded, Some("filename")), Some(name));
    }

    #[test]
    fn quoted_parameters() {
        assert_eq!(format_parameter("name", "plain.txt"), "name=plain.txt");
        assert_eq!(format_parameter("name", "my \"big\" file"), "name=\"my \\\"big\\\" file\"");
    }
}
