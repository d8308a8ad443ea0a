/*
 * header.rs
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

//! Header container: ordered multimap of fields with case-insensitive lookup.

use std::io::{self, Write};

use crate::mime::parameter::encode_parameter_header;
use crate::mime::rfc2047::{decode_encoded_words, encode_encoded_word};

/// Soft limit for folded header lines when writing.
pub const DEFAULT_FOLD_COLUMN: usize = 78;

/// One header field. `value` is stored as received (folding intact).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    value: String,
    /// Exact bytes as parsed, written back unchanged.
    raw: Option<Vec<u8>>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<Field>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// All values for `name`, in order.
    pub fn get(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
            .collect()
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    pub fn first_unfolded(&self, name: &str) -> Option<String> {
        self.first(name).map(unfold)
    }

    /// First value, unfolded and with RFC 2047 encoded-words decoded.
    pub fn first_decoded(&self, name: &str) -> Option<String> {
        self.first(name).map(unfold_and_decode)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Replace every instance of `name` with one field at the position of the first.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let field = Field {
            name: name.to_string(),
            value: value.into(),
            raw: None,
        };
        match self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name)) {
            Some(pos) => {
                self.fields[pos] = field;
                let mut index = 0;
                self.fields.retain(|f| {
                    let keep = index <= pos || !f.name.eq_ignore_ascii_case(name);
                    index += 1;
                    keep
                });
            }
            None => self.fields.push(field),
        }
    }

    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.fields.push(Field {
            name: name.to_string(),
            value: value.into(),
            raw: None,
        });
    }

    /// Add a parsed field, remembering its exact bytes.
    pub fn add_raw(&mut self, name: &str, value: impl Into<String>, raw: &[u8]) {
        self.fields.push(Field {
            name: name.to_string(),
            value: value.into(),
            raw: Some(raw.to_vec()),
        });
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.name.eq_ignore_ascii_case(name));
    }

    /// Distinct field names in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for f in &self.fields {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&f.name)) {
                names.push(&f.name);
            }
        }
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Write the header block without the terminating blank line.
    ///
    /// Parsed fields are reproduced byte for byte. Programmatic values containing non-ASCII
    /// text are encoded according to the field (see [`encode_field_value`]), and long
    /// single-line values are folded at whitespace.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for field in &self.fields {
            if let Some(raw) = &field.raw {
                out.write_all(raw)?;
                if !raw.ends_with(b"\n") {
                    out.write_all(b"\r\n")?;
                }
                continue;
            }
            let value = if field.value.is_ascii() {
                field.value.clone()
            } else {
                encode_field_value(&field.name, &field.value)
            };
            let line = if value.contains('\n') {
                format!("{}: {}", field.name, value)
            } else {
                fold(&field.name, &value, DEFAULT_FOLD_COLUMN)
            };
            out.write_all(line.as_bytes())?;
            out.write_all(b"\r\n")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Header {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

const PARAMETER_FIELDS: &[&str] = &["Content-Type", "Content-Disposition"];

const ADDRESS_FIELDS: &[&str] = &[
    "From",
    "Sender",
    "Reply-To",
    "To",
    "Cc",
    "Bcc",
    "Resent-From",
    "Resent-Sender",
    "Resent-To",
    "Resent-Cc",
    "Resent-Bcc",
];

/// Structured fields whose syntax has no place for encoded-words; written as given.
const OPAQUE_FIELDS: &[&str] = &[
    "Date",
    "Message-ID",
    "In-Reply-To",
    "References",
    "Content-ID",
    "Content-Transfer-Encoding",
    "MIME-Version",
    "Return-Path",
    "Received",
];

fn is_one_of(name: &str, fields: &[&str]) -> bool {
    fields.iter().any(|f| f.eq_ignore_ascii_case(name))
}

/// Wire form of a non-ASCII value for field `name`.
///
/// Parameterized fields get RFC 2231 parameters, address fields get encoded-words in their
/// display names only, and unstructured fields (Subject and the like) are encoded whole.
pub fn encode_field_value(name: &str, value: &str) -> String {
    if is_one_of(name, PARAMETER_FIELDS) {
        encode_parameter_header(value)
    } else if is_one_of(name, ADDRESS_FIELDS) {
        split_addresses(&unfold(value))
            .into_iter()
            .map(encode_mailbox)
            .collect::<Vec<_>>()
            .join(", ")
    } else if is_one_of(name, OPAQUE_FIELDS) {
        value.to_string()
    } else {
        encode_encoded_word(value, name.len() + 2)
    }
}

/// Split an address list at commas outside quoted strings, comments and angle brackets.
fn split_addresses(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    let mut depth = 0usize;
    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '<' | '(' if !quoted => depth += 1,
            '>' | ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                out.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(value[start..].trim());
    out.retain(|a| !a.is_empty());
    out
}

fn encode_mailbox(mailbox: &str) -> String {
    if mailbox.is_ascii() {
        return mailbox.to_string();
    }
    let Some(lt) = mailbox.rfind('<') else {
        return mailbox.to_string();
    };
    let display = mailbox[..lt].trim();
    let display = match display.strip_prefix('"').and_then(|d| d.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => display.to_string(),
    };
    if display.is_empty() || display.is_ascii() {
        return mailbox.to_string();
    }
    format!("{} {}", encode_encoded_word(&display, 0), &mailbox[lt..])
}

/// Remove folding: every CR and LF byte is dropped.
pub fn unfold(s: &str) -> String {
    s.chars().filter(|&c| c != '\r' && c != '\n').collect()
}

pub fn unfold_and_decode(s: &str) -> String {
    decode_encoded_words(&unfold(s))
}

/// Render `name: value`, breaking before whitespace so lines stay within `column` where
/// possible. Words longer than the limit are left intact.
pub fn fold(name: &str, value: &str, column: usize) -> String {
    let mut out = format!("{}: ", name);
    let mut line_len = out.len();
    let mut first = true;
    let mut rest = value;
    while !rest.is_empty() {
        let ws_len = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        let after_ws = &rest[ws_len..];
        let word_len = after_ws.find([' ', '\t']).unwrap_or(after_ws.len());
        let chunk = &rest[..ws_len + word_len];
        if !first && ws_len > 0 && line_len + chunk.len() > column {
            out.push_str("\r\n");
            line_len = 0;
        }
        out.push_str(chunk);
        line_len += chunk.len();
        first = false;
        rest = &rest[ws_len + word_len..];
    }
    out
}
