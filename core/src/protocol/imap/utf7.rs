/*
 * utf7.rs
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

//! Modified UTF-7 mailbox names (RFC 3501 section 5.1.3).

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::Engine;

use crate::store::MessagingError;

const MUTF7: GeneralPurpose = GeneralPurpose::new(&alphabet::IMAP_MUTF7, NO_PAD);

pub fn encode_mailbox_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending: Vec<u16> = Vec::new();
    for c in name.chars() {
        if (' '..='~').contains(&c) {
            flush_shifted(&mut pending, &mut out);
            if c == '&' {
                out.push_str("&-");
            } else {
                out.push(c);
            }
        } else {
            let mut units = [0u16; 2];
            pending.extend_from_slice(c.encode_utf16(&mut units));
        }
    }
    flush_shifted(&mut pending, &mut out);
    out
}

fn flush_shifted(pending: &mut Vec<u16>, out: &mut String) {
    if pending.is_empty() {
        return;
    }
    let bytes: Vec<u8> = pending.iter().flat_map(|u| u.to_be_bytes()).collect();
    out.push('&');
    out.push_str(&MUTF7.encode(bytes));
    out.push('-');
    pending.clear();
}

pub fn decode_mailbox_name(encoded: &str) -> Result<String, MessagingError> {
    let invalid = || MessagingError::parse(format!("invalid modified UTF-7 mailbox name {:?}", encoded));
    let mut out = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let shifted = &rest[amp + 1..];
        let end = shifted.find('-').ok_or_else(invalid)?;
        if end == 0 {
            out.push('&');
        } else {
            let bytes = MUTF7.decode(&shifted[..end]).map_err(|_| invalid())?;
            if bytes.len() % 2 != 0 {
                return Err(invalid());
            }
            let units: Vec<u16> = bytes.chunks(2).map(|b| u16::from_be_bytes([b[0], b[1]])).collect();
            out.push_str(&String::from_utf16(&units).map_err(|_| invalid())?);
        }
        rest = &shifted[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
