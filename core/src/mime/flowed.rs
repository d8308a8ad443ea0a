/*
 * flowed.rs
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

//! `format=flowed` (RFC 3676) reassembly.

/// Join soft-wrapped lines of a `format=flowed` body.
///
/// A line ending in a space is flowed into the next one when both have the same quote
/// depth. The signature separator `-- ` is never flowed. Space-stuffing is removed and, with
/// `del_sp`, so is the soft-break space. Quoted output lines are prefixed `>`*depth + space.
/// Lines are separated by CRLF.
pub fn deflow(text: &str, del_sp: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut first = true;
    let mut previous_flowed = false;
    let mut previous_depth = 0;

    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let depth = line.bytes().take_while(|&b| b == b'>').count();
        let mut content = &line[depth..];
        if let Some(unstuffed) = content.strip_prefix(' ') {
            content = unstuffed;
        }
        let is_signature = content == "-- ";
        let flowed = !is_signature && content.ends_with(' ');
        if flowed && del_sp {
            content = &content[..content.len() - 1];
        }

        let continues = !first && previous_flowed && depth == previous_depth && !is_signature;
        if !continues {
            if !first {
                out.push_str("\r\n");
            }
            if depth > 0 {
                out.extend(std::iter::repeat('>').take(depth));
                out.push(' ');
            }
        }
        out.push_str(content);

        first = false;
        previous_flowed = flowed;
        previous_depth = depth;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_soft_breaks_only() {
        assert_eq!(
            deflow("K-9 Mail rocks :> \r\nflowed line\r\nnot flowed line", false),
            "K-9 Mail rocks :> flowed line\r\nnot flowed line"
        );
    }

    #[test]
    fn del_sp_removes_break_space() {
        assert_eq!(deflow("abc \r\ndef", true), "abcdef");
    }

    #[test]
    fn signature_separator_is_hard() {
        assert_eq!(deflow("text\r\n-- \r\nMe", false), "text\r\n-- \r\nMe");
    }

    #[test]
    fn quote_depth_limits_joining() {
        assert_eq!(
            deflow(">> one \r\n>> two \r\n> three\r\n  stuffed", false),
            ">> one two \r\n> three\r\n stuffed"
        );
    }
}
