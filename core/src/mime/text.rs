/*
 * text.rs
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

//! Text extraction from leaf parts and plain text / HTML conversion.

use crate::mime::body::Body;
use crate::mime::part::{PartId, PartTree};
use crate::mime::rfc2047::charset_bytes_to_string;

const QUOTE_OPEN: &str = "<blockquote class=\"gmail_quote\" style=\"margin: 0pt 0pt 1ex 0.8ex; border-left: 1px solid #729fcf; padding-left: 1ex;\">";
const QUOTE_CLOSE: &str = "</blockquote>";

const URI_SCHEMES: [&str; 3] = ["http://", "https://", "mailto:"];

/// Decode body bytes in `charset` (UTF-8 when not given).
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> String {
    charset_bytes_to_string(bytes, charset.unwrap_or("utf-8"))
}

/// Decoded text of a leaf part, honouring its `charset` parameter. None for containers and
/// for content that cannot be read.
pub fn get_text_from_part(tree: &PartTree, id: PartId) -> Option<String> {
    match tree.body(id)? {
        Body::Text(text) => Some(text.text().to_string()),
        Body::Binary(binary) => {
            let bytes = binary.decoded_bytes().ok()?;
            let charset = tree.content_type(id).and_then(|ct| ct.get_parameter("charset").map(str::to_string));
            Some(decode_text(&bytes, charset.as_deref()))
        }
        _ => None,
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render plain text as a `<pre>` block. Quoted lines become nested blockquotes and URIs
/// become links.
pub fn text_to_html(text: &str) -> String {
    let mut out = String::from("<pre dir=\"auto\" class=\"k9mail\">");
    let mut current_depth = 0;
    for (i, raw) in text.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let (depth, content) = split_quote(line);
        if depth > current_depth {
            for _ in current_depth..depth {
                out.push_str(QUOTE_OPEN);
            }
        } else if depth < current_depth {
            for _ in depth..current_depth {
                out.push_str(QUOTE_CLOSE);
            }
        } else if i > 0 {
            out.push_str("<br>");
        }
        current_depth = depth;
        linkify_into(content, &mut out);
    }
    for _ in 0..current_depth {
        out.push_str(QUOTE_CLOSE);
    }
    out.push_str("</pre>");
    out
}

/// Quote depth and the text after the `>` prefix.
fn split_quote(line: &str) -> (usize, &str) {
    let mut depth = 0;
    let mut end = 0;
    for (i, c) in line.char_indices() {
        match c {
            '>' => {
                depth += 1;
                end = i + 1;
            }
            ' ' if depth > 0 => end = i + 1,
            _ => break,
        }
    }
    if depth == 0 {
        (0, line)
    } else {
        (depth, &line[end..])
    }
}

fn linkify_into(line: &str, out: &mut String) {
    let mut rest = line;
    while let Some((start, scheme_len)) = find_uri(rest) {
        let after = &rest[start..];
        let mut end = after
            .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"'))
            .unwrap_or(after.len());
        while end > scheme_len && after[..end].ends_with(['.', ',', ';', ':', '!', '?', ')']) {
            end -= 1;
        }
        if end <= scheme_len {
            out.push_str(&escape_html(&rest[..start + scheme_len]));
            rest = &rest[start + scheme_len..];
            continue;
        }
        let uri = escape_html(&after[..end]);
        out.push_str(&escape_html(&rest[..start]));
        out.push_str(&format!("<a href=\"{}\">{}</a>", uri, uri));
        rest = &after[end..];
    }
    out.push_str(&escape_html(rest));
}

fn find_uri(text: &str) -> Option<(usize, usize)> {
    let lower = text.to_ascii_lowercase();
    URI_SCHEMES
        .iter()
        .filter_map(|scheme| {
            lower
                .match_indices(scheme)
                .find(|(i, _)| *i == 0 || !text[..*i].ends_with(|c: char| c.is_ascii_alphanumeric()))
                .map(|(i, _)| (i, scheme.len()))
        })
        .min_by_key(|(i, _)| *i)
}

const BLOCK_ELEMENTS: [&str; 16] = [
    "p", "div", "br", "tr", "li", "ul", "ol", "table", "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Reduce HTML to readable plain text.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        out.push_str(&decode_entities(&rest[..lt]));
        let tag_text = &rest[lt + 1..];
        let Some(gt) = tag_text.find('>') else {
            rest = "";
            break;
        };
        let tag = &tag_text[..gt];
        rest = &tag_text[gt + 1..];
        if tag.starts_with("!--") {
            if let Some(end) = rest.find("-->") {
                rest = &rest[end + 3..];
            }
            continue;
        }
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if (name == "script" || name == "style") && !tag.starts_with('/') {
            let close = format!("</{}", name);
            rest = match rest.to_ascii_lowercase().find(&close) {
                Some(i) => rest[i..].find('>').map(|j| &rest[i + j + 1..]).unwrap_or(""),
                None => "",
            };
            continue;
        }
        if BLOCK_ELEMENTS.contains(&name.as_str()) && !out.is_empty() && !out.ends_with("\r\n") {
            out.push_str("\r\n");
        }
    }
    out.push_str(&decode_entities(rest));
    out.trim().to_string()
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').filter(|&i| i <= 10).and_then(|semi| {
            let entity = &after[..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => {
                    let number = entity.strip_prefix('#')?;
                    let code = match number.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => number.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            c.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_escaped_in_pre() {
        assert_eq!(text_to_html("K-9 Mail rocks :>"), "<pre dir=\"auto\" class=\"k9mail\">K-9 Mail rocks :&gt;</pre>");
        assert_eq!(text_to_html("a\r\nb"), "<pre dir=\"auto\" class=\"k9mail\">a<br>b</pre>");
    }

    #[test]
    fn quotes_become_blockquotes() {
        let html = text_to_html("hi\r\n> quoted\r\n>> deeper\r\nback");
        assert_eq!(
            html,
            format!(
                "<pre dir=\"auto\" class=\"k9mail\">hi{q}quoted{q}deeper{c}{c}back</pre>",
                q = QUOTE_OPEN,
                c = QUOTE_CLOSE
            )
        );
    }

    #[test]
    fn uris_are_linked() {
        let html = text_to_html("see https://example.com/a?b=1&c=2. or mailto:x@y.z");
        assert!(html.contains("<a href=\"https://example.com/a?b=1&amp;c=2\">https://example.com/a?b=1&amp;c=2</a>."));
        assert!(html.contains("<a href=\"mailto:x@y.z\">mailto:x@y.z</a>"));
    }

    #[test]
    fn html_is_reduced_to_text() {
        let text = html_to_text("<html><head><style>p { color: red }</style></head><body><p>One &amp; two</p><div>three<br>four&#33;</div><script>alert(1)</script></body></html>");
        assert_eq!(text, "One & two\r\nthree\r\nfour!");
    }

    #[test]
    fn charset_decoding() {
        assert_eq!(decode_text(b"caf\xe9", Some("iso-8859-1")), "café");
        assert_eq!(decode_text("café".as_bytes(), None), "café");
    }
}
