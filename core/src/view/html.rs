/*
 * html.rs
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

//! Header blocks of nested messages and the dividers between viewables.

use chrono::DateTime;

use crate::mime::{escape_html, unfold_and_decode, PartId, PartTree};

pub const TEXT_DIVIDER_LENGTH: usize = 72;
const FILENAME_PREFIX: &str = "----- ";
const FILENAME_SUFFIX: &str = " ";
const NO_SUBJECT: &str = "(No subject)";
const HTML_DIVIDER_OPEN: &str = "<p style=\"margin-top: 2.5em; margin-bottom: 1em; border-bottom: 1px solid #000\">";

/// Filename a divider is labelled with: the disposition `filename`, else empty.
pub fn part_name(tree: &PartTree, part: PartId) -> String {
    tree.disposition(part).and_then(|d| d.filename()).unwrap_or_default()
}

/// Blank line, dashed rule (labelled with `filename` when not empty), blank line.
pub fn add_text_divider(out: &mut String, filename: &str) {
    out.push_str("\r\n\r\n");
    if filename.is_empty() {
        out.push_str(&"-".repeat(TEXT_DIVIDER_LENGTH));
    } else {
        let max = TEXT_DIVIDER_LENGTH - FILENAME_PREFIX.len() - FILENAME_SUFFIX.len();
        let mut name: String = filename.to_string();
        if name.chars().count() > max {
            name = name.chars().take(max - 3).collect();
            name.push_str("...");
        }
        out.push_str(FILENAME_PREFIX);
        out.push_str(&name);
        out.push_str(FILENAME_SUFFIX);
        let used = FILENAME_PREFIX.len() + name.chars().count() + FILENAME_SUFFIX.len();
        out.push_str(&"-".repeat(TEXT_DIVIDER_LENGTH - used));
    }
    out.push_str("\r\n\r\n");
}

pub fn add_html_divider(out: &mut String, filename: &str) {
    out.push_str(HTML_DIVIDER_OPEN);
    out.push_str(&escape_html(filename));
    out.push_str("</p>");
}

/// Decoded header fields shown for a nested message, in display order.
fn header_rows(tree: &PartTree, message: PartId) -> Vec<(&'static str, String)> {
    let header = tree.header(message);
    let decoded = |name: &str| header.first(name).map(unfold_and_decode).map(|v| v.trim().to_string());
    let mut rows = Vec::new();
    for (label, name) in [("From:", "From"), ("To:", "To"), ("Cc:", "Cc")] {
        if let Some(value) = decoded(name).filter(|v| !v.is_empty()) {
            rows.push((label, value));
        }
    }
    if let Some(date) = decoded("Date").filter(|v| !v.is_empty()) {
        let shown = DateTime::parse_from_rfc2822(&date)
            .map(|d| d.to_rfc2822())
            .unwrap_or(date);
        rows.push(("Date:", shown));
    }
    let subject = decoded("Subject")
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());
    rows.push(("Subject:", subject));
    rows
}

pub fn add_message_header_text(out: &mut String, tree: &PartTree, message: PartId) {
    for (label, value) in header_rows(tree, message) {
        out.push_str(label);
        out.push(' ');
        out.push_str(&value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
}

pub fn add_message_header_html(out: &mut String, tree: &PartTree, message: PartId) {
    out.push_str("<table style=\"border: 0\">");
    for (label, value) in header_rows(tree, message) {
        out.push_str("<tr><th style=\"text-align: left; vertical-align: top;\">");
        out.push_str(label);
        out.push_str("</th><td>");
        out.push_str(&escape_html(&value));
        out.push_str("</td></tr>");
    }
    out.push_str("</table>");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_dividers() {
        let mut plain = String::new();
        add_text_divider(&mut plain, "");
        assert_eq!(plain, format!("\r\n\r\n{}\r\n\r\n", "-".repeat(72)));

        let mut named = String::new();
        add_text_divider(&mut named, "notes.txt");
        let rule = named.trim();
        assert_eq!(rule.len(), 72);
        assert!(rule.starts_with("----- notes.txt ---"));

        let mut long = String::new();
        add_text_divider(&mut long, &"x".repeat(100));
        let rule = long.trim();
        assert_eq!(rule.len(), 72);
        assert!(rule.starts_with(&format!("----- {}... ", "x".repeat(62))));
    }

    #[test]
    fn nested_header_block() {
        let tree = PartTree::parse(b"From: Alice <alice@example.com>\r\nTo: bob@example.com\r\nDate: Thu, 10 Jul 2025 10:52:37 +0200\r\n\r\nbody").unwrap();
        let mut text = String::new();
        add_message_header_text(&mut text, &tree, tree.root());
        assert_eq!(
            text,
            "From: Alice <alice@example.com>\r\nTo: bob@example.com\r\nDate: Thu, 10 Jul 2025 10:52:37 +0200\r\nSubject: (No subject)\r\n\r\n"
        );

        let mut html = String::new();
        add_message_header_html(&mut html, &tree, tree.root());
        assert!(html.starts_with("<table style=\"border: 0\"><tr><th style=\"text-align: left; vertical-align: top;\">From:</th><td>Alice &lt;alice@example.com&gt;</td></tr>"));
        assert!(html.ends_with("<td>(No subject)</td></tr></table>"));
    }
}
