/*
 * extractor.rs
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

//! Classifying parts into viewables and attachments, and rendering viewables as plain
//! text and HTML.

use std::collections::HashSet;

use tracing::trace;

use crate::mime::{deflow, get_text_from_part, html_to_text, text_to_html, Body, PartId, PartTree};
use crate::view::attachment::AttachmentViewInfo;
use crate::view::html::{add_html_divider, add_message_header_html, add_message_header_text, add_text_divider, part_name};
use crate::view::viewable::Viewable;

/// Plain text and HTML renderings of a list of viewables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub html: String,
}

/// Walk the tree below `part` in pre-order, appending displayable content to `viewables`
/// and everything else to `attachments`.
///
/// Of a `multipart/alternative` only the first `text/plain` and the last `text/html`
/// rendition are kept; the other renditions are dropped. A `multipart/signed` contributes
/// its signed content only. Detached signatures and `text/rfc822-headers` are skipped.
pub fn find_viewables_and_attachments(
    tree: &PartTree,
    part: PartId,
    viewables: &mut Vec<Viewable>,
    attachments: &mut Vec<PartId>,
) {
    match tree.body(part) {
        Some(Body::Multipart(multipart)) => {
            if tree.is_mime_type(part, "multipart/alternative") {
                let text = find_text_part(tree, multipart.parts(), true);
                let known: HashSet<PartId> = text.iter().filter_map(Viewable::part).collect();
                let html = find_html_part(tree, multipart.parts(), &known, attachments, true);
                if !text.is_empty() || !html.is_empty() {
                    viewables.push(Viewable::Alternative { text, html });
                }
            } else if tree.is_mime_type(part, "multipart/signed") {
                if let Some(first) = multipart.body_part(0) {
                    find_viewables_and_attachments(tree, first, viewables, attachments);
                }
            } else {
                for &child in multipart.parts() {
                    find_viewables_and_attachments(tree, child, viewables, attachments);
                }
            }
        }
        Some(Body::Message(message)) if !is_attachment_disposition(tree, part) => {
            viewables.push(Viewable::MessageHeader {
                container: part,
                message: *message,
            });
            find_viewables_and_attachments(tree, *message, viewables, attachments);
        }
        _ if is_part_textual_body(tree, part) => {
            let viewable = if tree.is_mime_type(part, "text/plain") {
                let content_type = tree.content_type(part);
                let param = |name: &str| {
                    content_type
                        .as_ref()
                        .and_then(|ct| ct.get_parameter(name))
                        .map(str::to_ascii_lowercase)
                };
                if param("format").as_deref() == Some("flowed") {
                    Viewable::Flowed {
                        part,
                        del_sp: param("delsp").as_deref() == Some("yes"),
                    }
                } else {
                    Viewable::Text(part)
                }
            } else {
                Viewable::Html(part)
            };
            viewables.push(viewable);
        }
        _ if tree.is_mime_type(part, "application/pgp-signature") || tree.is_mime_type(part, "text/rfc822-headers") => {
            trace!(part = part.index(), "skipping non-displayable part");
        }
        _ => attachments.push(part),
    }
}

/// Text, HTML or PGP content without an attachment disposition or a filename.
pub fn is_part_textual_body(tree: &PartTree, part: PartId) -> bool {
    if let Some(disposition) = tree.disposition(part) {
        if disposition.is_attachment() || disposition.has_parameter("filename") {
            return false;
        }
    }
    tree.is_mime_type(part, "text/html") || tree.is_mime_type(part, "text/plain") || tree.is_mime_type(part, "application/pgp")
}

fn is_attachment_disposition(tree: &PartTree, part: PartId) -> bool {
    tree.disposition(part).is_some_and(|d| d.is_attachment())
}

/// First `text/plain` child, or every plain text part of the first nested multipart that has any.
fn find_text_part(tree: &PartTree, parts: &[PartId], direct_child: bool) -> Vec<Viewable> {
    let mut viewables = Vec::new();
    for &part in parts {
        if let Some(inner) = tree.multipart(part) {
            let found = find_text_part(tree, inner.parts(), false);
            if !found.is_empty() {
                viewables.extend(found);
                if direct_child {
                    break;
                }
            }
        } else if is_part_textual_body(tree, part) && tree.is_mime_type(part, "text/plain") {
            viewables.push(Viewable::Text(part));
            if direct_child {
                break;
            }
        }
    }
    viewables
}

/// Last `text/html` rendition among the children (a nested multipart counts as one
/// rendition with all its HTML parts). Non-textual leaves become attachments.
fn find_html_part(
    tree: &PartTree,
    parts: &[PartId],
    known_text: &HashSet<PartId>,
    attachments: &mut Vec<PartId>,
    direct_child: bool,
) -> Vec<Viewable> {
    let mut viewables = Vec::new();
    for &part in parts {
        if let Some(inner) = tree.multipart(part) {
            let found = find_html_part(tree, inner.parts(), known_text, attachments, false);
            if !found.is_empty() {
                if direct_child {
                    viewables = found;
                } else {
                    viewables.extend(found);
                }
            }
        } else if is_part_textual_body(tree, part) {
            if tree.is_mime_type(part, "text/html") {
                if direct_child {
                    viewables.clear();
                }
                viewables.push(Viewable::Html(part));
            }
        } else if !known_text.contains(&part) {
            attachments.push(part);
        }
    }
    viewables
}

/// Render viewables, separating consecutive ones with dividers. The header block of a
/// nested message is preceded by a divider and its content is not.
///
/// For an alternative the text side falls back to the HTML rendition and the HTML side to
/// the plain one. Without `prefer_html` a plain rendition wins on the HTML side too.
pub fn extract_text_from_viewables(tree: &PartTree, viewables: &[Viewable], prefer_html: bool) -> ExtractedText {
    let mut out = ExtractedText::default();
    let mut hide_divider = true;
    for viewable in viewables {
        match viewable {
            Viewable::Alternative { text, html } => {
                let text_side = if text.is_empty() { html } else { text };
                let html_side = if html.is_empty() || (!prefer_html && !text.is_empty()) {
                    text
                } else {
                    html
                };
                let mut divider = !hide_divider;
                for v in text_side {
                    build_text(tree, v, divider, &mut out.text);
                    divider = true;
                }
                divider = !hide_divider;
                for v in html_side {
                    build_html(tree, v, divider, &mut out.html);
                    divider = true;
                }
                hide_divider = false;
            }
            Viewable::MessageHeader { container, message } => {
                let name = part_name(tree, *container);
                if !hide_divider {
                    add_text_divider(&mut out.text, &name);
                    add_html_divider(&mut out.html, &name);
                }
                add_message_header_text(&mut out.text, tree, *message);
                add_message_header_html(&mut out.html, tree, *message);
                hide_divider = true;
            }
            textual => {
                build_text(tree, textual, !hide_divider, &mut out.text);
                build_html(tree, textual, !hide_divider, &mut out.html);
                hide_divider = false;
            }
        }
    }
    out
}

fn build_text(tree: &PartTree, viewable: &Viewable, divider: bool, out: &mut String) {
    let Some(part) = viewable.part() else {
        return;
    };
    if divider {
        add_text_divider(out, &part_name(tree, part));
    }
    let content = get_text_from_part(tree, part).unwrap_or_default();
    match viewable {
        Viewable::Html(_) => out.push_str(&html_to_text(&content)),
        Viewable::Flowed { del_sp, .. } => out.push_str(&deflow(&content, *del_sp)),
        _ => out.push_str(&content),
    }
}

fn build_html(tree: &PartTree, viewable: &Viewable, divider: bool, out: &mut String) {
    let Some(part) = viewable.part() else {
        return;
    };
    if divider {
        add_html_divider(out, &part_name(tree, part));
    }
    let content = get_text_from_part(tree, part).unwrap_or_default();
    match viewable {
        Viewable::Html(_) => out.push_str(&content),
        Viewable::Flowed { del_sp, .. } => out.push_str(&text_to_html(&deflow(&content, *del_sp))),
        _ => out.push_str(&text_to_html(&content)),
    }
}

/// Viewables and attachments of several subtrees, rendered together.
pub fn extract_viewables_and_attachments(
    tree: &PartTree,
    parts: &[PartId],
    prefer_html: bool,
) -> (ExtractedText, Vec<AttachmentViewInfo>) {
    let mut viewables = Vec::new();
    let mut attachments = Vec::new();
    for &part in parts {
        find_viewables_and_attachments(tree, part, &mut viewables, &mut attachments);
    }
    let text = extract_text_from_viewables(tree, &viewables, prefer_html);
    let infos = attachments
        .into_iter()
        .map(|p| AttachmentViewInfo::from_part(tree, p))
        .collect();
    (text, infos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewables_of(tree: &PartTree) -> (Vec<Viewable>, Vec<PartId>) {
        let mut viewables = Vec::new();
        let mut attachments = Vec::new();
        find_viewables_and_attachments(tree, tree.root(), &mut viewables, &mut attachments);
        (viewables, attachments)
    }

    #[test]
    fn alternative_keeps_one_rendition_each() {
        let msg = b"Content-Type: multipart/alternative; boundary=a\r\n\r\n--a\r\nContent-Type: text/plain\r\n\r\nfirst plain\r\n--a\r\nContent-Type: text/plain\r\n\r\nsecond plain\r\n--a\r\nContent-Type: text/html\r\n\r\n<p>old</p>\r\n--a\r\nContent-Type: text/html\r\n\r\n<p>new</p>\r\n--a\r\nContent-Type: image/png\r\n\r\npng\r\n--a--\r\n";
        let tree = PartTree::parse(msg).unwrap();
        let children = tree.children(tree.root());
        let (viewables, attachments) = viewables_of(&tree);
        assert_eq!(
            viewables,
            vec![Viewable::Alternative {
                text: vec![Viewable::Text(children[0])],
                html: vec![Viewable::Html(children[3])],
            }]
        );
        assert_eq!(attachments, vec![children[4]]);

        let rendered = extract_text_from_viewables(&tree, &viewables, true);
        assert_eq!(rendered.text, "first plain");
        assert_eq!(rendered.html, "<p>new</p>");
        let plain_preferred = extract_text_from_viewables(&tree, &viewables, false);
        assert_eq!(plain_preferred.html, "<pre dir=\"auto\" class=\"k9mail\">first plain</pre>");
    }

    #[test]
    fn html_only_alternative_falls_back_for_text() {
        let msg = b"Content-Type: multipart/alternative; boundary=a\r\n\r\n--a\r\nContent-Type: text/html\r\n\r\n<p>only &amp; html</p>\r\n--a--\r\n";
        let tree = PartTree::parse(msg).unwrap();
        let (viewables, _) = viewables_of(&tree);
        let rendered = extract_text_from_viewables(&tree, &viewables, true);
        assert_eq!(rendered.text, "only & html");
    }

    #[test]
    fn mixed_content_gets_dividers() {
        let msg = b"Content-Type: multipart/mixed; boundary=m\r\n\r\n--m\r\nContent-Type: text/plain\r\n\r\none\r\n--m\r\nContent-Type: text/plain\r\nContent-Disposition: inline\r\n\r\ntwo\r\n--m\r\nContent-Type: text/plain\r\nContent-Disposition: attachment; filename=\"a.txt\"\r\n\r\nthree\r\n--m\r\nContent-Type: application/pgp-signature\r\n\r\nsig\r\n--m--\r\n";
        let tree = PartTree::parse(msg).unwrap();
        let (text, attachments) = extract_viewables_and_attachments(&tree, &[tree.root()], true);
        assert_eq!(text.text, format!("one\r\n\r\n{}\r\n\r\ntwo", "-".repeat(72)));
        assert_eq!(
            text.html,
            "<pre dir=\"auto\" class=\"k9mail\">one</pre><p style=\"margin-top: 2.5em; margin-bottom: 1em; border-bottom: 1px solid #000\"></p><pre dir=\"auto\" class=\"k9mail\">two</pre>"
        );
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].display_name, "a.txt");
    }

    #[test]
    fn nested_message_is_inlined() {
        let msg = b"Content-Type: multipart/mixed; boundary=m\r\n\r\n--m\r\nContent-Type: text/plain\r\n\r\nsee below\r\n--m\r\nContent-Type: message/rfc822\r\n\r\nFrom: carol@example.com\r\nSubject: inner\r\n\r\ninner body\r\n--m--\r\n";
        let tree = PartTree::parse(msg).unwrap();
        let children = tree.children(tree.root());
        let (viewables, attachments) = viewables_of(&tree);
        assert!(attachments.is_empty());
        assert_eq!(viewables.len(), 3);
        assert!(matches!(viewables[1], Viewable::MessageHeader { container, .. } if container == children[1]));

        let rendered = extract_text_from_viewables(&tree, &viewables, true);
        assert_eq!(
            rendered.text,
            format!(
                "see below\r\n\r\n{}\r\n\r\nFrom: carol@example.com\r\nSubject: inner\r\n\r\ninner body",
                "-".repeat(72)
            )
        );
    }

    #[test]
    fn signed_contributes_first_child_only() {
        let msg = b"Content-Type: multipart/signed; protocol=\"application/pgp-signature\"; boundary=s\r\n\r\n--s\r\nContent-Type: text/plain\r\n\r\nsigned text\r\n--s\r\nContent-Type: application/pgp-signature\r\n\r\nsig\r\n--s--\r\n";
        let tree = PartTree::parse(msg).unwrap();
        let (viewables, attachments) = viewables_of(&tree);
        assert_eq!(viewables.len(), 1);
        assert!(attachments.is_empty());
    }
}
