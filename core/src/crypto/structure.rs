/*
 * structure.rs
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

//! Locating encrypted and signed structures in a part tree.

use std::io;

use crate::crypto::annotation::MessageCryptoAnnotations;
use crate::mime::{get_text_from_part, is_same_mime_type, Body, PartId, PartStorage, PartTree};

pub const MULTIPART_ENCRYPTED: &str = "multipart/encrypted";
pub const MULTIPART_SIGNED: &str = "multipart/signed";
pub const APPLICATION_PGP_ENCRYPTED: &str = "application/pgp-encrypted";
pub const APPLICATION_PGP_SIGNATURE: &str = "application/pgp-signature";
pub const APPLICATION_PGP: &str = "application/pgp";
pub const TEXT_PLAIN: &str = "text/plain";

const PROTOCOL_PARAMETER: &str = "protocol";
const PGP_INLINE_START_MARKER: &str = "-----BEGIN PGP MESSAGE-----";
const PGP_INLINE_SIGNED_START_MARKER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const PGP_SIGNATURE_START_MARKER: &str = "-----BEGIN PGP SIGNATURE-----";
const TEXT_LENGTH_FOR_INLINE_CHECK: usize = 36;

/// The encrypted or signed part the message is "about", if any.
///
/// That is the root itself, the first child of a top-level `multipart/alternative` when it
/// is PGP/INLINE, or the first child of a top-level `multipart/mixed` (or the first child
/// of an alternative in that position). In the mixed case the remaining children are
/// pushed onto `extra_parts`.
pub fn find_primary_encrypted_or_signed_part(tree: &PartTree, part: PartId, extra_parts: &mut Vec<PartId>) -> Option<PartId> {
    if is_part_encrypted_or_signed(tree, part) {
        return Some(part);
    }
    if let Some(found) = find_primary_part_in_alternative(tree, part) {
        return Some(found);
    }
    find_primary_part_in_mixed(tree, part, extra_parts)
}

fn find_primary_part_in_mixed(tree: &PartTree, part: PartId, extra_parts: &mut Vec<PartId>) -> Option<PartId> {
    if !tree.is_mime_type(part, "multipart/mixed") {
        return None;
    }
    let multipart = tree.multipart(part)?;
    let first = multipart.body_part(0)?;
    let found = if is_part_encrypted_or_signed(tree, first) {
        Some(first)
    } else {
        find_primary_part_in_alternative(tree, first)
    };
    if found.is_some() {
        extra_parts.extend(multipart.parts().iter().skip(1).copied());
    }
    found
}

fn find_primary_part_in_alternative(tree: &PartTree, part: PartId) -> Option<PartId> {
    if !tree.is_mime_type(part, "multipart/alternative") {
        return None;
    }
    let first = tree.multipart(part)?.body_part(0)?;
    if is_part_pgp_inline_encrypted_or_signed(tree, first) {
        Some(first)
    } else {
        None
    }
}

/// Depth-first search in child order; matches are not descended into.
fn collect_parts<F>(tree: &PartTree, start: PartId, mut substitute: impl FnMut(PartId) -> PartId, matches: F) -> Vec<PartId>
where
    F: Fn(&PartTree, PartId) -> bool,
{
    let mut found = Vec::new();
    let mut stack = vec![start];
    while let Some(next) = stack.pop() {
        let part = substitute(next);
        if matches(tree, part) {
            found.push(part);
            continue;
        }
        if let Some(multipart) = tree.multipart(part) {
            stack.extend(multipart.parts().iter().rev().copied());
        }
    }
    found
}

pub fn find_multipart_encrypted_parts(tree: &PartTree, start: PartId) -> Vec<PartId> {
    collect_parts(tree, start, |p| p, is_part_multipart_encrypted)
}

/// Signed parts below `start`. Parts that already carry an annotation with a replacement
/// are searched through their replacement, which is how signatures inside decrypted
/// content are found.
pub fn find_multipart_signed_parts(tree: &PartTree, start: PartId, annotations: &MessageCryptoAnnotations) -> Vec<PartId> {
    let substitute = |p: PartId| annotations.get(p).and_then(|a| a.replacement).unwrap_or(p);
    collect_parts(tree, start, substitute, is_part_multipart_signed)
}

pub fn find_pgp_inline_parts(tree: &PartTree, start: PartId) -> Vec<PartId> {
    collect_parts(tree, start, |p| p, is_part_pgp_inline_encrypted_or_signed)
}

/// Decoded detached signature of a `multipart/signed` part.
pub fn signature_data(tree: &PartTree, part: PartId) -> io::Result<Option<Vec<u8>>> {
    if !is_part_multipart_signed(tree, part) {
        return Ok(None);
    }
    let Some(signature) = tree.multipart(part).and_then(|m| m.body_part(1)) else {
        return Ok(None);
    };
    if !tree.is_mime_type(signature, APPLICATION_PGP_SIGNATURE) {
        return Ok(None);
    }
    match tree.body(signature) {
        Some(body) => body.decoded_bytes().map(Some),
        None => Ok(None),
    }
}

pub fn is_part_encrypted_or_signed(tree: &PartTree, part: PartId) -> bool {
    is_part_multipart_encrypted(tree, part)
        || is_part_multipart_signed(tree, part)
        || is_part_pgp_inline_encrypted_or_signed(tree, part)
}

/// Two children whose first matches the `protocol` parameter. Without a protocol the
/// structure is still accepted when the encrypted payload was never downloaded.
pub fn is_part_multipart_encrypted(tree: &PartTree, part: PartId) -> bool {
    if !tree.is_mime_type(part, MULTIPART_ENCRYPTED) {
        return false;
    }
    let Some(multipart) = tree.multipart(part) else {
        return false;
    };
    if multipart.count() != 2 {
        return false;
    }
    let (control, payload) = (multipart.parts()[0], multipart.parts()[1]);
    match protocol_parameter(tree, part) {
        Some(protocol) => is_same_mime_type(&tree.mime_type(control), &protocol),
        None => !is_part_data_available(tree, payload),
    }
}

/// Two children whose second matches the `protocol` parameter. Without a protocol the
/// structure is still accepted when the signed content was never downloaded.
pub fn is_part_multipart_signed(tree: &PartTree, part: PartId) -> bool {
    if !tree.is_mime_type(part, MULTIPART_SIGNED) {
        return false;
    }
    let Some(multipart) = tree.multipart(part) else {
        return false;
    };
    if multipart.count() != 2 {
        return false;
    }
    let (content, signature) = (multipart.parts()[0], multipart.parts()[1]);
    match protocol_parameter(tree, part) {
        Some(protocol) => is_same_mime_type(&tree.mime_type(signature), &protocol),
        None => !is_part_data_available(tree, content),
    }
}

pub fn is_multipart_encrypted_openpgp_protocol(tree: &PartTree, part: PartId) -> bool {
    protocol_parameter(tree, part).is_some_and(|p| p.eq_ignore_ascii_case(APPLICATION_PGP_ENCRYPTED))
}

pub fn is_multipart_signed_openpgp_protocol(tree: &PartTree, part: PartId) -> bool {
    protocol_parameter(tree, part).is_some_and(|p| p.eq_ignore_ascii_case(APPLICATION_PGP_SIGNATURE))
}

pub fn is_part_pgp_inline_encrypted_or_signed(tree: &PartTree, part: PartId) -> bool {
    inline_text_start(tree, part)
        .is_some_and(|t| t.starts_with(PGP_INLINE_START_MARKER) || t.starts_with(PGP_INLINE_SIGNED_START_MARKER))
}

pub fn is_part_pgp_inline_encrypted(tree: &PartTree, part: PartId) -> bool {
    inline_text_start(tree, part).is_some_and(|t| t.starts_with(PGP_INLINE_START_MARKER))
}

fn inline_text_start(tree: &PartTree, part: PartId) -> Option<String> {
    if !tree.is_mime_type(part, TEXT_PLAIN) && !tree.is_mime_type(part, APPLICATION_PGP) {
        return None;
    }
    let text = get_text_from_part(tree, part)?;
    let head: String = text.chars().take(TEXT_LENGTH_FOR_INLINE_CHECK).collect();
    let head = head.trim();
    if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

/// Signed text of a PGP/INLINE clearsigned message, with dash-escaping removed.
pub fn extract_clearsigned_text(text: &str) -> Option<String> {
    let start = text.find(PGP_INLINE_SIGNED_START_MARKER)?;
    let armored = &text[start..];
    let body_start = match armored.find("\r\n\r\n") {
        Some(i) => i + 4,
        None => armored.find("\n\n")? + 2,
    };
    let body = &armored[body_start..];
    let end = body.find(PGP_SIGNATURE_START_MARKER).unwrap_or(body.len());
    let signed = body[..end].trim_end_matches(['\r', '\n']);
    let lines: Vec<&str> = signed
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            line.strip_prefix("- ").unwrap_or(line)
        })
        .collect();
    Some(lines.join("\r\n"))
}

/// Whether the body of `part` was downloaded and can be read.
pub fn is_part_data_available(tree: &PartTree, part: PartId) -> bool {
    if let PartStorage::Local { size: 0, .. } = tree.storage(part) {
        return false;
    }
    tree.body(part).is_some_and(Body::is_available)
}

fn protocol_parameter(tree: &PartTree, part: PartId) -> Option<String> {
    tree.content_type(part)
        .and_then(|ct| ct.get_parameter(PROTOCOL_PARAMETER).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::annotation::{CryptoError, CryptoResultAnnotation};
    use crate::mime::{Multipart, PartTree};

    fn encrypted_message() -> &'static [u8] {
        b"Content-Type: multipart/encrypted; protocol=\"application/pgp-encrypted\"; boundary=b\r\n\r\n--b\r\nContent-Type: application/pgp-encrypted\r\n\r\nVersion: 1\r\n--b\r\nContent-Type: application/octet-stream\r\n\r\n-----BEGIN PGP MESSAGE-----\r\n-----END PGP MESSAGE-----\r\n--b--\r\n"
    }

    #[test]
    fn root_encrypted_part_is_primary() {
        let tree = PartTree::parse(encrypted_message()).unwrap();
        let mut extra = Vec::new();
        let primary = find_primary_encrypted_or_signed_part(&tree, tree.root(), &mut extra);
        assert_eq!(primary, Some(tree.root()));
        assert!(extra.is_empty());
        assert!(is_multipart_encrypted_openpgp_protocol(&tree, tree.root()));
        assert_eq!(find_multipart_encrypted_parts(&tree, tree.root()), vec![tree.root()]);
    }

    #[test]
    fn mixed_collects_extra_parts() {
        let msg = b"Content-Type: multipart/mixed; boundary=m\r\n\r\n--m\r\nContent-Type: multipart/signed; protocol=\"application/pgp-signature\"; boundary=s\r\n\r\n--s\r\nContent-Type: text/plain\r\n\r\nsigned\r\n--s\r\nContent-Type: application/pgp-signature\r\n\r\nc2ln\r\n--s--\r\n--m\r\nContent-Type: text/plain\r\n\r\nfooter\r\n--m--\r\n";
        let tree = PartTree::parse(msg).unwrap();
        let children = tree.children(tree.root());
        let mut extra = Vec::new();
        let primary = find_primary_encrypted_or_signed_part(&tree, tree.root(), &mut extra);
        assert_eq!(primary, Some(children[0]));
        assert_eq!(extra, vec![children[1]]);
        assert!(is_multipart_signed_openpgp_protocol(&tree, children[0]));
        assert_eq!(
            signature_data(&tree, children[0]).unwrap().as_deref(),
            Some(&b"c2ln"[..])
        );
    }

    #[test]
    fn inline_markers() {
        let tree = PartTree::parse(b"Content-Type: text/plain\r\n\r\n -----BEGIN PGP SIGNED MESSAGE-----\r\nHash: SHA256\r\n").unwrap();
        assert!(is_part_pgp_inline_encrypted_or_signed(&tree, tree.root()));
        assert!(!is_part_pgp_inline_encrypted(&tree, tree.root()));
        assert_eq!(find_pgp_inline_parts(&tree, tree.root()), vec![tree.root()]);

        let html = PartTree::parse(b"Content-Type: text/html\r\n\r\n-----BEGIN PGP MESSAGE-----\r\n").unwrap();
        assert!(!is_part_pgp_inline_encrypted_or_signed(&html, html.root()));
    }

    #[test]
    fn missing_protocol_accepted_when_payload_missing() {
        let mut tree = PartTree::new_message();
        let root = tree.root();
        tree.set_body(root, Body::Multipart(Multipart::with_boundary("encrypted", "b")));
        let control = tree.new_body_part(Body::text("Version: 1"), "application/pgp-encrypted");
        let payload = tree.new_part();
        tree.header_mut(payload).set("Content-Type", "application/octet-stream");
        tree.add_part(root, control).unwrap();
        tree.add_part(root, payload).unwrap();
        assert!(is_part_multipart_encrypted(&tree, root));
        assert!(!is_part_data_available(&tree, payload));
    }

    #[test]
    fn signed_search_follows_replacements() {
        let mut tree = PartTree::parse(encrypted_message()).unwrap();
        let decrypted = PartTree::parse(b"Content-Type: multipart/signed; protocol=\"application/pgp-signature\"; boundary=s\r\n\r\n--s\r\nContent-Type: text/plain\r\n\r\ninner\r\n--s\r\nContent-Type: application/pgp-signature\r\n\r\nsig\r\n--s--\r\n").unwrap();
        let replacement = tree.graft(decrypted);

        let mut annotations = MessageCryptoAnnotations::new();
        assert!(find_multipart_signed_parts(&tree, tree.root(), &annotations).is_empty());
        annotations.put(tree.root(), CryptoResultAnnotation::success(None, None, Some(replacement)));
        assert_eq!(find_multipart_signed_parts(&tree, tree.root(), &annotations), vec![replacement]);

        annotations.put(tree.root(), CryptoResultAnnotation::error(CryptoError::OpenPgpUiCanceled, None));
        assert!(find_multipart_signed_parts(&tree, tree.root(), &annotations).is_empty());
    }

    #[test]
    fn clearsigned_text() {
        let text = "-----BEGIN PGP SIGNED MESSAGE-----\r\nHash: SHA256\r\n\r\nHello\r\n- -- not a signature\r\n-----BEGIN PGP SIGNATURE-----\r\nabc\r\n-----END PGP SIGNATURE-----\r\n";
        assert_eq!(extract_clearsigned_text(text).as_deref(), Some("Hello\r\n-- not a signature"));
        assert_eq!(extract_clearsigned_text("plain"), None);
    }
}
