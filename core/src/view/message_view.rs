/*
 * message_view.rs
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

//! Assembling what is shown for one message.

use tracing::{debug, warn};

use crate::crypto::{
    find_primary_encrypted_or_signed_part, is_multipart_encrypted_openpgp_protocol, is_part_multipart_encrypted,
    is_part_pgp_inline_encrypted, CryptoError, CryptoResultAnnotation, MessageCryptoAnnotations,
};
use crate::mime::{unfold_and_decode, PartId, PartTree};
use crate::view::attachment::AttachmentViewInfo;
use crate::view::extractor::extract_viewables_and_attachments;

/// Rendering options that come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub openpgp_provider_configured: bool,
    pub prefer_html: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            openpgp_provider_configured: false,
            prefer_html: true,
        }
    }
}

/// Everything the UI shows for a message.
///
/// `text`, `html` and `attachments` are None when the content cannot be rendered at all;
/// the annotation then says why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageViewInfo {
    pub message: PartId,
    pub is_message_incomplete: bool,
    /// Part the content was taken from. A decrypted replacement when there is one.
    pub root_part: PartId,
    pub subject: Option<String>,
    pub is_subject_encrypted: bool,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Option<Vec<AttachmentViewInfo>>,
    pub crypto_result_annotation: Option<CryptoResultAnnotation>,
    /// Content outside the signed or encrypted part.
    pub extra_text: Option<String>,
    pub extra_html: Option<String>,
    pub extra_attachments: Option<Vec<AttachmentViewInfo>>,
}

impl MessageViewInfo {
    pub fn create_with_error_state(tree: &PartTree, root_part: PartId, annotation: CryptoResultAnnotation) -> Self {
        let message = tree.root();
        Self {
            message,
            is_message_incomplete: !tree.is_complete_part_available(message),
            root_part,
            subject: tree.header(message).first_decoded("Subject"),
            is_subject_encrypted: false,
            text: None,
            html: None,
            attachments: None,
            crypto_result_annotation: Some(annotation),
            extra_text: None,
            extra_html: None,
            extra_attachments: None,
        }
    }
}

/// Build the view of the message in `tree`.
///
/// When the message is signed or encrypted, its content comes from the replacement
/// recorded in `annotations` for the primary crypto part, and parts next to that part are
/// rendered separately as extra content. An OpenPGP encrypted message that could not be
/// processed because no provider is configured (or nothing was processed at all) yields an
/// error state with [`CryptoError::OpenPgpEncryptedNoProvider`].
pub fn extract_message_for_view(
    tree: &PartTree,
    annotations: Option<&MessageCryptoAnnotations>,
    options: &ViewOptions,
) -> MessageViewInfo {
    let message = tree.root();
    let mut extra_parts = Vec::new();
    let Some(crypto_part) = find_primary_encrypted_or_signed_part(tree, message, &mut extra_parts) else {
        if annotations.is_some_and(|a| !a.is_empty()) {
            warn!("crypto annotations given for a message without crypto part");
        }
        return extract_simple_message_for_view(tree, message, options);
    };

    let is_openpgp_encrypted = (is_part_multipart_encrypted(tree, crypto_part)
        && is_multipart_encrypted_openpgp_protocol(tree, crypto_part))
        || is_part_pgp_inline_encrypted(tree, crypto_part);
    if is_openpgp_encrypted && (!options.openpgp_provider_configured || annotations.is_none()) {
        debug!(part = crypto_part.index(), "encrypted message without provider");
        return MessageViewInfo::create_with_error_state(
            tree,
            crypto_part,
            CryptoResultAnnotation::error(CryptoError::OpenPgpEncryptedNoProvider, None),
        );
    }

    match annotations.and_then(|a| a.get(crypto_part)) {
        Some(annotation) => extract_crypto_message_for_view(tree, &extra_parts, crypto_part, annotation, options),
        None => extract_simple_message_for_view(tree, message, options),
    }
}

fn extract_crypto_message_for_view(
    tree: &PartTree,
    extra_parts: &[PartId],
    crypto_part: PartId,
    annotation: &CryptoResultAnnotation,
    options: &ViewOptions,
) -> MessageViewInfo {
    let content_part = annotation.replacement.unwrap_or(crypto_part);
    let (extra, extra_attachments) = extract_viewables_and_attachments(tree, extra_parts, options.prefer_html);
    let mut info = extract_simple_message_for_view(tree, content_part, options);
    info.crypto_result_annotation = Some(annotation.clone());
    info.extra_text = Some(extra.text);
    info.extra_html = Some(extra.html);
    info.extra_attachments = Some(extra_attachments);
    info
}

fn extract_simple_message_for_view(tree: &PartTree, content_part: PartId, options: &ViewOptions) -> MessageViewInfo {
    let message = tree.root();
    let (extracted, attachments) = extract_viewables_and_attachments(tree, &[content_part], options.prefer_html);
    let (subject, is_subject_encrypted) = match protected_subject(tree, content_part) {
        Some(subject) => (Some(subject), true),
        None => (tree.header(message).first_decoded("Subject"), false),
    };
    MessageViewInfo {
        message,
        is_message_incomplete: !tree.is_complete_part_available(message),
        root_part: content_part,
        subject,
        is_subject_encrypted,
        text: Some(extracted.text),
        html: Some(extracted.html),
        attachments: Some(attachments),
        crypto_result_annotation: None,
        extra_text: None,
        extra_html: None,
        extra_attachments: None,
    }
}

/// Subject carried inside the content part under `protected-headers=v1`.
fn protected_subject(tree: &PartTree, content_part: PartId) -> Option<String> {
    if content_part == tree.root() {
        return None;
    }
    let protected = tree
        .content_type(content_part)
        .and_then(|ct| ct.get_parameter("protected-headers").map(str::to_string))
        .is_some_and(|v| v.eq_ignore_ascii_case("v1"));
    if !protected {
        return None;
    }
    tree.header(content_part)
        .first("Subject")
        .map(unfold_and_decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoResultAnnotation;

    #[test]
    fn simple_message() {
        let tree = PartTree::parse(b"Subject: =?utf-8?Q?caf=C3=A9?=\r\nContent-Type: text/plain\r\n\r\nhello").unwrap();
        let info = extract_message_for_view(&tree, None, &ViewOptions::default());
        assert_eq!(info.subject.as_deref(), Some("café"));
        assert!(!info.is_subject_encrypted);
        assert_eq!(info.text.as_deref(), Some("hello"));
        assert_eq!(info.root_part, tree.root());
        assert!(info.crypto_result_annotation.is_none());
        assert!(!info.is_message_incomplete);
    }

    #[test]
    fn replacement_with_protected_subject() {
        let mut tree = PartTree::parse(b"Subject: ...\r\nContent-Type: multipart/encrypted; protocol=\"application/pgp-encrypted\"; boundary=b\r\n\r\n--b\r\nContent-Type: application/pgp-encrypted\r\n\r\nVersion: 1\r\n--b\r\nContent-Type: application/octet-stream\r\n\r\nciphertext\r\n--b--\r\n").unwrap();
        let decrypted = PartTree::parse(b"Content-Type: text/plain; protected-headers=v1\r\nSubject: the real subject\r\n\r\nsecret").unwrap();
        let replacement = tree.graft(decrypted);
        let mut annotations = MessageCryptoAnnotations::new();
        annotations.put(tree.root(), CryptoResultAnnotation::success(None, None, Some(replacement)));

        let options = ViewOptions {
            openpgp_provider_configured: true,
            prefer_html: true,
        };
        let info = extract_message_for_view(&tree, Some(&annotations), &options);
        assert_eq!(info.root_part, replacement);
        assert_eq!(info.text.as_deref(), Some("secret"));
        assert_eq!(info.subject.as_deref(), Some("the real subject"));
        assert!(info.is_subject_encrypted);
        assert_eq!(info.crypto_result_annotation.map(|a| a.error_type()), Some(CryptoError::OpenPgpOk));
        assert_eq!(info.extra_text.as_deref(), Some(""));
    }
}
