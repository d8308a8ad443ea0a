/*
 * attachment.rs
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

//! Attachment descriptors.

use crate::crypto::is_part_data_available;
use crate::mime::{get_header_parameter, unfold_and_decode, Body, PartId, PartStorage, PartTree};

const EXTENSIONS_BY_MIME_TYPE: &[(&str, &str)] = &[
    ("application/gzip", "gz"),
    ("application/msword", "doc"),
    ("application/pdf", "pdf"),
    ("application/pgp-keys", "asc"),
    ("application/pgp-signature", "asc"),
    ("application/rtf", "rtf"),
    ("application/vnd.ms-excel", "xls"),
    ("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", "xlsx"),
    ("application/vnd.openxmlformats-officedocument.wordprocessingml.document", "docx"),
    ("application/zip", "zip"),
    ("audio/mpeg", "mp3"),
    ("audio/ogg", "ogg"),
    ("image/bmp", "bmp"),
    ("image/gif", "gif"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/svg+xml", "svg"),
    ("image/webp", "webp"),
    ("message/rfc822", "eml"),
    ("text/calendar", "ics"),
    ("text/csv", "csv"),
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("text/x-vcard", "vcf"),
    ("text/vcard", "vcf"),
    ("video/mp4", "mp4"),
    ("video/mpeg", "mpeg"),
];

/// File name extension usually used for `mime_type`.
pub fn extension_for_mime_type(mime_type: &str) -> Option<&'static str> {
    EXTENSIONS_BY_MIME_TYPE
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(mime_type))
        .map(|(_, ext)| *ext)
}

/// What the UI needs to list one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentViewInfo {
    pub mime_type: String,
    pub display_name: String,
    /// None when the size is not known.
    pub size: Option<u64>,
    pub part: PartId,
    /// Image referenced from HTML by Content-ID rather than a real attachment.
    pub inline_attachment: bool,
    pub content_available: bool,
}

impl AttachmentViewInfo {
    pub fn from_part(tree: &PartTree, part: PartId) -> Self {
        let mime_type = tree.mime_type(part);
        let disposition = tree.header(part).first("Content-Disposition").map(unfold_and_decode);
        let content_type = tree.header(part).first("Content-Type").map(unfold_and_decode);

        let display_name = disposition
            .as_deref()
            .and_then(|d| get_header_parameter(d, Some("filename")))
            .or_else(|| content_type.as_deref().and_then(|c| get_header_parameter(c, Some("name"))))
            .unwrap_or_else(|| match extension_for_mime_type(&mime_type) {
                Some(ext) => format!("noname.{}", ext),
                None => "noname".to_string(),
            });

        let is_attachment_disposition = tree.disposition(part).is_some_and(|d| d.is_attachment());
        let inline_attachment =
            mime_type.starts_with("image/") && tree.content_id(part).is_some() && !is_attachment_disposition;

        Self {
            size: attachment_size(tree, part),
            display_name,
            inline_attachment,
            content_available: is_part_data_available(tree, part),
            mime_type,
            part,
        }
    }
}

/// The `size` disposition parameter, else what is known about the stored content.
fn attachment_size(tree: &PartTree, part: PartId) -> Option<u64> {
    if let Some(size) = tree.disposition(part).and_then(|d| d.size()) {
        return Some(size);
    }
    if let PartStorage::Local { size, .. } = tree.storage(part) {
        return if size > 0 { Some(size) } else { None };
    }
    match tree.body(part)? {
        Body::Text(text) => Some(text.text().len() as u64),
        Body::Binary(binary) => binary.decoded_size().ok(),
        _ => None,
    }
}
