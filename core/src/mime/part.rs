/*
 * part.rs
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

//! MIME part tree: an arena of parts addressed by [`PartId`].
//!
//! Parent links are indices into the arena, so a tree is freely movable and has no
//! ownership cycles. Nested messages and decrypted replacement parts live in the same arena,
//! which lets annotations keyed by `PartId` cover both.

use rand::Rng;

use crate::mime::body::{Body, BodyFactory, TransferEncoding};
use crate::mime::builder::TreeBuilder;
use crate::mime::content_disposition::{parse_content_disposition, ContentDisposition};
use crate::mime::content_type::{parse_content_type, ContentType};
use crate::mime::header::Header;
use crate::mime::parameter::{format_parameter, get_header_parameter};
use crate::mime::parser::MimeParser;
use crate::store::MessagingError;

const BOUNDARY_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Identity of a part within its [`PartTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(usize);

impl PartId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a part's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartStorage {
    #[default]
    Memory,
    /// Backed by persisted storage; `size` 0 means the content was never downloaded.
    Local { part_id: u64, size: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct Part {
    header: Header,
    body: Option<Body>,
    parent: Option<PartId>,
    storage: PartStorage,
}

impl Part {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Part whose body contains this one.
    pub fn parent(&self) -> Option<PartId> {
        self.parent
    }

    pub fn storage(&self) -> PartStorage {
        self.storage
    }
}

/// Body of a `multipart/*` part.
#[derive(Debug, Clone)]
pub struct Multipart {
    subtype: String,
    boundary: String,
    preamble: Option<Vec<u8>>,
    epilogue: Option<Vec<u8>>,
    parts: Vec<PartId>,
    parent: Option<PartId>,
}

impl Multipart {
    /// New multipart with a random boundary.
    pub fn new(subtype: impl Into<String>) -> Self {
        Self::with_boundary(subtype, generate_boundary())
    }

    pub fn with_boundary(subtype: impl Into<String>, boundary: impl Into<String>) -> Self {
        Self {
            subtype: subtype.into().to_ascii_lowercase(),
            boundary: boundary.into(),
            preamble: None,
            epilogue: None,
            parts: Vec::new(),
            parent: None,
        }
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn mime_type(&self) -> String {
        format!("multipart/{}", self.subtype)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn preamble(&self) -> Option<&[u8]> {
        self.preamble.as_deref()
    }

    pub fn set_preamble(&mut self, preamble: Option<Vec<u8>>) {
        self.preamble = preamble;
    }

    pub fn epilogue(&self) -> Option<&[u8]> {
        self.epilogue.as_deref()
    }

    pub fn set_epilogue(&mut self, epilogue: Option<Vec<u8>>) {
        self.epilogue = epilogue;
    }

    pub(crate) fn append_preamble(&mut self, data: &[u8]) {
        self.preamble.get_or_insert_with(Vec::new).extend_from_slice(data);
    }

    pub(crate) fn append_epilogue(&mut self, data: &[u8]) {
        self.epilogue.get_or_insert_with(Vec::new).extend_from_slice(data);
    }

    pub fn parts(&self) -> &[PartId] {
        &self.parts
    }

    pub fn count(&self) -> usize {
        self.parts.len()
    }

    pub fn body_part(&self, index: usize) -> Option<PartId> {
        self.parts.get(index).copied()
    }

    /// Part whose body this is.
    pub fn parent(&self) -> Option<PartId> {
        self.parent
    }

    pub(crate) fn push(&mut self, part: PartId) {
        self.parts.push(part);
    }
}

/// `----` followed by 30 random characters.
pub fn generate_boundary() -> String {
    let mut rng = rand::thread_rng();
    let mut boundary = String::from("----");
    for _ in 0..30 {
        boundary.push(BOUNDARY_CHARS[rng.gen_range(0..BOUNDARY_CHARS.len())] as char);
    }
    boundary
}

/// Arena of MIME parts with one root (the message).
#[derive(Debug, Clone)]
pub struct PartTree {
    parts: Vec<Part>,
    root: PartId,
}

impl PartTree {
    pub(crate) fn empty() -> Self {
        Self {
            parts: vec![Part::default()],
            root: PartId(0),
        }
    }

    /// New message with only a `MIME-Version` header.
    pub fn new_message() -> Self {
        let mut tree = Self::empty();
        tree.header_mut(tree.root).set("MIME-Version", "1.0");
        tree
    }

    /// Parse a message held in memory.
    pub fn parse(data: &[u8]) -> Result<Self, MessagingError> {
        Self::parse_with(data, &BodyFactory::default())
    }

    /// Parse a message, letting `factory` decide where leaf bodies are stored.
    pub fn parse_with(data: &[u8], factory: &BodyFactory) -> Result<Self, MessagingError> {
        let mut parser = MimeParser::new(TreeBuilder::new(factory));
        parser.receive(data)?;
        parser.close()?;
        Ok(parser.into_inner().finish())
    }

    pub fn root(&self) -> PartId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn part(&self, id: PartId) -> &Part {
        &self.parts[id.0]
    }

    /// Add a part with no header, body or parent.
    pub fn new_part(&mut self) -> PartId {
        self.parts.push(Part::default());
        PartId(self.parts.len() - 1)
    }

    /// Add a part holding `body`, typed `mime_type`.
    pub fn new_body_part(&mut self, body: Body, mime_type: &str) -> PartId {
        let id = self.new_part();
        self.header_mut(id).set("Content-Type", mime_type);
        self.set_body(id, body);
        id
    }

    pub fn header(&self, id: PartId) -> &Header {
        &self.parts[id.0].header
    }

    pub fn header_mut(&mut self, id: PartId) -> &mut Header {
        &mut self.parts[id.0].header
    }

    pub fn body(&self, id: PartId) -> Option<&Body> {
        self.parts[id.0].body.as_ref()
    }

    pub fn body_mut(&mut self, id: PartId) -> Option<&mut Body> {
        self.parts[id.0].body.as_mut()
    }

    pub fn parent(&self, id: PartId) -> Option<PartId> {
        self.parts[id.0].parent
    }

    pub fn storage(&self, id: PartId) -> PartStorage {
        self.parts[id.0].storage
    }

    pub fn set_storage(&mut self, id: PartId, storage: PartStorage) {
        self.parts[id.0].storage = storage;
    }

    /// Set the body and bring the header in line with it.
    ///
    /// A multipart body gets a `Content-Type` carrying its boundary and `7bit` encoding. A
    /// text body on a `text/*` (or untyped) part gets `charset=utf-8`. Leaf bodies set the
    /// `Content-Transfer-Encoding` they will be written with.
    pub fn set_body(&mut self, id: PartId, body: Body) {
        match &body {
            Body::Multipart(m) => {
                let value = format!("{}; boundary=\"{}\"", m.mime_type(), m.boundary());
                for &child in m.parts() {
                    self.parts[child.0].parent = Some(id);
                }
                let header = self.header_mut(id);
                header.set("Content-Type", value);
                header.set("Content-Transfer-Encoding", TransferEncoding::SevenBit.as_str());
            }
            Body::Text(t) => {
                let encoding = t.encoding();
                let content_type = self.header(id).first("Content-Type").map(|v| v.to_string());
                let mime_type = content_type
                    .as_deref()
                    .and_then(|v| get_header_parameter(v, None))
                    .map(|m| m.to_ascii_lowercase())
                    .unwrap_or_else(|| "text/plain".to_string());
                let header = self.header_mut(id);
                if mime_type.starts_with("text/") {
                    let name = content_type.as_deref().and_then(|v| get_header_parameter(v, Some("name")));
                    let value = match name {
                        Some(name) => format!("{}; charset=utf-8; {}", mime_type, format_parameter("name", &name)),
                        None => format!("{}; charset=utf-8", mime_type),
                    };
                    header.set("Content-Type", value);
                }
                header.set("Content-Transfer-Encoding", encoding.as_str());
            }
            Body::Binary(b) => {
                let encoding = b.encoding();
                self.header_mut(id).set("Content-Transfer-Encoding", encoding.as_str());
            }
            Body::Message(child) => {
                self.parts[child.0].parent = Some(id);
            }
        }
        let mut body = body;
        if let Body::Multipart(m) = &mut body {
            m.parent = Some(id);
        }
        self.parts[id.0].body = Some(body);
    }

    /// Attach a body without touching the header (parsed parts keep their headers as read).
    pub(crate) fn attach_body(&mut self, id: PartId, mut body: Body) {
        match &mut body {
            Body::Multipart(m) => m.parent = Some(id),
            Body::Message(child) => self.parts[child.0].parent = Some(id),
            _ => {}
        }
        self.parts[id.0].body = Some(body);
    }

    /// Re-encode a leaf body and update its `Content-Transfer-Encoding`.
    pub fn set_encoding(&mut self, id: PartId, encoding: TransferEncoding) -> Result<(), MessagingError> {
        match self.parts[id.0].body.as_mut() {
            Some(Body::Text(t)) => t.set_encoding(encoding),
            Some(Body::Binary(b)) => b.set_encoding(encoding)?,
            Some(_) if encoding.is_encoding() => {
                return Err(MessagingError::Structure(format!(
                    "container parts cannot be {} encoded",
                    encoding
                )))
            }
            _ => {}
        }
        self.header_mut(id).set("Content-Transfer-Encoding", encoding.as_str());
        Ok(())
    }

    /// Append `child` to the multipart body of `owner`.
    pub fn add_part(&mut self, owner: PartId, child: PartId) -> Result<(), MessagingError> {
        match self.parts[owner.0].body.as_mut() {
            Some(Body::Multipart(m)) => m.push(child),
            _ => return Err(MessagingError::Structure("body is not a multipart".to_string())),
        }
        self.parts[child.0].parent = Some(owner);
        Ok(())
    }

    /// Direct children: multipart members or the nested message.
    pub fn children(&self, id: PartId) -> Vec<PartId> {
        match self.body(id) {
            Some(Body::Multipart(m)) => m.parts().to_vec(),
            Some(Body::Message(child)) => vec![*child],
            _ => Vec::new(),
        }
    }

    pub fn multipart(&self, id: PartId) -> Option<&Multipart> {
        match self.body(id) {
            Some(Body::Multipart(m)) => Some(m),
            _ => None,
        }
    }

    /// `id` and everything below it, pre-order.
    pub fn descendants(&self, id: PartId) -> Vec<PartId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    pub fn content_type(&self, id: PartId) -> Option<ContentType> {
        self.header(id)
            .first_unfolded("Content-Type")
            .and_then(|v| parse_content_type(&v))
    }

    /// Effective MIME type, lowercased. Without a usable `Content-Type` this is
    /// `message/rfc822` inside `multipart/digest` and `text/plain` elsewhere.
    pub fn mime_type(&self, id: PartId) -> String {
        if let Some(ct) = self.content_type(id) {
            return ct.mime_type();
        }
        let in_digest = self
            .parent(id)
            .and_then(|p| self.multipart(p))
            .is_some_and(|m| m.subtype() == "digest");
        if in_digest {
            "message/rfc822".to_string()
        } else {
            "text/plain".to_string()
        }
    }

    /// Compare the effective MIME type with `mime_type`, which may end in `/*`.
    pub fn is_mime_type(&self, id: PartId, mime_type: &str) -> bool {
        is_same_mime_type(&self.mime_type(id), mime_type)
    }

    pub fn disposition(&self, id: PartId) -> Option<ContentDisposition> {
        self.header(id)
            .first_unfolded("Content-Disposition")
            .and_then(|v| parse_content_disposition(&v))
    }

    /// Content-ID without angle brackets.
    pub fn content_id(&self, id: PartId) -> Option<String> {
        let value = self.header(id).first_unfolded("Content-ID")?;
        let trimmed = value.trim().trim_start_matches('<').trim_end_matches('>').trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Whether every leaf at or below `id` has content that can be read.
    pub fn is_complete_part_available(&self, id: PartId) -> bool {
        self.descendants(id).into_iter().all(|p| {
            if let PartStorage::Local { size: 0, .. } = self.storage(p) {
                return false;
            }
            match self.body(p) {
                None => false,
                Some(body) => body.is_available(),
            }
        })
    }

    /// Move every part of `other` into this arena. Returns the new id of its root, which
    /// has no parent until it is attached.
    pub fn graft(&mut self, other: PartTree) -> PartId {
        let offset = self.parts.len();
        let remap = |id: PartId| PartId(id.0 + offset);
        let new_root = remap(other.root);
        for mut part in other.parts {
            part.parent = part.parent.map(remap);
            match part.body.as_mut() {
                Some(Body::Multipart(m)) => {
                    m.parent = m.parent.map(remap);
                    for child in m.parts.iter_mut() {
                        *child = remap(*child);
                    }
                }
                Some(Body::Message(child)) => *child = remap(*child),
                _ => {}
            }
            self.parts.push(part);
        }
        new_root
    }

    /// Drop every part from index `len` on, provided no part before it refers to one of
    /// them. Returns false, leaving the tree as it was, when such a reference exists.
    pub fn truncate_detached(&mut self, len: usize) -> bool {
        if len >= self.parts.len() {
            return true;
        }
        let beyond = |id: &PartId| id.0 >= len;
        let referenced = self.root.0 >= len
            || self.parts[..len].iter().any(|p| {
                p.parent.as_ref().is_some_and(beyond)
                    || match &p.body {
                        Some(Body::Multipart(m)) => m.parts.iter().any(beyond) || m.parent.as_ref().is_some_and(beyond),
                        Some(Body::Message(child)) => beyond(child),
                        _ => false,
                    }
            });
        if referenced {
            return false;
        }
        self.parts.truncate(len);
        true
    }

    /// Copy the subtree at `id` into a tree of its own.
    pub fn extract_subtree(&self, id: PartId) -> PartTree {
        let mut tree = PartTree {
            parts: Vec::new(),
            root: PartId(0),
        };
        tree.copy_from(self, id, None);
        tree
    }

    fn copy_from(&mut self, source: &PartTree, id: PartId, parent: Option<PartId>) -> PartId {
        let new_id = PartId(self.parts.len());
        let original = source.part(id);
        self.parts.push(Part {
            header: original.header.clone(),
            body: None,
            parent,
            storage: original.storage,
        });
        let body = match original.body.as_ref() {
            Some(Body::Multipart(m)) => {
                let mut copy = m.clone();
                copy.parent = Some(new_id);
                copy.parts = m
                    .parts
                    .iter()
                    .map(|&child| self.copy_from(source, child, Some(new_id)))
                    .collect();
                Some(Body::Multipart(copy))
            }
            Some(Body::Message(child)) => Some(Body::Message(self.copy_from(source, *child, Some(new_id)))),
            other => other.cloned(),
        };
        self.parts[new_id.0].body = body;
        new_id
    }
}

/// Case-insensitive MIME type comparison; `pattern` may be `type/*`.
pub fn is_same_mime_type(mime_type: &str, pattern: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(primary) => mime_type
            .split('/')
            .next()
            .is_some_and(|p| p.eq_ignore_ascii_case(primary)),
        None => mime_type.eq_ignore_ascii_case(pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::body::{BinaryBody, TextBody};

    #[test]
    fn composed_multipart_headers() {
        let mut tree = PartTree::new_message();
        let root = tree.root();
        let text = tree.new_body_part(Body::text("hello"), "text/plain");
        let multipart = Multipart::new("mixed");
        let boundary = multipart.boundary().to_string();
        tree.set_body(root, Body::Multipart(multipart));
        tree.add_part(root, text).unwrap();

        assert_eq!(boundary.len(), 34);
        assert_eq!(tree.mime_type(root), "multipart/mixed");
        assert_eq!(tree.content_type(root).unwrap().get_parameter("boundary"), Some(boundary.as_str()));
        assert_eq!(tree.header(root).first("Content-Transfer-Encoding"), Some("7bit"));
        assert_eq!(tree.header(text).first("Content-Type"), Some("text/plain; charset=utf-8"));
        assert_eq!(tree.header(text).first("Content-Transfer-Encoding"), Some("quoted-printable"));
        assert_eq!(tree.parent(text), Some(root));
        assert_eq!(tree.children(root), vec![text]);
        assert!(tree.add_part(text, root).is_err());
    }

    #[test]
    fn text_body_keeps_non_text_type() {
        let mut tree = PartTree::new_message();
        let part = tree.new_body_part(Body::Text(TextBody::new("{}")), "application/json");
        assert_eq!(tree.header(part).first("Content-Type"), Some("application/json"));
    }

    #[test]
    fn default_mime_type_depends_on_parent() {
        let mut tree = PartTree::new_message();
        let root = tree.root();
        let digest = Multipart::new("digest");
        tree.set_body(root, Body::Multipart(digest));
        let child = tree.new_part();
        tree.add_part(root, child).unwrap();
        assert_eq!(tree.mime_type(child), "message/rfc822");
        let orphan = tree.new_part();
        assert_eq!(tree.mime_type(orphan), "text/plain");
        assert!(tree.is_mime_type(root, "multipart/*"));
    }

    #[test]
    fn graft_remaps_ids() {
        let mut other = PartTree::new_message();
        let other_root = other.root();
        other.set_body(other_root, Body::Multipart(Multipart::new("alternative")));
        let leaf = other.new_body_part(Body::text("x"), "text/plain");
        other.add_part(other_root, leaf).unwrap();

        let mut tree = PartTree::new_message();
        let grafted = tree.graft(other);
        let children = tree.children(grafted);
        assert_eq!(children.len(), 1);
        assert_eq!(tree.parent(children[0]), Some(grafted));
        assert_eq!(tree.parent(grafted), None);
        assert_eq!(tree.multipart(grafted).unwrap().parent(), Some(grafted));
    }

    #[test]
    fn completeness_follows_storage() {
        let mut tree = PartTree::new_message();
        let root = tree.root();
        tree.set_body(root, Body::Binary(BinaryBody::memory(&b"data"[..], TransferEncoding::Base64)));
        assert!(tree.is_complete_part_available(root));
        tree.set_storage(root, PartStorage::Local { part_id: 9, size: 0 });
        assert!(!tree.is_complete_part_available(root));
        let empty = tree.new_part();
        assert!(!tree.is_complete_part_available(empty));
    }

    #[test]
    fn content_id_strips_brackets() {
        let mut tree = PartTree::new_message();
        let root = tree.root();
        tree.header_mut(root).set("Content-ID", " <image1@example.com>");
        assert_eq!(tree.content_id(root).as_deref(), Some("image1@example.com"));
    }

    #[test]
    fn detached_tail_is_released() {
        let mut tree = PartTree::new_message();
        let root = tree.root();
        tree.set_body(root, Body::Multipart(Multipart::new("mixed")));
        let mark = tree.len();
        let loose = tree.graft(PartTree::parse(b"Content-Type: text/plain\r\n\r\nx").unwrap());
        assert_eq!(tree.len(), mark + 1);
        assert!(tree.truncate_detached(mark));
        assert_eq!(tree.len(), mark);

        let loose_again = tree.graft(PartTree::parse(b"Content-Type: text/plain\r\n\r\nx").unwrap());
        assert_eq!(loose_again, loose);
        tree.add_part(root, loose_again).unwrap();
        assert!(!tree.truncate_detached(mark));
        assert_eq!(tree.len(), mark + 1);
    }
}
