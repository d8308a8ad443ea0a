/*
 * builder.rs
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

//! Builds a [`PartTree`] from parser events.

use tracing::debug;

use crate::mime::body::{Body, BodyFactory, TransferEncoding};
use crate::mime::handler::{MimeHandler, MimeParseError};
use crate::mime::header::unfold;
use crate::mime::part::{Multipart, PartId, PartTree};

enum Container {
    Multipart(PartId),
    Message(PartId),
}

pub struct TreeBuilder<'f> {
    factory: &'f BodyFactory,
    tree: PartTree,
    started: bool,
    entities: Vec<PartId>,
    containers: Vec<Container>,
    content: Vec<u8>,
}

impl<'f> TreeBuilder<'f> {
    pub fn new(factory: &'f BodyFactory) -> Self {
        Self {
            factory,
            tree: PartTree::empty(),
            started: false,
            entities: Vec::new(),
            containers: Vec::new(),
            content: Vec::new(),
        }
    }

    pub fn finish(self) -> PartTree {
        self.tree
    }

    fn current(&self) -> Result<PartId, MimeParseError> {
        self.entities
            .last()
            .copied()
            .ok_or_else(|| MimeParseError::new("event outside of an entity"))
    }

    fn current_multipart(&mut self) -> Option<&mut Multipart> {
        let owner = match self.containers.last() {
            Some(Container::Multipart(owner)) => *owner,
            _ => return None,
        };
        match self.tree.body_mut(owner) {
            Some(Body::Multipart(m)) => Some(m),
            _ => None,
        }
    }
}

impl MimeHandler for TreeBuilder<'_> {
    fn start_entity(&mut self) -> Result<(), MimeParseError> {
        self.content.clear();
        if !self.started {
            self.started = true;
            self.entities.push(self.tree.root());
            return Ok(());
        }
        let id = self.tree.new_part();
        match self.containers.last() {
            Some(Container::Multipart(owner)) => {
                let owner = *owner;
                self.tree
                    .add_part(owner, id)
                    .map_err(|e| MimeParseError::new(e.to_string()))?;
            }
            Some(Container::Message(owner)) => {
                let owner = *owner;
                self.tree.attach_body(owner, Body::Message(id));
            }
            None => return Err(MimeParseError::new("nested entity outside of a container")),
        }
        self.entities.push(id);
        Ok(())
    }

    fn header(&mut self, name: &str, value: &str, raw: &[u8]) -> Result<(), MimeParseError> {
        let id = self.current()?;
        self.tree.header_mut(id).add_raw(name, value, raw);
        Ok(())
    }

    fn start_multipart(&mut self, boundary: &str) -> Result<(), MimeParseError> {
        let id = self.current()?;
        let subtype = self
            .tree
            .content_type(id)
            .map(|ct| ct.get_sub_type().to_string())
            .unwrap_or_else(|| "mixed".to_string());
        self.tree
            .attach_body(id, Body::Multipart(Multipart::with_boundary(subtype, boundary)));
        self.containers.push(Container::Multipart(id));
        Ok(())
    }

    fn preamble(&mut self, data: &[u8]) -> Result<(), MimeParseError> {
        if let Some(m) = self.current_multipart() {
            m.append_preamble(data);
        }
        Ok(())
    }

    fn epilogue(&mut self, data: &[u8]) -> Result<(), MimeParseError> {
        if let Some(m) = self.current_multipart() {
            m.append_epilogue(data);
        }
        Ok(())
    }

    fn end_multipart(&mut self) -> Result<(), MimeParseError> {
        self.containers.pop();
        Ok(())
    }

    fn start_message(&mut self) -> Result<(), MimeParseError> {
        let id = self.current()?;
        self.containers.push(Container::Message(id));
        Ok(())
    }

    fn end_message(&mut self) -> Result<(), MimeParseError> {
        self.containers.pop();
        Ok(())
    }

    fn body_content(&mut self, data: &[u8]) -> Result<(), MimeParseError> {
        self.content.extend_from_slice(data);
        Ok(())
    }

    fn end_entity(&mut self) -> Result<(), MimeParseError> {
        let id = self.current()?;
        self.entities.pop();
        if self.tree.body(id).is_some() {
            return Ok(());
        }
        let encoding = match self.tree.header(id).first("Content-Transfer-Encoding") {
            Some(value) => TransferEncoding::parse(&unfold(value)).unwrap_or_else(|| {
                debug!(value, "unknown transfer encoding; keeping content as is");
                TransferEncoding::Binary
            }),
            None => TransferEncoding::SevenBit,
        };
        let content = std::mem::take(&mut self.content);
        let body = self.factory.create_body(content, encoding)?;
        self.tree.attach_body(id, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::mime::body::{BinaryStorage, Body, TransferEncoding};
    use crate::mime::part::PartTree;

    #[test]
    fn builds_nested_structure() {
        let msg = b"Subject: outer\r\nContent-Type: multipart/mixed; boundary=o\r\n\r\npre\r\n--o\r\nContent-Type: text/plain\r\nContent-Transfer-Encoding: base64\r\n\r\naGk=\r\n--o\r\nContent-Type: message/rfc822\r\n\r\nSubject: inner\r\n\r\ninner text\r\n--o--\r\n";
        let tree = PartTree::parse(msg).unwrap();
        let root = tree.root();
        let multipart = tree.multipart(root).unwrap();
        assert_eq!(multipart.subtype(), "mixed");
        assert_eq!(multipart.preamble(), Some(&b"pre"[..]));
        assert_eq!(multipart.epilogue(), Some(&b"\r\n"[..]));

        let children = tree.children(root);
        assert_eq!(children.len(), 2);
        let text = tree.body(children[0]).unwrap();
        assert_eq!(text.encoding(), Some(TransferEncoding::Base64));
        assert_eq!(text.decoded_bytes().unwrap(), b"hi");

        let inner = tree.children(children[1]);
        assert_eq!(inner.len(), 1);
        assert_eq!(tree.parent(inner[0]), Some(children[1]));
        assert_eq!(tree.header(inner[0]).first("Subject"), Some("inner"));
        match tree.body(inner[0]) {
            Some(Body::Binary(b)) => {
                assert!(matches!(b.storage(), BinaryStorage::Raw(_)));
                assert_eq!(b.decoded_bytes().unwrap(), b"inner text");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }
}
