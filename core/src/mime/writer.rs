/*
 * writer.rs
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

//! Serialization of parts: header block, blank line, body in its transfer encoding.
//!
//! Parsed trees are reproduced byte for byte: raw header lines are kept, leaf bodies hold the
//! bytes as received, and multipart preamble/epilogue are written back exactly. A composed
//! multipart without an epilogue ends right after its close delimiter.

use std::io::{self, Write};

use crate::mime::body::Body;
use crate::mime::part::{PartId, PartTree};

impl PartTree {
    pub fn write_to<W: Write>(&self, id: PartId, out: &mut W) -> io::Result<()> {
        self.header(id).write_to(out)?;
        out.write_all(b"\r\n")?;
        self.write_body_to(id, out)
    }

    pub fn write_body_to<W: Write>(&self, id: PartId, out: &mut W) -> io::Result<()> {
        match self.body(id) {
            None => Ok(()),
            Some(Body::Text(text)) => out.write_all(&text.encoded_bytes()),
            Some(Body::Binary(binary)) => {
                io::copy(&mut binary.open_encoded()?, out)?;
                Ok(())
            }
            Some(Body::Multipart(multipart)) => {
                let boundary = multipart.boundary().as_bytes();
                if let Some(preamble) = multipart.preamble() {
                    out.write_all(preamble)?;
                    out.write_all(b"\r\n")?;
                }
                for &child in multipart.parts() {
                    out.write_all(b"--")?;
                    out.write_all(boundary)?;
                    out.write_all(b"\r\n")?;
                    self.write_to(child, out)?;
                    out.write_all(b"\r\n")?;
                }
                out.write_all(b"--")?;
                out.write_all(boundary)?;
                out.write_all(b"--")?;
                if let Some(epilogue) = multipart.epilogue() {
                    out.write_all(epilogue)?;
                }
                Ok(())
            }
            Some(Body::Message(child)) => self.write_to(*child, out),
        }
    }

    /// Serialized form of the part at `id`.
    pub fn to_bytes(&self, id: PartId) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(id, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::mime::body::Body;
    use crate::mime::part::{Multipart, PartTree};

    #[test]
    fn parsed_message_is_reproduced_exactly() {
        let msg: &[u8] = b"From: a@example.com\r\nSubject: =?utf-8?Q?caf=C3=A9?=\r\n  folded\r\nContent-Type: multipart/signed; boundary=\"s\";\r\n\tprotocol=\"application/pgp-signature\"\r\n\r\nThis is an OpenPGP/MIME signed message.\r\n\r\n--s\r\nContent-Type: multipart/alternative; boundary=a\r\n\r\n--a\r\nContent-Type: text/plain\r\n\r\nline one\r\nline two\r\n--a\r\nContent-Type: text/html\r\n\r\n<p>one</p>\r\n--a--\r\n--s\r\nContent-Type: application/pgp-signature\r\n\r\n-----BEGIN PGP SIGNATURE-----\r\nabc\r\n-----END PGP SIGNATURE-----\r\n\r\n--s--\r\ntrailing epilogue\r\n";
        let tree = PartTree::parse(msg).unwrap();
        assert_eq!(tree.to_bytes(tree.root()).unwrap(), msg);
    }

    #[test]
    fn composed_message_layout() {
        let mut tree = PartTree::new_message();
        let root = tree.root();
        tree.header_mut(root).set("Subject", "hi");
        tree.set_body(root, Body::Multipart(Multipart::with_boundary("mixed", "XX")));
        let text = tree.new_body_part(Body::text("hello"), "text/plain");
        tree.add_part(root, text).unwrap();

        let written = String::from_utf8(tree.to_bytes(root).unwrap()).unwrap();
        assert_eq!(
            written,
            "MIME-Version: 1.0\r\nSubject: hi\r\nContent-Type: multipart/mixed; boundary=\"XX\"\r\nContent-Transfer-Encoding: 7bit\r\n\r\n--XX\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nhello\r\n--XX--"
        );
    }
}
