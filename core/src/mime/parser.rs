/*
 * parser.rs
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

//! MIME parser: receive(buffer) contract, consume complete lines only, keep the remainder for the
//! next call.
//!
//! The parser runs in raw mode: body bytes reach the handler still transfer-encoded, and the line
//! ending in front of a boundary delimiter is treated as part of the delimiter, so preamble, body
//! and epilogue bytes can be written back out unchanged.

use tracing::debug;

use crate::mime::content_type::parse_content_type;
use crate::mime::handler::{MimeHandler, MimeLocator, MimeParseError};
use crate::mime::header::unfold;
use crate::mime::rfc2047::header_bytes_to_string;
use crate::mime::utils::is_valid_boundary;

/// Event-driven MIME parser. Feed data via receive(); handler gets callbacks.
pub struct MimeParser<H> {
    handler: H,
    started: bool,
    in_headers: bool,
    /// Incomplete line carried over from previous receive()
    line_buffer: Vec<u8>,
    /// Open entities, multipart bodies and nested messages, outermost first
    frames: Vec<Frame>,
    pending_header: Option<PendingHeader>,
    header_count: usize,
    content_type: Option<String>,
    content_transfer_encoding: Option<String>,
    /// Line ending of the last content line; dropped if a delimiter follows
    pending_eol: Vec<u8>,
    locator: MimeLocator,
}

struct PendingHeader {
    name: String,
    value: String,
    raw: Vec<u8>,
}

enum Frame {
    Entity,
    Multipart {
        boundary: String,
        digest: bool,
        closed: bool,
    },
    Message,
}

impl<H: MimeHandler> MimeParser<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            started: false,
            in_headers: false,
            line_buffer: Vec::new(),
            frames: Vec::new(),
            pending_header: None,
            header_count: 0,
            content_type: None,
            content_transfer_encoding: None,
            pending_eol: Vec::new(),
            locator: MimeLocator {
                offset: 0,
                line: 1,
                column: 1,
            },
        }
    }

    /// Process every complete line in buf. The unterminated tail is kept until the next call
    /// or close().
    pub fn receive(&mut self, buf: &[u8]) -> Result<(), MimeParseError> {
        if buf.is_empty() {
            return Ok(());
        }
        self.line_buffer.extend_from_slice(buf);
        let last_newline = match self.line_buffer.iter().rposition(|&b| b == b'\n') {
            Some(i) => i,
            None => return Ok(()),
        };
        let complete: Vec<u8> = self.line_buffer.drain(..=last_newline).collect();
        let mut line_start = 0;
        for (i, &b) in complete.iter().enumerate() {
            if b == b'\n' {
                let line = &complete[line_start..=i];
                self.process_line(line)?;
                self.locator.offset += line.len() as u64;
                self.locator.line += 1;
                self.locator.column = 1;
                line_start = i + 1;
            }
        }
        Ok(())
    }

    /// Return the handler (e.g. after close) for inspection.
    pub fn into_inner(self) -> H {
        self.handler
    }

    /// End of input; flush any pending state and close every open entity.
    /// Truncated input (missing close delimiter, missing header terminator) is tolerated.
    pub fn close(&mut self) -> Result<(), MimeParseError> {
        self.handler.set_locator(self.locator.clone());
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            self.process_line(&line)?;
        }
        if !self.started {
            self.started = true;
            self.open_entity()?;
        }
        if self.in_headers {
            self.end_headers()?;
        }
        let pending = std::mem::take(&mut self.pending_eol);
        if !pending.is_empty() {
            self.emit(&pending)?;
        }
        while !self.frames.is_empty() {
            self.close_frame()?;
        }
        Ok(())
    }

    fn process_line(&mut self, line: &[u8]) -> Result<(), MimeParseError> {
        let (content, eol) = split_line_ending(line);
        if !self.started {
            self.started = true;
            self.handler.set_locator(self.locator.clone());
            self.open_entity()?;
        }
        if let Some((index, closing)) = self.match_delimiter(content) {
            return self.process_delimiter(index, closing, eol);
        }
        if self.in_headers {
            if content.is_empty() {
                self.end_headers()?;
                return self.start_body();
            }
            let is_continuation = matches!(content[0], b' ' | b'\t') && self.pending_header.is_some();
            if !is_continuation && self.header_count == 0 && split_header(content).is_none() {
                debug!(line = self.locator.line, "entity has no header block");
                self.end_headers()?;
                self.start_body()?;
                return self.deliver_content(content, eol);
            }
            return self.process_header_line(content, line);
        }
        self.deliver_content(content, eol)
    }

    fn open_entity(&mut self) -> Result<(), MimeParseError> {
        self.handler.start_entity()?;
        self.frames.push(Frame::Entity);
        self.in_headers = true;
        self.header_count = 0;
        self.content_type = None;
        self.content_transfer_encoding = None;
        Ok(())
    }

    fn process_header_line(&mut self, content: &[u8], line: &[u8]) -> Result<(), MimeParseError> {
        if matches!(content[0], b' ' | b'\t') {
            if let Some(h) = self.pending_header.as_mut() {
                h.value.push_str("\r\n");
                h.value.push_str(&header_bytes_to_string(content));
                h.raw.extend_from_slice(line);
                return Ok(());
            }
        }
        self.flush_header()?;
        match split_header(content) {
            Some((name, value)) => {
                self.pending_header = Some(PendingHeader {
                    name: header_bytes_to_string(name).trim_end().to_string(),
                    value: header_bytes_to_string(value),
                    raw: line.to_vec(),
                });
            }
            None => debug!(line = self.locator.line, "ignoring malformed header line"),
        }
        Ok(())
    }

    fn flush_header(&mut self) -> Result<(), MimeParseError> {
        if let Some(h) = self.pending_header.take() {
            if h.name.eq_ignore_ascii_case("content-type") {
                self.content_type = Some(unfold(&h.value).trim().to_string());
            } else if h.name.eq_ignore_ascii_case("content-transfer-encoding") {
                self.content_transfer_encoding = Some(unfold(&h.value).trim().to_ascii_lowercase());
            }
            self.header_count += 1;
            self.handler.header(&h.name, &h.value, &h.raw)?;
        }
        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), MimeParseError> {
        self.flush_header()?;
        self.in_headers = false;
        self.handler.end_headers()
    }

    fn start_body(&mut self) -> Result<(), MimeParseError> {
        let content_type = self.content_type.as_deref().and_then(parse_content_type);
        match content_type {
            Some(ct) if ct.is_primary_type("multipart") => match ct.get_parameter("boundary") {
                Some(boundary) if is_valid_boundary(boundary) => {
                    self.handler.start_multipart(boundary)?;
                    self.frames.push(Frame::Multipart {
                        boundary: boundary.to_string(),
                        digest: ct.is_sub_type("digest"),
                        closed: false,
                    });
                    Ok(())
                }
                _ => {
                    debug!(line = self.locator.line, "multipart entity without usable boundary");
                    Ok(())
                }
            },
            Some(ct) if ct.is_mime_type("message", "rfc822") => self.start_nested_message(),
            None if self.content_type.is_none() && self.parent_is_digest() => self.start_nested_message(),
            _ => Ok(()),
        }
    }

    fn start_nested_message(&mut self) -> Result<(), MimeParseError> {
        let encoded = matches!(
            self.content_transfer_encoding.as_deref(),
            Some("base64") | Some("quoted-printable")
        );
        if encoded {
            return Ok(());
        }
        self.handler.start_message()?;
        self.frames.push(Frame::Message);
        self.open_entity()
    }

    fn parent_is_digest(&self) -> bool {
        let n = self.frames.len();
        n >= 2 && matches!(self.frames[n - 2], Frame::Multipart { digest: true, .. })
    }

    fn match_delimiter(&self, content: &[u8]) -> Option<(usize, bool)> {
        if !content.starts_with(b"--") {
            return None;
        }
        for (index, frame) in self.frames.iter().enumerate().rev() {
            if let Frame::Multipart {
                boundary, closed, ..
            } = frame
            {
                if *closed {
                    continue;
                }
                if let Some(closing) = delimiter_kind(content, boundary) {
                    return Some((index, closing));
                }
            }
        }
        None
    }

    fn process_delimiter(&mut self, index: usize, closing: bool, eol: &[u8]) -> Result<(), MimeParseError> {
        self.pending_eol.clear();
        if self.in_headers {
            self.end_headers()?;
        }
        if index + 1 < self.frames.len() && !matches!(self.frames.last(), Some(Frame::Entity)) {
            debug!(line = self.locator.line, "outer delimiter closes unterminated multipart");
        }
        while self.frames.len() > index + 1 {
            self.close_frame()?;
        }
        if closing {
            if let Some(Frame::Multipart { closed, .. }) = self.frames.last_mut() {
                *closed = true;
            }
            self.pending_eol = eol.to_vec();
            Ok(())
        } else {
            self.open_entity()
        }
    }

    fn close_frame(&mut self) -> Result<(), MimeParseError> {
        match self.frames.pop() {
            Some(Frame::Entity) => self.handler.end_entity(),
            Some(Frame::Multipart { closed, .. }) => {
                if !closed {
                    debug!(line = self.locator.line, "multipart ended without close delimiter");
                }
                self.handler.end_multipart()
            }
            Some(Frame::Message) => self.handler.end_message(),
            None => Ok(()),
        }
    }

    fn deliver_content(&mut self, content: &[u8], eol: &[u8]) -> Result<(), MimeParseError> {
        let mut data = std::mem::take(&mut self.pending_eol);
        data.extend_from_slice(content);
        self.pending_eol = eol.to_vec();
        self.emit(&data)
    }

    fn emit(&mut self, data: &[u8]) -> Result<(), MimeParseError> {
        match self.frames.last() {
            Some(Frame::Multipart { closed: false, .. }) => self.handler.preamble(data),
            Some(Frame::Multipart { closed: true, .. }) => self.handler.epilogue(data),
            _ => self.handler.body_content(data),
        }
    }
}

fn split_line_ending(line: &[u8]) -> (&[u8], &[u8]) {
    let end = line.len();
    if line.ends_with(b"\r\n") {
        line.split_at(end - 2)
    } else if line.ends_with(b"\n") {
        line.split_at(end - 1)
    } else {
        (line, &[])
    }
}

fn split_header(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    if colon == 0 {
        return None;
    }
    let name = &line[..colon];
    if name.iter().any(|&b| b <= b' ' && b != b'\t' && b != b' ' || b >= 127) {
        return None;
    }
    let value = &line[colon + 1..];
    let start = value.iter().position(|&b| b != b' ' && b != b'\t').unwrap_or(value.len());
    Some((name, &value[start..]))
}

/// `Some(true)` for a close delimiter, `Some(false)` for a part delimiter.
fn delimiter_kind(content: &[u8], boundary: &str) -> Option<bool> {
    let rest = content.strip_prefix(b"--")?.strip_prefix(boundary.as_bytes())?;
    let (closing, tail) = match rest.strip_prefix(b"--") {
        Some(t) => (true, t),
        None => (false, rest),
    };
    if tail.iter().all(|&b| b == b' ' || b == b'\t') {
        Some(closing)
    } else {
        None
    }
}
