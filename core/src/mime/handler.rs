/*
 * handler.rs
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

//! MIME handler trait: receives parsing events (entity, headers, multipart framing, body chunks).

/// Handler for MIME parsing events (push model). Parser calls these as it reads.
///
/// Entities nest: every `start_entity` is matched by an `end_entity`. A multipart body is
/// bracketed by `start_multipart`/`end_multipart` and contains the child entities; a nested
/// `message/rfc822` body is bracketed by `start_message`/`end_message` around one entity.
/// Body bytes are delivered raw, still in their content-transfer-encoding.
pub trait MimeHandler {
    fn set_locator(&mut self, _locator: MimeLocator) {}

    fn start_entity(&mut self) -> Result<(), MimeParseError> {
        Ok(())
    }

    /// One header field. `value` keeps folding intact; `raw` is the field exactly as read,
    /// including every line ending.
    fn header(&mut self, _name: &str, _value: &str, _raw: &[u8]) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn start_multipart(&mut self, _boundary: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn preamble(&mut self, _data: &[u8]) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn epilogue(&mut self, _data: &[u8]) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn end_multipart(&mut self) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn start_message(&mut self) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn end_message(&mut self) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn body_content(&mut self, _data: &[u8]) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn end_entity(&mut self) -> Result<(), MimeParseError> {
        Ok(())
    }
}

/// Position within the MIME entity for error reporting.
#[derive(Debug, Clone)]
pub struct MimeLocator {
    pub offset: u64,
    pub line: u64,
    pub column: u64,
}

#[derive(Debug)]
pub struct MimeParseError {
    pub message: String,
    pub locator: Option<MimeLocator>,
}

impl MimeParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locator: None,
        }
    }
}

impl std::fmt::Display for MimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MimeParseError {}

impl From<std::io::Error> for MimeParseError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}
