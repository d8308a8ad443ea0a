/*
 * error.rs
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

//! Messaging errors: I/O, parse, negative protocol replies.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::mime::MimeParseError;
use crate::protocol::imap::ResponseStatus;

/// Reply code of SMTP-style protocols that signals failed authentication.
pub const AUTHENTICATION_FAILED_REPLY_CODE: u16 = 535;

/// Errors from the messaging layer (MIME, IMAP, configuration).
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {message}")]
    Parse { message: String },
    #[error("{0}")]
    NegativeResponse(NegativeImapResponse),
    #[error("{0}")]
    NegativeReply(NegativeReply),
    #[error("command of {length} bytes exceeds the line limit of {limit}")]
    CommandTooLong { limit: usize, length: usize },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid message structure: {0}")]
    Structure(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl MessagingError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether retrying the same operation is pointless.
    ///
    /// Negative replies are classified by their reply-code class (5xx permanent, 4xx transient).
    /// IMAP `NO`/`BAD` responses, parse and configuration errors are permanent; I/O errors and
    /// cancellation are not.
    pub fn is_permanent(&self) -> bool {
        match self {
            MessagingError::Io(_) | MessagingError::Cancelled => false,
            MessagingError::NegativeReply(reply) => reply.is_permanent(),
            MessagingError::NegativeResponse(_)
            | MessagingError::Parse { .. }
            | MessagingError::CommandTooLong { .. }
            | MessagingError::Protocol(_)
            | MessagingError::Structure(_)
            | MessagingError::Config(_) => true,
        }
    }
}

impl From<MimeParseError> for MessagingError {
    fn from(e: MimeParseError) -> Self {
        match e.locator {
            Some(loc) => Self::parse(format!("{} (line {}, column {})", e.message, loc.line, loc.column)),
            None => Self::parse(e.message),
        }
    }
}

/// Negative reply carrying a numeric reply code (SMTP-style `535 5.7.8 ...`).
/// Callers branch on `reply_code`, never on the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeReply {
    pub reply_code: u16,
    pub reply_text: String,
}

impl NegativeReply {
    pub fn new(reply_code: u16, reply_text: impl Into<String>) -> Self {
        Self {
            reply_code,
            reply_text: reply_text.into(),
        }
    }

    /// Parse a reply line such as `535 5.7.8 Authentication credentials invalid`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let code = line.get(..3)?;
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let rest = line[3..].trim_start_matches(['-', ' ']);
        Some(Self::new(code.parse().ok()?, rest))
    }

    pub fn is_authentication_failure(&self) -> bool {
        self.reply_code == AUTHENTICATION_FAILED_REPLY_CODE
    }

    pub fn is_permanent(&self) -> bool {
        self.reply_code / 100 == 5
    }

    pub fn is_transient(&self) -> bool {
        self.reply_code / 100 == 4
    }

    /// Enhanced status code (`4.4.2`) leading the reply text, if any.
    pub fn enhanced_status(&self) -> Option<(u8, u16, u16)> {
        let token = self.reply_text.split_whitespace().next()?;
        let mut fields = token.split('.');
        let class = fields.next()?.parse().ok()?;
        let subject = fields.next()?.parse().ok()?;
        let detail = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some((class, subject, detail))
    }

    /// Transient failure worth retrying unchanged: a 4xx reply whose enhanced status
    /// subject is mail system (3) or network/routing (4), or any 4xx without one.
    pub fn is_retryable(&self) -> bool {
        if !self.is_transient() {
            return false;
        }
        match self.enhanced_status() {
            Some((_, subject, _)) => subject == 3 || subject == 4,
            None => true,
        }
    }
}

impl fmt::Display for NegativeReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "negative reply {}: {}", self.reply_code, self.reply_text)
    }
}

/// Tagged `NO` or `BAD` from an IMAP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeImapResponse {
    pub status: ResponseStatus,
    pub response_code: Option<String>,
    pub text: String,
    /// Text of an `[ALERT]` response code; servers expect it to be shown to the user.
    pub alert: Option<String>,
}

impl fmt::Display for NegativeImapResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "negative IMAP response: {:?}", self.status)?;
        if let Some(code) = &self.response_code {
            write!(f, " [{}]", code)?;
        }
        write!(f, " {}", self.text)
    }
}
