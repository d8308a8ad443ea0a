/*
 * message.rs
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

//! Message flags.

use std::fmt;

/// Message flags (e.g. Seen, Answered). Anything else is a keyword.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Custom(String),
}

impl Flag {
    /// Parse a flag from its IMAP form (`\Seen`, `$Forwarded`).
    pub fn from_imap(s: &str) -> Flag {
        let name = s.trim_start_matches('\\');
        match name.to_ascii_uppercase().as_str() {
            "SEEN" => Flag::Seen,
            "ANSWERED" => Flag::Answered,
            "FLAGGED" => Flag::Flagged,
            "DELETED" => Flag::Deleted,
            "DRAFT" => Flag::Draft,
            _ => Flag::Custom(s.to_string()),
        }
    }

    /// IMAP form, as used in STORE flag lists.
    pub fn to_imap(&self) -> &str {
        match self {
            Flag::Seen => "\\Seen",
            Flag::Answered => "\\Answered",
            Flag::Flagged => "\\Flagged",
            Flag::Deleted => "\\Deleted",
            Flag::Draft => "\\Draft",
            Flag::Custom(keyword) => keyword,
        }
    }

    /// SEARCH key matching messages with (`set`) or without this flag.
    pub fn search_key(&self, set: bool) -> String {
        let (key, negated) = match self {
            Flag::Seen => ("SEEN", "UNSEEN"),
            Flag::Answered => ("ANSWERED", "UNANSWERED"),
            Flag::Flagged => ("FLAGGED", "UNFLAGGED"),
            Flag::Deleted => ("DELETED", "UNDELETED"),
            Flag::Draft => ("DRAFT", "UNDRAFT"),
            Flag::Custom(keyword) => {
                return if set {
                    format!("KEYWORD {}", keyword)
                } else {
                    format!("UNKEYWORD {}", keyword)
                }
            }
        };
        if set { key } else { negated }.to_string()
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_imap())
    }
}
