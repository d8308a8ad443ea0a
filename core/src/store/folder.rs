/*
 * folder.rs
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

//! Folder bookkeeping driven by untagged responses (EXISTS, EXPUNGE, status codes).

use tokio::io::{AsyncRead, AsyncWrite};

use crate::protocol::imap::{encode_mailbox_name, quote_string, ImapConnection, ImapResponse, UntaggedHandler};
use crate::store::error::MessagingError;

/// What the client knows about a selected IMAP folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderState {
    pub name: String,
    pub message_count: u64,
    pub uid_next: Option<u64>,
    pub uid_validity: Option<u64>,
    pub highest_mod_seq: Option<u64>,
    /// Set when the server reports a UIDVALIDITY different from the one already known;
    /// cached UIDs for this folder are then stale.
    pub uid_validity_changed: bool,
}

impl FolderState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// SELECT this folder, updating counts and status codes from the responses.
    pub async fn select<S>(&mut self, connection: &mut ImapConnection<S>) -> Result<(), MessagingError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let command = format!("SELECT {}", quote_string(&encode_mailbox_name(&self.name)));
        let response = connection.execute_simple_command(&command).await?;
        for untagged in &response.untagged {
            self.handle_untagged(untagged);
        }
        tracing::debug!(
            folder = %self.name,
            messages = self.message_count,
            uid_next = ?self.uid_next,
            "selected folder"
        );
        Ok(())
    }

    fn note_code(&mut self, response: &ImapResponse) {
        let Some(name) = response.code_name() else {
            return;
        };
        let value = response.code_args().first().and_then(|v| v.parse::<u64>().ok());
        match name.to_ascii_uppercase().as_str() {
            "UIDNEXT" => self.uid_next = value,
            "UIDVALIDITY" => {
                if let (Some(known), Some(new)) = (self.uid_validity, value) {
                    if known != new {
                        tracing::warn!(folder = %self.name, known, new, "UIDVALIDITY changed");
                        self.uid_validity_changed = true;
                    }
                }
                self.uid_validity = value;
            }
            "HIGHESTMODSEQ" => self.highest_mod_seq = value,
            _ => {}
        }
    }
}

impl UntaggedHandler for FolderState {
    fn handle_untagged(&mut self, response: &ImapResponse) {
        if response.status.is_some() {
            self.note_code(response);
            return;
        }
        let Some((number, name)) = response.number_and_name() else {
            return;
        };
        match name.to_ascii_uppercase().as_str() {
            "EXISTS" => {
                tracing::trace!(folder = %self.name, count = number, "EXISTS");
                self.message_count = number;
            }
            "EXPUNGE" => {
                tracing::trace!(folder = %self.name, sequence = number, "EXPUNGE");
                self.message_count = self.message_count.saturating_sub(1);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(state: &mut FolderState, line: &str) {
        state.handle_untagged(&ImapResponse::parse_line(line).unwrap());
    }

    #[test]
    fn untagged_bookkeeping() {
        let mut state = FolderState::new("INBOX");
        feed(&mut state, "* 172 EXISTS");
        feed(&mut state, "* 1 RECENT");
        feed(&mut state, "* OK [UIDVALIDITY 3857529045] UIDs valid");
        feed(&mut state, "* OK [UIDNEXT 4392] Predicted next UID");
        feed(&mut state, "* OK [HIGHESTMODSEQ 715194045007] Highest");
        feed(&mut state, "* 3 EXPUNGE");
        assert_eq!(state.message_count, 171);
        assert_eq!(state.uid_validity, Some(3857529045));
        assert_eq!(state.uid_next, Some(4392));
        assert_eq!(state.highest_mod_seq, Some(715194045007));
        assert!(!state.uid_validity_changed);

        feed(&mut state, "* OK [UIDVALIDITY 1] reset");
        assert!(state.uid_validity_changed);
    }

    #[test]
    fn expunge_never_underflows() {
        let mut state = FolderState::new("Trash");
        feed(&mut state, "* 1 EXPUNGE");
        assert_eq!(state.message_count, 0);
    }
}
