/*
 * command.rs
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

//! Commands issued against the selected folder, and splitting of commands whose id set
//! would push the line over the server's length limit.

use chrono::NaiveDate;

use crate::protocol::imap::id_set::{IdSet, IdToken};
use crate::protocol::imap::utf7::encode_mailbox_name;
use crate::store::{Flag, MessagingError};

/// Line length limits, without and with CONDSTORE support on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLimits {
    pub default_limit: usize,
    pub condstore_limit: usize,
}

impl Default for CommandLimits {
    fn default() -> Self {
        Self {
            default_limit: 990,
            condstore_limit: 8182,
        }
    }
}

impl CommandLimits {
    pub fn limit_for(&self, condstore_capable: bool) -> usize {
        if condstore_capable {
            self.condstore_limit
        } else {
            self.default_limit
        }
    }
}

/// What a SEARCH looks for. An empty criteria set searches `ALL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub query: Option<String>,
    /// Search the whole text rather than subject and sender.
    pub full_text: bool,
    pub since: Option<NaiveDate>,
    pub required_flags: Vec<Flag>,
    pub forbidden_flags: Vec<Flag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Add,
    Remove,
    Replace,
}

impl StoreMode {
    fn item_name(self) -> &'static str {
        match self {
            StoreMode::Add => "+FLAGS",
            StoreMode::Remove => "-FLAGS",
            StoreMode::Replace => "FLAGS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Search(SearchCriteria),
    Fetch { items: Vec<String> },
    Store { mode: StoreMode, silent: bool, flags: Vec<Flag> },
    Copy { destination: String },
}

impl CommandKind {
    fn name(&self) -> &'static str {
        match self {
            CommandKind::Search(_) => "SEARCH",
            CommandKind::Fetch { .. } => "FETCH",
            CommandKind::Store { .. } => "STORE",
            CommandKind::Copy { .. } => "COPY",
        }
    }
}

/// A command over a set of message ids (UIDs unless built otherwise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSelectedCommand {
    use_uids: bool,
    kind: CommandKind,
    id_set: IdSet,
}

impl FolderSelectedCommand {
    pub fn new(kind: CommandKind, id_set: IdSet) -> Self {
        Self {
            use_uids: true,
            kind,
            id_set,
        }
    }

    /// `UID SEARCH`, restricted to `id_set` when it is not empty.
    pub fn search(criteria: SearchCriteria, id_set: IdSet) -> Self {
        Self::new(CommandKind::Search(criteria), id_set)
    }

    pub fn fetch<I, S>(id_set: IdSet, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            CommandKind::Fetch {
                items: items.into_iter().map(Into::into).collect(),
            },
            id_set,
        )
    }

    pub fn store(id_set: IdSet, mode: StoreMode, silent: bool, flags: Vec<Flag>) -> Self {
        Self::new(CommandKind::Store { mode, silent, flags }, id_set)
    }

    /// `destination` is the decoded mailbox name.
    pub fn copy(id_set: IdSet, destination: impl Into<String>) -> Self {
        Self::new(
            CommandKind::Copy {
                destination: destination.into(),
            },
            id_set,
        )
    }

    /// Address messages by sequence number instead of UID.
    pub fn with_sequence_numbers(mut self) -> Self {
        self.use_uids = false;
        self
    }

    pub fn use_uids(&self) -> bool {
        self.use_uids
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn id_set(&self) -> &IdSet {
        &self.id_set
    }

    pub fn id_set_mut(&mut self) -> &mut IdSet {
        &mut self.id_set
    }

    /// Same command over a different id set.
    fn with_id_set(&self, id_set: IdSet) -> Self {
        Self {
            use_uids: self.use_uids,
            kind: self.kind.clone(),
            id_set,
        }
    }

    /// Command text without tag or CRLF.
    pub fn create_command_string(&self) -> String {
        self.render(&self.id_set.to_wire_string())
    }

    fn render(&self, ids: &str) -> String {
        let mut out = String::new();
        if self.use_uids {
            out.push_str("UID ");
        }
        out.push_str(self.kind.name());
        match &self.kind {
            CommandKind::Search(criteria) => {
                let mut keys = Vec::new();
                if !ids.is_empty() {
                    keys.push(if self.use_uids { format!("UID {}", ids) } else { ids.to_string() });
                }
                keys.extend(search_keys(criteria));
                if keys.is_empty() {
                    keys.push("ALL".to_string());
                }
                out.push(' ');
                out.push_str(&keys.join(" "));
            }
            CommandKind::Fetch { items } => {
                out.push_str(&format!(" {} ({})", ids, items.join(" ")));
            }
            CommandKind::Store { mode, silent, flags } => {
                let flags: Vec<&str> = flags.iter().map(Flag::to_imap).collect();
                out.push_str(&format!(
                    " {} {}{} ({})",
                    ids,
                    mode.item_name(),
                    if *silent { ".SILENT" } else { "" },
                    flags.join(" ")
                ));
            }
            CommandKind::Copy { destination } => {
                out.push_str(&format!(" {} {}", ids, quote_string(&encode_mailbox_name(destination))));
            }
        }
        out
    }

    /// Split into commands whose text is shorter than `limit`, draining ids and ranges in
    /// ascending order. Fails when a single id or range cannot fit on its own.
    pub fn split(&self, limit: usize) -> Result<Vec<FolderSelectedCommand>, MessagingError> {
        // Length of everything but the id set: render a one-character set and discount it.
        let fixed = self.render("0").len() - 1;
        let tokens: Vec<(IdToken, usize)> = self
            .id_set
            .tokens()
            .into_iter()
            .map(|t| {
                let len = t.to_string().len();
                (t, len)
            })
            .collect();
        let mut commands = Vec::new();
        let mut pool = tokens.into_iter().peekable();
        while pool.peek().is_some() {
            let mut ids = IdSet::new();
            let mut length = fixed;
            let mut count = 0usize;
            while let Some(&(token, token_len)) = pool.peek() {
                let added = token_len + usize::from(count > 0);
                if length + added >= limit {
                    break;
                }
                length += added;
                ids.add_token(token);
                count += 1;
                pool.next();
            }
            if count == 0 {
                let token_len = pool.peek().map_or(0, |(_, len)| *len);
                return Err(MessagingError::CommandTooLong {
                    limit,
                    length: fixed + token_len,
                });
            }
            commands.push(self.with_id_set(ids));
        }
        Ok(commands)
    }

    /// Merge adjacent ids, then split only if the line would reach `limit`.
    pub fn split_if_needed(&self, limit: usize) -> Result<Vec<FolderSelectedCommand>, MessagingError> {
        let mut optimized = self.clone();
        optimized.id_set.optimize_groupings();
        let length = optimized.create_command_string().len();
        if length < limit || optimized.id_set.is_empty() {
            return Ok(vec![optimized]);
        }
        let commands = optimized.split(limit)?;
        tracing::debug!(
            command = self.kind.name(),
            length,
            limit,
            count = commands.len(),
            "split command"
        );
        Ok(commands)
    }
}

fn search_keys(criteria: &SearchCriteria) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(query) = criteria.query.as_deref().filter(|q| !q.is_empty()) {
        let quoted = quote_string(query);
        if criteria.full_text {
            keys.push(format!("TEXT {}", quoted));
        } else {
            keys.push(format!("OR SUBJECT {} FROM {}", quoted, quoted));
        }
    }
    if let Some(since) = criteria.since {
        keys.push(format!("SINCE {}", since.format("%d-%b-%Y")));
    }
    keys.extend(criteria.required_flags.iter().map(|f| f.search_key(true)));
    keys.extend(criteria.forbidden_flags.iter().map(|f| f.search_key(false)));
    keys
}

pub(crate) fn quote_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
