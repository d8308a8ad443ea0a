/*
 * id_set.rs
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

//! IMAP sequence sets: discrete ids and inclusive ranges (`1:5,10,20:*`).

use std::collections::BTreeSet;
use std::fmt;

use crate::store::MessagingError;

/// Marker for the highest id in the mailbox, written `*`.
pub const HIGHEST_ID: u64 = u64::MAX;

/// Inclusive range of ids, always `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdGroup {
    start: u64,
    end: u64,
}

impl IdGroup {
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn contains(&self, id: u64) -> bool {
        self.start <= id && id <= self.end
    }

    pub fn is_open_ended(&self) -> bool {
        self.end == HIGHEST_ID
    }
}

impl fmt::Display for IdGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", IdToken::Id(self.start), IdToken::Id(self.end))
    }
}

/// One element of a sequence set on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdToken {
    Id(u64),
    Group(IdGroup),
}

impl IdToken {
    fn sort_key(&self) -> (u64, u64) {
        match self {
            IdToken::Id(id) => (*id, *id),
            IdToken::Group(g) => (g.start, g.end),
        }
    }
}

impl fmt::Display for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdToken::Id(HIGHEST_ID) => f.write_str("*"),
            IdToken::Id(id) => write!(f, "{}", id),
            IdToken::Group(g) => g.fmt(f),
        }
    }
}

/// Ids and ranges selected by a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSet {
    ids: BTreeSet<u64>,
    groups: Vec<IdGroup>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        let mut set = Self::new();
        set.add_ids(ids);
        set
    }

    pub fn add_id(&mut self, id: u64) {
        self.ids.insert(id);
    }

    pub fn add_ids(&mut self, ids: impl IntoIterator<Item = u64>) {
        self.ids.extend(ids);
    }

    /// Add the range between `a` and `b` in either order.
    pub fn add_group(&mut self, a: u64, b: u64) {
        self.groups.push(IdGroup::new(a, b));
    }

    /// Everything from `start` up to the highest id.
    pub fn add_open_range(&mut self, start: u64) {
        self.add_group(start, HIGHEST_ID);
    }

    pub fn add_token(&mut self, token: IdToken) {
        match token {
            IdToken::Id(id) => self.add_id(id),
            IdToken::Group(group) => self.groups.push(group),
        }
    }

    pub fn ids(&self) -> &BTreeSet<u64> {
        &self.ids
    }

    pub fn groups(&self) -> &[IdGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.groups.is_empty()
    }

    pub fn has_open_range(&self) -> bool {
        self.groups.iter().any(IdGroup::is_open_ended)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id) || self.groups.iter().any(|g| g.contains(id))
    }

    /// Every selected id. None when a range reaches the highest id.
    pub fn expand(&self) -> Option<BTreeSet<u64>> {
        if self.has_open_range() {
            return None;
        }
        let mut all = self.ids.clone();
        for group in &self.groups {
            all.extend(group.start..=group.end);
        }
        Some(all)
    }

    /// Rewrite as maximal runs: a range for every run of two or more consecutive ids and
    /// a single id otherwise. Sets with an open-ended range are left alone.
    pub fn optimize_groupings(&mut self) {
        let Some(all) = self.expand() else {
            return;
        };
        let mut ids = BTreeSet::new();
        let mut groups = Vec::new();
        let mut run: Option<(u64, u64)> = None;
        for id in all {
            run = match run {
                Some((start, end)) if end.checked_add(1) == Some(id) => Some((start, id)),
                Some((start, end)) => {
                    push_run(start, end, &mut ids, &mut groups);
                    Some((id, id))
                }
                None => Some((id, id)),
            };
        }
        if let Some((start, end)) = run {
            push_run(start, end, &mut ids, &mut groups);
        }
        self.ids = ids;
        self.groups = groups;
    }

    /// Ids and ranges in ascending order of their first id.
    pub fn tokens(&self) -> Vec<IdToken> {
        let mut tokens: Vec<IdToken> = self
            .ids
            .iter()
            .map(|&id| IdToken::Id(id))
            .chain(self.groups.iter().map(|&g| IdToken::Group(g)))
            .collect();
        tokens.sort_by_key(IdToken::sort_key);
        tokens
    }

    pub fn to_wire_string(&self) -> String {
        self.tokens()
            .iter()
            .map(IdToken::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn push_run(start: u64, end: u64, ids: &mut BTreeSet<u64>, groups: &mut Vec<IdGroup>) {
    if start == end {
        ids.insert(start);
    } else {
        groups.push(IdGroup::new(start, end));
    }
}

impl fmt::Display for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

/// Expand a sequence set sent by the server (e.g. in `COPYUID`), keeping its order.
pub fn parse_id_set(s: &str) -> Result<Vec<u64>, MessagingError> {
    let mut out = Vec::new();
    for token in s.trim().split(',') {
        let number = |t: &str| {
            t.parse::<u64>()
                .map_err(|_| MessagingError::parse(format!("invalid id set {:?}", s)))
        };
        match token.split_once(':') {
            Some((a, b)) => {
                let (a, b) = (number(a)?, number(b)?);
                if a <= b {
                    out.extend(a..=b);
                } else {
                    out.extend((b..=a).rev());
                }
            }
            None => out.push(number(token)?),
        }
    }
    Ok(out)
}
