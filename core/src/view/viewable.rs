/*
 * viewable.rs
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

//! Parts classified for display.

use crate::mime::PartId;

/// A displayable piece of a message, in message order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewable {
    Text(PartId),
    /// `text/plain; format=flowed`.
    Flowed { part: PartId, del_sp: bool },
    Html(PartId),
    /// Renditions of a `multipart/alternative`. Either side may be empty.
    Alternative { text: Vec<Viewable>, html: Vec<Viewable> },
    /// Header block of a nested `message/rfc822`. `container` is the part whose body is
    /// the message; its viewables follow in the list.
    MessageHeader { container: PartId, message: PartId },
}

impl Viewable {
    /// Part of a textual viewable.
    pub fn part(&self) -> Option<PartId> {
        match self {
            Viewable::Text(part) | Viewable::Html(part) | Viewable::Flowed { part, .. } => Some(*part),
            _ => None,
        }
    }

    pub fn is_textual(&self) -> bool {
        self.part().is_some()
    }
}
