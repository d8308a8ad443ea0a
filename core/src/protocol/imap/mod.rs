/*
 * mod.rs
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

//! IMAP folder commands: id sets, command building and splitting, response parsing and
//! execution over a caller-supplied stream.

mod command;
mod connection;
mod id_set;
mod response;
mod responses;
mod utf7;

pub(crate) use command::quote_string;
pub use command::{CommandKind, CommandLimits, FolderSelectedCommand, SearchCriteria, StoreMode};
pub use connection::{CommandResponse, ImapConnection, IoErrorHandler, UntaggedHandler};
pub use id_set::{parse_id_set, IdGroup, IdSet, IdToken, HIGHEST_ID};
pub use response::{parse_response, read_response, ImapElement, ImapResponse, ResponseLimits, ResponseLine, ResponseStatus};
pub use responses::{CopyUidResponse, FetchResponse, SearchResponse, StoreResponse};
pub use utf7::{decode_mailbox_name, encode_mailbox_name};
