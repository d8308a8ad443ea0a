/*
 * lib.rs
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

//! Carteggio core: MIME structure model, viewable extraction, message crypto processing
//! and the IMAP command/response pipeline.
//!
//! Transport sockets, persistence and UI live outside this crate; they talk to it through
//! the narrow seams in [`crypto::CryptoProvider`], [`protocol::imap::ImapConnection`] and
//! [`mime::PartTree`].

pub mod config;
pub mod crypto;
pub mod mime;
pub mod protocol;
pub mod store;
pub mod view;
