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

//! MIME structure model: event-driven parsing (push/handler model, non-blocking buffer
//! contract), the part tree, header codec and serialization.

mod base64;
mod body;
mod builder;
mod content_disposition;
mod content_type;
mod flowed;
mod handler;
mod header;
mod parameter;
mod parser;
mod part;
mod quoted_printable;
mod rfc2047;
mod text;
mod utils;
mod writer;

pub use body::{
    decode as decode_transfer_encoding, encode as encode_transfer_encoding, BinaryBody, BinaryStorage, Body,
    BodyFactory, DecodingReader, TempFileBody, TerminalReader, TextBody, TransferEncoding,
    DEFAULT_MEMORY_THRESHOLD,
};
pub use builder::TreeBuilder;
pub use content_disposition::{parse_content_disposition, ContentDisposition};
pub use content_type::{parse_content_type, parse_parameter_list, ContentType};
pub use flowed::deflow;
pub use handler::{MimeHandler, MimeLocator, MimeParseError};
pub use header::{encode_field_value, fold, unfold, unfold_and_decode, Field, Header, DEFAULT_FOLD_COLUMN};
pub use parameter::{combine_rfc2231, encode_parameter_header, format_parameter, get_header_parameter, Parameter};
pub use parser::MimeParser;
pub use part::{generate_boundary, is_same_mime_type, Multipart, Part, PartId, PartStorage, PartTree};
pub use rfc2047::{
    charset_bytes_to_string, decode_encoded_words, encode_encoded_word, header_bytes_to_string, lookup_charset,
    MAX_ENCODED_WORD_LENGTH,
};
pub use text::{decode_text, escape_html, get_text_from_part, html_to_text, text_to_html};
pub use utils::{is_boundary_char, is_token, is_token_char, is_valid_boundary};
