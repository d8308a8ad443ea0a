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

//! What a message looks like to the user: viewable text, HTML and attachments.

mod attachment;
mod extractor;
mod html;
mod message_view;
mod viewable;

pub use attachment::{extension_for_mime_type, AttachmentViewInfo};
pub use extractor::{
    extract_text_from_viewables, extract_viewables_and_attachments, find_viewables_and_attachments,
    is_part_textual_body, ExtractedText,
};
pub use html::{add_html_divider, add_message_header_html, add_message_header_text, add_text_divider, part_name, TEXT_DIVIDER_LENGTH};
pub use message_view::{extract_message_for_view, MessageViewInfo, ViewOptions};
pub use viewable::Viewable;
