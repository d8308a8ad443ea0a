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

//! Message crypto processing: locating OpenPGP structures, driving the external provider
//! one part at a time, and recording the outcome per part.

mod annotation;
mod helper;
mod pipe;
mod provider;
mod structure;

pub use annotation::{
    AnnotationKind, CryptoError, CryptoResultAnnotation, DecryptionResult, MessageCryptoAnnotations, ProviderError,
    SignatureResult,
};
pub use helper::{
    CancelHandle, CryptoHelperError, CryptoHelperState, CryptoOutcome, CryptoPartType, MessageCryptoHelper,
    UserInteractionResult,
};
pub use pipe::{pipe, spawn_producer, PipeReader, PipeWriter, PIPE_CHUNK_SIZE};
pub use provider::{CryptoOperation, CryptoProvider, CryptoProviderResult, CryptoRequest, UserInteractionToken};
pub use structure::{
    extract_clearsigned_text, find_multipart_encrypted_parts, find_multipart_signed_parts, find_pgp_inline_parts,
    find_primary_encrypted_or_signed_part, is_multipart_encrypted_openpgp_protocol, is_multipart_signed_openpgp_protocol,
    is_part_data_available, is_part_encrypted_or_signed, is_part_multipart_encrypted, is_part_multipart_signed,
    is_part_pgp_inline_encrypted, is_part_pgp_inline_encrypted_or_signed, signature_data, APPLICATION_PGP,
    APPLICATION_PGP_ENCRYPTED, APPLICATION_PGP_SIGNATURE, MULTIPART_ENCRYPTED, MULTIPART_SIGNED, TEXT_PLAIN,
};
