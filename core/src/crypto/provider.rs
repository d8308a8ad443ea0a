/*
 * provider.rs
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

//! Seam to the external OpenPGP provider.

use std::future::Future;
use std::pin::Pin;

use crate::crypto::annotation::{DecryptionResult, ProviderError, SignatureResult};
use crate::crypto::pipe::PipeReader;

/// Operation asked of the provider for one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoRequest {
    /// Verify the streamed signed content against a detached signature.
    DetachedVerify { signature: Vec<u8> },
    /// Decrypt (and verify, if signed) a PGP/MIME payload.
    DecryptVerify,
    /// Decrypt or verify PGP/INLINE text.
    InlineDecryptVerify,
}

/// Opaque handle for an interactive step the provider needs (passphrase, key selection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInteractionToken(pub Vec<u8>);

/// A request together with its input stream.
pub struct CryptoOperation {
    pub request: CryptoRequest,
    pub input: PipeReader,
    /// Data returned by a completed interactive step, when this is a retry.
    pub interaction: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoProviderResult {
    Success {
        /// Decrypted content: a MIME entity for PGP/MIME, plain text for PGP/INLINE.
        output: Option<Vec<u8>>,
        decryption: Option<DecryptionResult>,
        signature: Option<SignatureResult>,
    },
    Error(ProviderError),
    UserInteractionRequired(UserInteractionToken),
}

pub trait CryptoProvider: Send + Sync {
    /// Whether a connection to the provider is established.
    fn is_bound(&self) -> bool;

    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<(), ProviderError>> + Send + '_>>;

    /// Run one operation. Implementations read `operation.input` to its end or drop it.
    fn execute(&self, operation: CryptoOperation) -> Pin<Box<dyn Future<Output = CryptoProviderResult> + Send + '_>>;
}
