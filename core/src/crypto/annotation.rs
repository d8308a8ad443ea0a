/*
 * annotation.rs
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

//! Outcome of crypto processing for one part.

use std::collections::HashMap;

use crate::mime::PartId;

/// Error kinds recorded in a [`CryptoResultAnnotation`]. `OpenPgpOk` marks a successful
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoError {
    OpenPgpOk,
    OpenPgpEncryptedNoProvider,
    OpenPgpEncryptedButIncomplete,
    OpenPgpSignedButIncomplete,
    EncryptedButUnsupported,
    SignedButUnsupported,
    OpenPgpApiReturnedError,
    OpenPgpUiCanceled,
    OpenPgpProviderUnavailable,
}

impl CryptoError {
    pub fn as_str(self) -> &'static str {
        match self {
            CryptoError::OpenPgpOk => "OPENPGP_OK",
            CryptoError::OpenPgpEncryptedNoProvider => "OPENPGP_ENCRYPTED_NO_PROVIDER",
            CryptoError::OpenPgpEncryptedButIncomplete => "OPENPGP_ENCRYPTED_BUT_INCOMPLETE",
            CryptoError::OpenPgpSignedButIncomplete => "OPENPGP_SIGNED_BUT_INCOMPLETE",
            CryptoError::EncryptedButUnsupported => "ENCRYPTED_BUT_UNSUPPORTED",
            CryptoError::SignedButUnsupported => "SIGNED_BUT_UNSUPPORTED",
            CryptoError::OpenPgpApiReturnedError => "OPENPGP_API_RETURNED_ERROR",
            CryptoError::OpenPgpUiCanceled => "OPENPGP_UI_CANCELED",
            CryptoError::OpenPgpProviderUnavailable => "OPENPGP_PROVIDER_UNAVAILABLE",
        }
    }
}

/// What the provider said about a decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionResult {
    pub encrypted: bool,
}

/// What the provider said about a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureResult {
    pub valid: bool,
    pub signer_user_id: Option<String>,
    pub key_id: Option<u64>,
}

/// Error reported by the provider itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationKind {
    Success {
        decryption: Option<DecryptionResult>,
        signature: Option<SignatureResult>,
    },
    Error {
        error: CryptoError,
        provider_error: Option<ProviderError>,
    },
}

/// Result of crypto processing for one part, keyed by that part's [`PartId`].
///
/// `replacement` is the part to render instead of the annotated one: the decrypted content,
/// the signed content of a `multipart/signed`, or an empty placeholder for errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoResultAnnotation {
    pub kind: AnnotationKind,
    pub replacement: Option<PartId>,
    /// Signature result of a signed part found inside `replacement`.
    pub encapsulated_result: Option<Box<CryptoResultAnnotation>>,
}

impl CryptoResultAnnotation {
    pub fn success(
        decryption: Option<DecryptionResult>,
        signature: Option<SignatureResult>,
        replacement: Option<PartId>,
    ) -> Self {
        Self {
            kind: AnnotationKind::Success { decryption, signature },
            replacement,
            encapsulated_result: None,
        }
    }

    pub fn error(error: CryptoError, replacement: Option<PartId>) -> Self {
        Self {
            kind: AnnotationKind::Error {
                error,
                provider_error: None,
            },
            replacement,
            encapsulated_result: None,
        }
    }

    pub fn provider_error(error: ProviderError, replacement: Option<PartId>) -> Self {
        Self {
            kind: AnnotationKind::Error {
                error: CryptoError::OpenPgpApiReturnedError,
                provider_error: Some(error),
            },
            replacement,
            encapsulated_result: None,
        }
    }

    pub fn error_type(&self) -> CryptoError {
        match &self.kind {
            AnnotationKind::Success { .. } => CryptoError::OpenPgpOk,
            AnnotationKind::Error { error, .. } => *error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, AnnotationKind::Error { .. })
    }

    pub fn has_replacement(&self) -> bool {
        self.replacement.is_some()
    }

    pub fn has_signature_result(&self) -> bool {
        matches!(&self.kind, AnnotationKind::Success { signature: Some(_), .. })
    }

    pub fn signature_result(&self) -> Option<&SignatureResult> {
        match &self.kind {
            AnnotationKind::Success { signature, .. } => signature.as_ref(),
            AnnotationKind::Error { .. } => None,
        }
    }

    pub fn decryption_result(&self) -> Option<&DecryptionResult> {
        match &self.kind {
            AnnotationKind::Success { decryption, .. } => decryption.as_ref(),
            AnnotationKind::Error { .. } => None,
        }
    }
}

/// Annotations of one message, keyed by part identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCryptoAnnotations {
    annotations: HashMap<PartId, CryptoResultAnnotation>,
}

impl MessageCryptoAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, part: PartId, annotation: CryptoResultAnnotation) {
        self.annotations.insert(part, annotation);
    }

    pub fn get(&self, part: PartId) -> Option<&CryptoResultAnnotation> {
        self.annotations.get(&part)
    }

    pub fn get_mut(&mut self, part: PartId) -> Option<&mut CryptoResultAnnotation> {
        self.annotations.get_mut(&part)
    }

    pub fn has(&self, part: PartId) -> bool {
        self.annotations.contains_key(&part)
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn parts(&self) -> impl Iterator<Item = PartId> + '_ {
        self.annotations.keys().copied()
    }

    /// Part whose annotation names `part` as its replacement.
    pub fn find_key_for_annotation_with_replacement(&self, part: PartId) -> Option<PartId> {
        self.annotations
            .iter()
            .find(|(_, a)| a.replacement == Some(part))
            .map(|(k, _)| *k)
    }
}
