/*
 * helper.rs
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

//! Crypto processing of one message.
//!
//! Parts are discovered in passes (PGP/MIME encryption first, then signatures and
//! PGP/INLINE, which can see into decrypted content), queued, and sent to the provider one
//! at a time. Each processed or rejected part ends up with exactly one annotation.

use std::collections::VecDeque;
use std::future::Future;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::crypto::annotation::{CryptoError, CryptoResultAnnotation, MessageCryptoAnnotations};
use crate::crypto::pipe::spawn_producer;
use crate::crypto::provider::{CryptoOperation, CryptoProvider, CryptoProviderResult, CryptoRequest, UserInteractionToken};
use crate::crypto::structure::{
    extract_clearsigned_text, find_multipart_encrypted_parts, find_multipart_signed_parts, find_pgp_inline_parts,
    is_multipart_encrypted_openpgp_protocol, is_multipart_signed_openpgp_protocol, is_part_pgp_inline_encrypted,
    signature_data,
};
use crate::mime::{get_text_from_part, Body, BodyFactory, PartId, PartTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoHelperState {
    Idle,
    Discovering,
    Queued,
    AwaitingConnection,
    ProcessingPart,
    AwaitingUserInteraction,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Start,
    Encryption,
    SignaturesAndInline,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoPartType {
    PgpEncrypted,
    PgpSigned,
    PgpInline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CryptoPart {
    kind: CryptoPartType,
    part: PartId,
}

/// Where processing stopped.
#[derive(Debug, PartialEq, Eq)]
pub enum CryptoOutcome {
    /// All parts processed. The annotations are handed over once.
    Done(MessageCryptoAnnotations),
    /// The provider needs the user; call [`MessageCryptoHelper::resume`] afterwards.
    UserInteractionRequired(UserInteractionToken),
}

/// What came of an interactive step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInteractionResult {
    Completed(Vec<u8>),
    Cancelled,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoHelperError {
    #[error("operation not allowed in state {0:?}")]
    InvalidState(CryptoHelperState),
    #[error("crypto processing cancelled")]
    Cancelled,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cancels whatever the helper is doing, from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// None if cancelled before `future` completed.
async fn with_cancel<F: Future>(cancel: &CancelHandle, future: F) -> Option<F::Output> {
    tokio::select! {
        output = future => Some(output),
        _ = cancel.cancelled() => None,
    }
}

pub struct MessageCryptoHelper<P: CryptoProvider + ?Sized> {
    provider: Arc<P>,
    factory: BodyFactory,
    process_signed_only: bool,
    state: CryptoHelperState,
    pass: Pass,
    queue: VecDeque<CryptoPart>,
    annotations: MessageCryptoAnnotations,
    interaction: Option<Vec<u8>>,
    cancel: CancelHandle,
    /// Arena length before the current run added replacement parts.
    arena_mark: Option<usize>,
}

impl<P: CryptoProvider + ?Sized> MessageCryptoHelper<P> {
    /// `factory` stores decrypted content; `process_signed_only` enables verification of
    /// signed parts that are not inside encrypted content.
    pub fn new(provider: Arc<P>, factory: BodyFactory, process_signed_only: bool) -> Self {
        Self {
            provider,
            factory,
            process_signed_only,
            state: CryptoHelperState::Idle,
            pass: Pass::Start,
            queue: VecDeque::new(),
            annotations: MessageCryptoAnnotations::new(),
            interaction: None,
            cancel: CancelHandle::default(),
            arena_mark: None,
        }
    }

    pub fn state(&self) -> CryptoHelperState {
        self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Process the message in `tree` from scratch. Decrypted content is grafted into
    /// `tree` and referenced from the annotations.
    ///
    /// Replacement parts left in `tree` by an earlier run of this helper are released first,
    /// unless something attached them to the message; part ids from that earlier outcome are
    /// then no longer valid.
    pub async fn start(&mut self, tree: &mut PartTree) -> Result<CryptoOutcome, CryptoHelperError> {
        self.discard();
        if let Some(mark) = self.arena_mark.take() {
            if !tree.truncate_detached(mark) {
                debug!(mark, len = tree.len(), "earlier replacement parts still attached; keeping them");
            }
        }
        self.arena_mark = Some(tree.len());
        self.cancel.reset();
        self.run(tree).await
    }

    /// Continue after an interactive step. A completed step retries the same part with
    /// the returned data; a cancelled one records [`CryptoError::OpenPgpUiCanceled`].
    pub async fn resume(
        &mut self,
        tree: &mut PartTree,
        result: UserInteractionResult,
    ) -> Result<CryptoOutcome, CryptoHelperError> {
        if self.state != CryptoHelperState::AwaitingUserInteraction {
            return Err(CryptoHelperError::InvalidState(self.state));
        }
        let Some(current) = self.queue.front().copied() else {
            return Err(CryptoHelperError::InvalidState(self.state));
        };
        match result {
            UserInteractionResult::Completed(data) => self.interaction = Some(data),
            UserInteractionResult::Cancelled => {
                let replacement = match current.kind {
                    CryptoPartType::PgpSigned => signed_content_part(tree, current.part),
                    _ => None,
                };
                self.record(current.part, CryptoResultAnnotation::error(CryptoError::OpenPgpUiCanceled, replacement));
                self.queue.pop_front();
            }
        }
        self.run(tree).await
    }

    fn set_state(&mut self, state: CryptoHelperState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "crypto helper state");
            self.state = state;
        }
    }

    fn discard(&mut self) {
        self.queue.clear();
        self.annotations = MessageCryptoAnnotations::new();
        self.interaction = None;
        self.pass = Pass::Start;
        self.set_state(CryptoHelperState::Idle);
    }

    async fn run(&mut self, tree: &mut PartTree) -> Result<CryptoOutcome, CryptoHelperError> {
        loop {
            if self.cancel.is_cancelled() {
                debug!("crypto processing cancelled");
                self.discard();
                return Err(CryptoHelperError::Cancelled);
            }
            while self.pass != Pass::Finished && self.queue.is_empty() {
                self.set_state(CryptoHelperState::Discovering);
                self.find_parts_for_next_pass(tree);
            }
            let Some(current) = self.queue.front().copied() else {
                self.set_state(CryptoHelperState::Done);
                return Ok(CryptoOutcome::Done(std::mem::take(&mut self.annotations)));
            };
            self.set_state(CryptoHelperState::Queued);

            if !self.provider.is_bound() {
                self.set_state(CryptoHelperState::AwaitingConnection);
                let provider = Arc::clone(&self.provider);
                let Some(connected) = with_cancel(&self.cancel, provider.connect()).await else {
                    continue;
                };
                if let Err(e) = connected {
                    warn!(code = e.code, message = %e.message, "crypto provider unavailable");
                    while let Some(remaining) = self.queue.pop_front() {
                        self.record(
                            remaining.part,
                            CryptoResultAnnotation::error(CryptoError::OpenPgpProviderUnavailable, None),
                        );
                    }
                    self.pass = Pass::Finished;
                    continue;
                }
            }

            self.set_state(CryptoHelperState::ProcessingPart);
            let operation = self.build_operation(tree, current);
            let provider = Arc::clone(&self.provider);
            let Some(result) = with_cancel(&self.cancel, provider.execute(operation)).await else {
                continue;
            };
            match result {
                CryptoProviderResult::UserInteractionRequired(token) => {
                    self.set_state(CryptoHelperState::AwaitingUserInteraction);
                    return Ok(CryptoOutcome::UserInteractionRequired(token));
                }
                CryptoProviderResult::Success {
                    output,
                    decryption,
                    signature,
                } => {
                    let annotation = match self.replacement_for_output(tree, current, output) {
                        Ok(replacement) => CryptoResultAnnotation::success(decryption, signature, replacement),
                        Err(e) => {
                            warn!(part = current.part.index(), error = %e, "decrypted content is unusable");
                            CryptoResultAnnotation::error(CryptoError::OpenPgpApiReturnedError, None)
                        }
                    };
                    self.record(current.part, annotation);
                }
                CryptoProviderResult::Error(error) => {
                    warn!(part = current.part.index(), code = error.code, message = %error.message, "crypto provider error");
                    let replacement = match current.kind {
                        CryptoPartType::PgpSigned => signed_content_part(tree, current.part),
                        _ => None,
                    };
                    self.record(current.part, CryptoResultAnnotation::provider_error(error, replacement));
                }
            }
            self.queue.pop_front();
        }
    }

    fn find_parts_for_next_pass(&mut self, tree: &mut PartTree) {
        match self.pass {
            Pass::Start => {
                self.pass = Pass::Encryption;
                self.find_parts_for_multipart_encryption_pass(tree);
            }
            Pass::Encryption => {
                self.pass = Pass::SignaturesAndInline;
                self.find_parts_for_multipart_signature_pass(tree);
                self.find_parts_for_pgp_inline_pass(tree);
            }
            Pass::SignaturesAndInline | Pass::Finished => self.pass = Pass::Finished,
        }
    }

    fn find_parts_for_multipart_encryption_pass(&mut self, tree: &mut PartTree) {
        for part in find_multipart_encrypted_parts(tree, tree.root()) {
            if !tree.is_complete_part_available(part) {
                let empty = empty_part(tree);
                self.record(part, CryptoResultAnnotation::error(CryptoError::OpenPgpEncryptedButIncomplete, Some(empty)));
            } else if is_multipart_encrypted_openpgp_protocol(tree, part) {
                self.enqueue(CryptoPartType::PgpEncrypted, part);
            } else {
                let empty = empty_part(tree);
                self.record(part, CryptoResultAnnotation::error(CryptoError::EncryptedButUnsupported, Some(empty)));
            }
        }
    }

    fn find_parts_for_multipart_signature_pass(&mut self, tree: &mut PartTree) {
        for part in find_multipart_signed_parts(tree, tree.root(), &self.annotations) {
            if !self.process_signed_only && self.annotations.find_key_for_annotation_with_replacement(part).is_none() {
                continue;
            }
            if !tree.is_complete_part_available(part) {
                let replacement = signed_content_part(tree, part);
                self.record(part, CryptoResultAnnotation::error(CryptoError::OpenPgpSignedButIncomplete, replacement));
            } else if is_multipart_signed_openpgp_protocol(tree, part) {
                self.enqueue(CryptoPartType::PgpSigned, part);
            } else {
                let replacement = signed_content_part(tree, part);
                self.record(part, CryptoResultAnnotation::error(CryptoError::SignedButUnsupported, replacement));
            }
        }
    }

    fn find_parts_for_pgp_inline_pass(&mut self, tree: &mut PartTree) {
        for part in find_pgp_inline_parts(tree, tree.root()) {
            let encrypted = is_part_pgp_inline_encrypted(tree, part);
            if !self.process_signed_only && !encrypted {
                continue;
            }
            if !tree.is_complete_part_available(part) {
                let annotation = if encrypted {
                    CryptoResultAnnotation::error(CryptoError::OpenPgpEncryptedButIncomplete, None)
                } else {
                    let replacement = get_text_from_part(tree, part)
                        .and_then(|t| extract_clearsigned_text(&t))
                        .map(|t| tree.new_body_part(Body::text(t), "text/plain"));
                    CryptoResultAnnotation::error(CryptoError::OpenPgpSignedButIncomplete, replacement)
                };
                self.record(part, annotation);
                continue;
            }
            self.enqueue(CryptoPartType::PgpInline, part);
        }
    }

    fn enqueue(&mut self, kind: CryptoPartType, part: PartId) {
        debug!(?kind, part = part.index(), "crypto part queued");
        self.queue.push_back(CryptoPart { kind, part });
    }

    /// Store an annotation. A signature result on a part that replaces another one is
    /// also attached to the annotation of the part it replaces.
    fn record(&mut self, part: PartId, annotation: CryptoResultAnnotation) {
        debug!(part = part.index(), result = annotation.error_type().as_str(), "crypto annotation recorded");
        if annotation.has_signature_result() {
            if let Some(encapsulating) = self.annotations.find_key_for_annotation_with_replacement(part) {
                if let Some(outer) = self.annotations.get_mut(encapsulating) {
                    outer.encapsulated_result = Some(Box::new(annotation.clone()));
                }
            }
        }
        self.annotations.put(part, annotation);
    }

    fn build_operation(&mut self, tree: &PartTree, current: CryptoPart) -> CryptoOperation {
        let interaction = self.interaction.take();
        let (request, input) = match current.kind {
            CryptoPartType::PgpSigned => {
                let signature = signature_data(tree, current.part).ok().flatten().unwrap_or_default();
                let content = signed_content_part(tree, current.part).map(|p| tree.extract_subtree(p));
                let (input, _) = spawn_producer(move |w| match content {
                    Some(subtree) => subtree.write_to(subtree.root(), w),
                    None => Err(io::Error::new(io::ErrorKind::NotFound, "signed content missing")),
                });
                (CryptoRequest::DetachedVerify { signature }, input)
            }
            CryptoPartType::PgpEncrypted => {
                let payload = tree
                    .multipart(current.part)
                    .and_then(|m| m.body_part(1))
                    .and_then(|p| tree.body(p))
                    .cloned();
                let (input, _) = spawn_producer(move |w| match payload {
                    Some(body) => io::copy(&mut body.decoded_reader()?, w).map(|_| ()),
                    None => Err(io::Error::new(io::ErrorKind::NotFound, "encrypted payload missing")),
                });
                (CryptoRequest::DecryptVerify, input)
            }
            CryptoPartType::PgpInline => {
                let text = get_text_from_part(tree, current.part).unwrap_or_default();
                let (input, _) = spawn_producer(move |w| w.write_all(text.as_bytes()));
                (CryptoRequest::InlineDecryptVerify, input)
            }
        };
        CryptoOperation {
            request,
            input,
            interaction,
        }
    }

    /// Part holding the provider's output: the parsed entity for PGP/MIME, a text part for
    /// PGP/INLINE. Verified signed parts are rendered from their own content.
    fn replacement_for_output(
        &self,
        tree: &mut PartTree,
        current: CryptoPart,
        output: Option<Vec<u8>>,
    ) -> Result<Option<PartId>, crate::store::MessagingError> {
        let Some(output) = output else {
            return Ok(None);
        };
        match current.kind {
            CryptoPartType::PgpSigned => Ok(None),
            CryptoPartType::PgpEncrypted => {
                let decrypted = PartTree::parse_with(&output, &self.factory)?;
                Ok(Some(tree.graft(decrypted)))
            }
            CryptoPartType::PgpInline => {
                let text = String::from_utf8_lossy(&output).into_owned();
                Ok(Some(tree.new_body_part(Body::text(text), "text/plain")))
            }
        }
    }
}

/// First child of a `multipart/signed`.
fn signed_content_part(tree: &PartTree, part: PartId) -> Option<PartId> {
    tree.multipart(part).and_then(|m| m.body_part(0))
}

fn empty_part(tree: &mut PartTree) -> PartId {
    tree.new_body_part(Body::text(""), "text/plain")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_handle_wakes_waiter() {
        let handle = CancelHandle::default();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { with_cancel(&waiter, std::future::pending::<()>()).await });
        tokio::task::yield_now().await;
        handle.cancel();
        assert_eq!(task.await.unwrap(), None);
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!handle.is_cancelled());
    }
}
