/*
 * crypto_helper.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Crypto processing against a scripted provider: decryption, verification, interactive
 * steps, provider failures and cancellation.
 */

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::AsyncReadExt;

use carteggio_core::crypto::{
    CryptoError, CryptoHelperError, CryptoHelperState, CryptoOperation, CryptoOutcome, CryptoProvider,
    CryptoProviderResult, CryptoRequest, DecryptionResult, MessageCryptoHelper, ProviderError, SignatureResult,
    UserInteractionResult, UserInteractionToken,
};
use carteggio_core::mime::{BodyFactory, PartStorage, PartTree};
use carteggio_core::view::{extract_message_for_view, ViewOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Seen {
    request: CryptoRequest,
    input: Vec<u8>,
    interaction: Option<Vec<u8>>,
}

/// Answers requests from a script; an empty script never answers.
#[derive(Default)]
struct ScriptedProvider {
    bound: AtomicBool,
    refuse_connection: bool,
    connects: AtomicUsize,
    script: Mutex<VecDeque<CryptoProviderResult>>,
    seen: Mutex<Vec<Seen>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    fn with_script(results: Vec<CryptoProviderResult>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results.into()),
            ..Default::default()
        })
    }

    fn push(&self, result: CryptoProviderResult) {
        self.script.lock().unwrap().push_back(result);
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl CryptoProvider for ScriptedProvider {
    fn is_bound(&self) -> bool {
        self.bound.load(Ordering::SeqCst)
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<(), ProviderError>> + Send + '_>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse_connection {
                return Err(ProviderError {
                    code: 1,
                    message: "service not installed".into(),
                });
            }
            self.bound.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn execute(&self, mut operation: CryptoOperation) -> Pin<Box<dyn Future<Output = CryptoProviderResult> + Send + '_>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let mut input = Vec::new();
            operation.input.read_to_end(&mut input).await.unwrap();
            self.seen.lock().unwrap().push(Seen {
                request: operation.request.clone(),
                input,
                interaction: operation.interaction.take(),
            });
            let next = self.script.lock().unwrap().pop_front();
            let result = match next {
                Some(result) => result,
                None => std::future::pending().await,
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}

const ENCRYPTED: &[u8] = b"Subject: encrypted\r\n\
Content-Type: multipart/encrypted; protocol=\"application/pgp-encrypted\"; boundary=\"b\"\r\n\r\n\
--b\r\nContent-Type: application/pgp-encrypted\r\n\r\nVersion: 1\r\n\
--b\r\nContent-Type: application/octet-stream\r\n\r\nciphertext\r\n\
--b--\r\n";

const SIGNED: &[u8] = b"Content-Type: multipart/signed; protocol=\"application/pgp-signature\"; micalg=pgp-sha256; boundary=\"s\"\r\n\r\n\
--s\r\nContent-Type: text/plain\r\n\r\nsigned text\r\n\
--s\r\nContent-Type: application/pgp-signature\r\n\r\nsig\r\n\
--s--\r\n";

fn decrypted(output: &[u8]) -> CryptoProviderResult {
    CryptoProviderResult::Success {
        output: Some(output.to_vec()),
        decryption: Some(DecryptionResult { encrypted: true }),
        signature: None,
    }
}

fn verified() -> CryptoProviderResult {
    CryptoProviderResult::Success {
        output: None,
        decryption: None,
        signature: Some(SignatureResult {
            valid: true,
            signer_user_id: Some("Alice <alice@example.org>".into()),
            key_id: Some(0x1234),
        }),
    }
}

fn helper(provider: &Arc<ScriptedProvider>) -> MessageCryptoHelper<ScriptedProvider> {
    MessageCryptoHelper::new(Arc::clone(provider), BodyFactory::default(), true)
}

fn done(outcome: CryptoOutcome) -> carteggio_core::crypto::MessageCryptoAnnotations {
    match outcome {
        CryptoOutcome::Done(annotations) => annotations,
        other => panic!("not done: {:?}", other),
    }
}

#[tokio::test]
async fn encrypted_message_is_decrypted_and_rendered() {
    let provider = ScriptedProvider::with_script(vec![decrypted(
        b"Content-Type: text/plain; protected-headers=v1\r\nSubject: real subject\r\n\r\nsecret text",
    )]);
    let mut tree = PartTree::parse(ENCRYPTED).unwrap();
    let mut helper = helper(&provider);
    let annotations = done(helper.start(&mut tree).await.unwrap());
    assert_eq!(helper.state(), CryptoHelperState::Done);
    assert_eq!(provider.connects.load(Ordering::SeqCst), 1);

    let seen = provider.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].request, CryptoRequest::DecryptVerify);
    assert_eq!(seen[0].input, b"ciphertext");

    let annotation = annotations.get(tree.root()).expect("root annotated");
    assert_eq!(annotation.error_type(), CryptoError::OpenPgpOk);
    assert!(annotation.has_replacement());

    let options = ViewOptions {
        openpgp_provider_configured: true,
        prefer_html: true,
    };
    let info = extract_message_for_view(&tree, Some(&annotations), &options);
    assert_eq!(info.text.as_deref(), Some("secret text"));
    assert_eq!(info.subject.as_deref(), Some("real subject"));
    assert!(info.is_subject_encrypted);
}

#[tokio::test]
async fn repeated_runs_do_not_grow_the_tree() {
    let output: &[u8] = b"Content-Type: text/plain\r\n\r\nsecret text";
    let provider = ScriptedProvider::with_script(vec![decrypted(output), decrypted(output), decrypted(output)]);
    let mut tree = PartTree::parse(ENCRYPTED).unwrap();
    let original = tree.len();
    let mut helper = helper(&provider);

    done(helper.start(&mut tree).await.unwrap());
    let after_first = tree.len();
    assert!(after_first > original);
    for _ in 0..2 {
        let annotations = done(helper.start(&mut tree).await.unwrap());
        assert_eq!(tree.len(), after_first);
        let options = ViewOptions {
            openpgp_provider_configured: true,
            prefer_html: false,
        };
        let info = extract_message_for_view(&tree, Some(&annotations), &options);
        assert_eq!(info.text.as_deref(), Some("secret text"));
    }
}

#[tokio::test]
async fn signed_message_is_verified_from_stream() {
    let provider = ScriptedProvider::with_script(vec![verified()]);
    let mut tree = PartTree::parse(SIGNED).unwrap();
    let annotations = done(helper(&provider).start(&mut tree).await.unwrap());

    let seen = provider.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].request,
        CryptoRequest::DetachedVerify {
            signature: b"sig".to_vec()
        }
    );
    assert!(seen[0].input.starts_with(b"Content-Type: text/plain\r\n\r\n"));
    assert!(seen[0].input.ends_with(b"signed text"));

    let annotation = annotations.get(tree.root()).unwrap();
    assert!(annotation.signature_result().is_some_and(|s| s.valid));
}

#[tokio::test]
async fn signed_only_parts_skipped_when_disabled() {
    let provider = ScriptedProvider::with_script(vec![]);
    let mut tree = PartTree::parse(SIGNED).unwrap();
    let mut helper = MessageCryptoHelper::new(Arc::clone(&provider), BodyFactory::default(), false);
    let annotations = done(helper.start(&mut tree).await.unwrap());
    assert!(annotations.is_empty());
    assert!(provider.seen().is_empty());
}

#[tokio::test]
async fn user_interaction_retries_same_part() {
    let provider = ScriptedProvider::with_script(vec![
        CryptoProviderResult::UserInteractionRequired(UserInteractionToken(b"passphrase?".to_vec())),
        decrypted(b"Content-Type: text/plain\r\n\r\nsecret"),
    ]);
    let mut tree = PartTree::parse(ENCRYPTED).unwrap();
    let mut helper = helper(&provider);
    match helper.start(&mut tree).await.unwrap() {
        CryptoOutcome::UserInteractionRequired(token) => assert_eq!(token.0, b"passphrase?"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(helper.state(), CryptoHelperState::AwaitingUserInteraction);

    let annotations = done(
        helper
            .resume(&mut tree, UserInteractionResult::Completed(b"hunter2".to_vec()))
            .await
            .unwrap(),
    );
    let seen = provider.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].request, seen[1].request);
    assert_eq!(seen[1].input, b"ciphertext");
    assert_eq!(seen[0].interaction, None);
    assert_eq!(seen[1].interaction.as_deref(), Some(&b"hunter2"[..]));
    assert_eq!(annotations.len(), 1);

    assert_eq!(
        helper
            .resume(&mut tree, UserInteractionResult::Completed(Vec::new()))
            .await
            .unwrap_err(),
        CryptoHelperError::InvalidState(CryptoHelperState::Done)
    );
}

#[tokio::test]
async fn cancelled_interaction_is_recorded() {
    let provider = ScriptedProvider::with_script(vec![CryptoProviderResult::UserInteractionRequired(
        UserInteractionToken(Vec::new()),
    )]);
    let mut tree = PartTree::parse(SIGNED).unwrap();
    let mut helper = helper(&provider);
    helper.start(&mut tree).await.unwrap();
    let annotations = done(helper.resume(&mut tree, UserInteractionResult::Cancelled).await.unwrap());
    let annotation = annotations.get(tree.root()).unwrap();
    assert_eq!(annotation.error_type(), CryptoError::OpenPgpUiCanceled);
    assert_eq!(annotation.replacement, Some(tree.children(tree.root())[0]));
}

#[tokio::test]
async fn provider_error_becomes_annotation() {
    let provider = ScriptedProvider::with_script(vec![CryptoProviderResult::Error(ProviderError {
        code: 7,
        message: "no secret key".into(),
    })]);
    let mut tree = PartTree::parse(ENCRYPTED).unwrap();
    let annotations = done(helper(&provider).start(&mut tree).await.unwrap());
    let annotation = annotations.get(tree.root()).unwrap();
    assert_eq!(annotation.error_type(), CryptoError::OpenPgpApiReturnedError);
}

#[tokio::test]
async fn unreachable_provider_marks_parts_unavailable() {
    let provider = Arc::new(ScriptedProvider {
        refuse_connection: true,
        ..Default::default()
    });
    let mut tree = PartTree::parse(ENCRYPTED).unwrap();
    let annotations = done(helper(&provider).start(&mut tree).await.unwrap());
    assert_eq!(
        annotations.get(tree.root()).map(|a| a.error_type()),
        Some(CryptoError::OpenPgpProviderUnavailable)
    );
    assert!(provider.seen().is_empty());
}

#[tokio::test]
async fn incomplete_encrypted_message_is_not_queued() {
    let provider = ScriptedProvider::with_script(vec![]);
    let mut tree = PartTree::parse(ENCRYPTED).unwrap();
    let payload = tree.children(tree.root())[1];
    tree.set_storage(payload, PartStorage::Local { part_id: 2, size: 0 });
    let annotations = done(helper(&provider).start(&mut tree).await.unwrap());
    let annotation = annotations.get(tree.root()).unwrap();
    assert_eq!(annotation.error_type(), CryptoError::OpenPgpEncryptedButIncomplete);
    assert!(annotation.has_replacement());
    assert!(provider.seen().is_empty());
}

#[tokio::test]
async fn inline_parts_processed_one_at_a_time() {
    let message = b"Content-Type: multipart/mixed; boundary=\"m\"\r\n\r\n\
--m\r\nContent-Type: text/plain\r\n\r\n-----BEGIN PGP MESSAGE-----\r\none\r\n-----END PGP MESSAGE-----\r\n\
--m\r\nContent-Type: text/plain\r\n\r\n-----BEGIN PGP MESSAGE-----\r\ntwo\r\n-----END PGP MESSAGE-----\r\n\
--m--\r\n";
    let provider = ScriptedProvider::with_script(vec![decrypted(b"first"), decrypted(b"second")]);
    let mut tree = PartTree::parse(message).unwrap();
    let annotations = done(helper(&provider).start(&mut tree).await.unwrap());

    let parts = tree.children(tree.root());
    let mut keys: Vec<_> = annotations.parts().collect();
    keys.sort();
    assert_eq!(keys, parts);
    assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(provider
        .seen()
        .iter()
        .all(|s| s.request == CryptoRequest::InlineDecryptVerify));
}

#[tokio::test]
async fn cancel_discards_state_and_restart_works() {
    let provider = ScriptedProvider::with_script(vec![]);
    let mut tree = PartTree::parse(ENCRYPTED).unwrap();
    let mut helper = helper(&provider);
    let handle = helper.cancel_handle();
    let (result, _) = tokio::join!(helper.start(&mut tree), async {
        while provider.seen().is_empty() {
            tokio::task::yield_now().await;
        }
        handle.cancel();
    });
    assert_eq!(result.unwrap_err(), CryptoHelperError::Cancelled);
    assert_eq!(helper.state(), CryptoHelperState::Idle);

    provider.push(decrypted(b"Content-Type: text/plain\r\n\r\nsecret"));
    let annotations = done(helper.start(&mut tree).await.unwrap());
    assert_eq!(annotations.len(), 1);
    assert_eq!(provider.seen().len(), 2);
}
