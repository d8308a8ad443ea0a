/*
 * view_extraction.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * End-to-end extraction of what is shown for a message: plain, flowed, encrypted without
 * a provider, and composed messages read back after serialization.
 */

use carteggio_core::crypto::CryptoError;
use carteggio_core::mime::{Body, Multipart, PartTree};
use carteggio_core::view::{extract_message_for_view, ViewOptions};

#[test]
fn plain_text_message() {
    let tree = PartTree::parse(b"Content-Type: text/plain\r\n\r\nK-9 Mail rocks :>").unwrap();
    let info = extract_message_for_view(&tree, None, &ViewOptions::default());
    assert_eq!(info.html.as_deref(), Some("<pre dir=\"auto\" class=\"k9mail\">K-9 Mail rocks :&gt;</pre>"));
    assert_eq!(info.text.as_deref(), Some("K-9 Mail rocks :>"));
    assert_eq!(info.attachments.as_deref().map(<[_]>::len), Some(0));
}

#[test]
fn flowed_text_message() {
    let tree = PartTree::parse(
        b"Content-Type: text/plain; format=flowed\r\n\r\nK-9 Mail rocks :> \r\nflowed line\r\nnot flowed line",
    )
    .unwrap();
    let info = extract_message_for_view(&tree, None, &ViewOptions::default());
    assert_eq!(info.text.as_deref(), Some("K-9 Mail rocks :> flowed line\r\nnot flowed line"));
}

#[test]
fn encrypted_message_without_provider() {
    let tree = PartTree::parse(
        b"Content-Type: multipart/encrypted; protocol=\"application/pgp-encrypted\"; boundary=\"b\"\r\n\r\n\
--b\r\nContent-Type: application/pgp-encrypted\r\n\r\nVersion: 1\r\n\
--b\r\nContent-Type: application/octet-stream\r\n\r\n-----BEGIN PGP MESSAGE-----\r\n\
--b--\r\n",
    )
    .unwrap();
    let info = extract_message_for_view(&tree, None, &ViewOptions::default());
    let annotation = info.crypto_result_annotation.expect("annotation");
    assert_eq!(annotation.error_type(), CryptoError::OpenPgpEncryptedNoProvider);
    assert_eq!(annotation.error_type().as_str(), "OPENPGP_ENCRYPTED_NO_PROVIDER");
    assert!(info.text.is_none());
    assert!(info.html.is_none());
    assert!(info.attachments.is_none());
    assert_eq!(info.root_part, tree.root());

    let options = ViewOptions {
        openpgp_provider_configured: true,
        prefer_html: true,
    };
    let info = extract_message_for_view(&tree, None, &options);
    assert_eq!(
        info.crypto_result_annotation.map(|a| a.error_type()),
        Some(CryptoError::OpenPgpEncryptedNoProvider)
    );
}

#[test]
fn composed_message_survives_round_trip() {
    let mut tree = PartTree::new_message();
    let root = tree.root();
    tree.header_mut(root).set("Subject", "Grüße aus Köln");
    tree.set_body(root, Body::Multipart(Multipart::new("mixed")));
    let text = tree.new_body_part(Body::text("Hallo Welt\r\n> zitiert\r\nEnde"), "text/plain");
    tree.add_part(root, text).unwrap();
    let attachment = tree.new_body_part(Body::text("a,b\r\n1,2\r\n"), "text/csv");
    tree.header_mut(attachment)
        .set("Content-Disposition", "attachment; filename=\"data.csv\"");
    tree.add_part(root, attachment).unwrap();

    let before = extract_message_for_view(&tree, None, &ViewOptions::default());
    let bytes = tree.to_bytes(root).unwrap();
    let reparsed = PartTree::parse(&bytes).unwrap();
    let after = extract_message_for_view(&reparsed, None, &ViewOptions::default());

    assert_eq!(before.text, after.text);
    assert_eq!(before.html, after.html);
    assert_eq!(after.subject.as_deref(), Some("Grüße aus Köln"));
    let attachments = after.attachments.unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].display_name, "data.csv");
    assert_eq!(attachments[0].mime_type, "text/csv");
}

#[test]
fn non_ascii_header_values_survive_round_trip() {
    let mut tree = PartTree::new_message();
    let root = tree.root();
    tree.header_mut(root).set("Subject", "Résumé für Zoë");
    tree.header_mut(root).set("From", "\"Zoë Ünal\" <zoe@example.com>");
    tree.set_body(root, Body::Multipart(Multipart::new("mixed")));
    let text = tree.new_body_part(Body::text("see attached"), "text/plain");
    tree.add_part(root, text).unwrap();
    let attachment = tree.new_body_part(Body::text("Zoë\r\n"), "text/plain");
    tree.header_mut(attachment)
        .set("Content-Type", "text/plain; charset=utf-8; name=\"résumé.txt\"");
    tree.header_mut(attachment)
        .set("Content-Disposition", "attachment; filename=\"résumé.txt\"");
    tree.add_part(root, attachment).unwrap();

    let bytes = tree.to_bytes(root).unwrap();
    let wire = String::from_utf8(bytes.clone()).unwrap();
    assert!(wire.contains("name*=utf-8''r%C3%A9sum%C3%A9.txt"));
    assert!(wire.contains("filename*=utf-8''r%C3%A9sum%C3%A9.txt"));
    assert!(wire.contains("<zoe@example.com>"));

    let reparsed = PartTree::parse(&bytes).unwrap();
    let attachment = reparsed.children(reparsed.root())[1];
    let content_type = reparsed.content_type(attachment).expect("parseable Content-Type");
    assert_eq!(content_type.mime_type(), "text/plain");
    assert_eq!(content_type.get_parameter("charset"), Some("utf-8"));
    assert_eq!(content_type.get_parameter("name"), Some("résumé.txt"));
    assert_eq!(
        reparsed.disposition(attachment).and_then(|d| d.filename()).as_deref(),
        Some("résumé.txt")
    );
    assert_eq!(
        reparsed.header(reparsed.root()).first_decoded("From").as_deref(),
        Some("Zoë Ünal <zoe@example.com>")
    );

    let info = extract_message_for_view(&reparsed, None, &ViewOptions::default());
    assert_eq!(info.subject.as_deref(), Some("Résumé für Zoë"));
    let attachments = info.attachments.unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].display_name, "résumé.txt");
}

#[test]
fn extra_parts_next_to_signed_content() {
    let tree = PartTree::parse(
        b"Content-Type: multipart/mixed; boundary=\"outer\"\r\n\r\n\
--outer\r\nContent-Type: multipart/signed; protocol=\"application/pgp-signature\"; boundary=\"s\"\r\n\r\n\
--s\r\nContent-Type: text/plain\r\n\r\nsigned text\r\n\
--s\r\nContent-Type: application/pgp-signature\r\n\r\nsig\r\n\
--s--\r\n\
--outer\r\nContent-Type: text/plain\r\n\r\nfooter added by list\r\n\
--outer--\r\n",
    )
    .unwrap();
    let mut annotations = carteggio_core::crypto::MessageCryptoAnnotations::new();
    let signed = tree.children(tree.root())[0];
    annotations.put(
        signed,
        carteggio_core::crypto::CryptoResultAnnotation::success(None, None, None),
    );
    let info = extract_message_for_view(&tree, Some(&annotations), &ViewOptions::default());
    assert_eq!(info.text.as_deref(), Some("signed text"));
    assert_eq!(info.extra_text.as_deref(), Some("footer added by list"));
    assert_eq!(info.root_part, signed);
}
