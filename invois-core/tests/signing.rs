mod common;

use invois_core::canonical::CanonicalizationMethod;
use invois_core::config::{DocumentFamily, SigningConfig};
use invois_core::document::{json, xml, CleanDocument, Document, Node, StructuralError};
use invois_core::signing::assemble::SlotIndex;
use invois_core::signing::template::Slot;
use invois_core::signing::{DocumentSigner, SignedArtifact, SigningStage};
use invois_core::verify::verify;
use invois_core::Error;

fn clean_fixture(family: DocumentFamily) -> CleanDocument {
    let path = match family {
        DocumentFamily::Json => "documents/invoice.json",
        DocumentFamily::Xml => "documents/invoice.xml",
    };
    let document = family.parse(&common::fixture(path)).expect("parse fixture");
    CleanDocument::new(document).expect("clean fixture")
}

fn sign(family: DocumentFamily) -> SignedArtifact {
    let credentials = common::credentials();
    let signer =
        DocumentSigner::new(&credentials, SigningConfig::for_family(family)).expect("signer");
    signer
        .sign_at(clean_fixture(family), common::signing_time())
        .expect("sign fixture")
}

fn slot_text(document: &Document, slot: Slot) -> String {
    let index = SlotIndex::build(document);
    document
        .node_at(index.require(slot).expect("slot"))
        .and_then(Node::text_value)
        .expect("slot text")
        .render()
        .into_owned()
}

#[test]
fn signing_is_deterministic_for_a_fixed_time() {
    for family in [DocumentFamily::Json, DocumentFamily::Xml] {
        let first = sign(family).serialize().expect("serialize");
        let second = sign(family).serialize().expect("serialize");
        assert_eq!(first, second, "{family} output differs between runs");
    }
}

#[test]
fn shared_credentials_sign_documents_in_parallel() {
    let credentials = common::credentials();
    let outputs = std::thread::scope(|scope| {
        let handles: Vec<_> = [DocumentFamily::Json, DocumentFamily::Xml, DocumentFamily::Json]
            .into_iter()
            .map(|family| {
                let credentials = &credentials;
                scope.spawn(move || {
                    DocumentSigner::new(credentials, SigningConfig::for_family(family))
                        .and_then(|signer| signer.sign_at(clean_fixture(family), common::signing_time()))
                        .and_then(|signed| signed.serialize())
                        .expect("parallel signing")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("signing thread"))
            .collect::<Vec<_>>()
    });
    assert_eq!(outputs[0], outputs[2]);
    assert_eq!(outputs[0], sign(DocumentFamily::Json).serialize().expect("serialize"));
    assert_eq!(outputs[1], sign(DocumentFamily::Xml).serialize().expect("serialize"));
}

#[test]
fn signed_documents_verify() {
    for family in [DocumentFamily::Json, DocumentFamily::Xml] {
        let signed = sign(family);
        let verified = verify(signed.document(), &SigningConfig::for_family(family))
            .unwrap_or_else(|err| panic!("{family} signature does not verify: {err}"));
        assert_eq!(&verified.doc_digest, signed.doc_digest());
        assert_eq!(&verified.props_digest, signed.props_digest());
        assert_eq!(verified.signing_time, "2025-02-06T01:50:00Z");
        assert_eq!(verified.certificate_digest.to_base64(), common::CERTIFICATE_DIGEST);
    }
}

#[test]
fn slots_hold_the_artifact_values() {
    let signed = sign(DocumentFamily::Json);
    let document = signed.document();
    assert_eq!(slot_text(document, Slot::DocDigestValue), signed.doc_digest().to_base64());
    assert_eq!(slot_text(document, Slot::PropsDigestValue), signed.props_digest().to_base64());
    assert_eq!(
        slot_text(document, Slot::SignatureValue),
        signed.signature_value().to_base64()
    );
    assert_eq!(
        slot_text(document, Slot::Certificate),
        common::credentials().certificate_base64()
    );
}

#[test]
fn digest_channels_are_distinct() {
    for family in [DocumentFamily::Json, DocumentFamily::Xml] {
        let signed = sign(family);
        let doc = signed.doc_digest().to_base64();
        let props = signed.props_digest().to_base64();
        let cert = common::CERTIFICATE_DIGEST.to_string();
        let transport = signed.transport().expect("transport");
        assert_ne!(doc, props);
        assert_ne!(doc, cert);
        assert_ne!(props, cert);
        assert_ne!(transport.document_hash(), signed.doc_digest().digest().to_hex());
    }
}

#[test]
fn document_digest_ignores_an_existing_signature() {
    let signed = sign(DocumentFamily::Xml);
    let stripped = CleanDocument::strip(signed.document());
    assert_eq!(stripped.as_document(), clean_fixture(DocumentFamily::Xml).as_document());
}

#[test]
fn signed_document_is_not_clean() {
    let signed = sign(DocumentFamily::Json);
    let err = CleanDocument::new(signed.into_document()).expect_err("already signed");
    assert!(matches!(err, StructuralError::SignaturePresent { .. }));
}

#[test]
fn markup_signature_is_placed_after_additional_references() {
    let serialized = sign(DocumentFamily::Xml).serialize().expect("serialize");
    let reference = serialized.find("</cac:AdditionalDocumentReference>").expect("reference");
    let signature = serialized.find("<cac:Signature>").expect("document signature");
    let supplier = serialized.find("<cac:AccountingSupplierParty>").expect("supplier");
    assert!(serialized.contains("<ext:UBLExtensions "));
    assert!(reference < signature && signature < supplier);
}

#[test]
fn inclusive_canonicalization_is_an_explicit_choice() {
    let credentials = common::credentials();
    let config =
        SigningConfig::new(DocumentFamily::Xml, CanonicalizationMethod::InclusiveXml11)
            .expect("inclusive config");
    let signer = DocumentSigner::new(&credentials, config).expect("signer");
    let inclusive = signer
        .sign_at(clean_fixture(DocumentFamily::Xml), common::signing_time())
        .expect("sign");
    let exclusive = sign(DocumentFamily::Xml);

    assert_ne!(inclusive.signature_value(), exclusive.signature_value());
    verify(inclusive.document(), &config).expect("verifies with the chosen method");
    assert!(verify(inclusive.document(), &SigningConfig::for_family(DocumentFamily::Xml)).is_err());
}

#[test]
fn failures_report_the_stage() {
    let credentials = common::credentials();
    let signer = DocumentSigner::new(&credentials, SigningConfig::for_family(DocumentFamily::Json))
        .expect("signer");
    let party = Node::element()
        .with_attribute("ID", "attribute")
        .with_field("ID", Node::text("field"));
    let root = Node::element().with_field("AccountingSupplierParty", party);
    let clean = CleanDocument::new(Document::new("Invoice", root)).expect("clean");

    let err = signer.sign(clean).expect_err("duplicate key");
    assert_eq!(err.stage(), Some(SigningStage::DigestingDocument));
    assert!(matches!(
        err.root(),
        Error::Structural(StructuralError::DuplicateKey { .. })
    ));
}

#[test]
fn markup_with_unbound_prefix_fails_while_digesting() {
    let credentials = common::credentials();
    let signer = DocumentSigner::new(&credentials, SigningConfig::for_family(DocumentFamily::Xml))
        .expect("signer");
    let root = Node::element().with_field("foo:ID", Node::text("1"));
    let clean = CleanDocument::new(Document::new("Invoice", root)).expect("clean");
    let err = signer.sign(clean).expect_err("unbound prefix");
    assert_eq!(err.stage(), Some(SigningStage::DigestingDocument));
    assert!(matches!(
        err.root(),
        Error::Structural(StructuralError::UnboundPrefix { .. })
    ));
}

#[test]
fn incompatible_config_is_rejected_up_front() {
    let credentials = common::credentials();
    let config = SigningConfig::for_family(DocumentFamily::Json);
    let xml_config: Result<SigningConfig, _> =
        SigningConfig::new(DocumentFamily::Json, CanonicalizationMethod::ExclusiveXml);
    assert!(xml_config.is_err());
    assert!(DocumentSigner::new(&credentials, config).is_ok());
}

#[test]
fn invoice_records_sign_in_both_families() {
    let credentials = common::credentials();
    let invoice = common::dummy_finalized_invoice();
    for family in [DocumentFamily::Json, DocumentFamily::Xml] {
        let signed = invoice
            .sign(&credentials, SigningConfig::for_family(family))
            .expect("sign invoice");
        let serialized = signed.serialize().expect("serialize");
        let reparsed = match family {
            DocumentFamily::Json => json::parse(&serialized),
            DocumentFamily::Xml => xml::parse(&serialized),
        }
        .expect("reparse");
        verify(&reparsed, &SigningConfig::for_family(family)).expect("verify reparsed");
    }
}
