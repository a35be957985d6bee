//! Verification of signed documents.
//!
//! Every digest is recomputed from the document itself and compared with the recorded value
//! for its own channel, then the signature is checked against the certificate embedded in
//! the key info.
use crate::config::SigningConfig;
use crate::credentials::{self, CryptoError};
use crate::digest::{self, Digest, DocDigest, PropsDigest};
use crate::document::{CleanDocument, Document, Node, StructuralError};
use crate::signing::assemble::SlotIndex;
use crate::signing::signed_info::SignatureValue;
use crate::signing::template::Slot;
use crate::Result;
use rsa::pkcs1v15::Signature;
use rsa::signature::hazmat::PrehashVerifier;
use thiserror::Error;

const CERT_DIGEST_PATH: [&str; 5] = [
    "SignedSignatureProperties",
    "SigningCertificate",
    "Cert",
    "CertDigest",
    "DigestValue",
];
const SIGNING_TIME_PATH: [&str; 2] = ["SignedSignatureProperties", "SigningTime"];

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("document digest mismatch: recorded {expected}, computed {actual}")]
    DocDigestMismatch { expected: String, actual: String },
    #[error("signed properties digest mismatch: recorded {expected}, computed {actual}")]
    PropsDigestMismatch { expected: String, actual: String },
    #[error("certificate digest mismatch: recorded {expected}, computed {actual}")]
    CertificateDigestMismatch { expected: String, actual: String },
    #[error("transport hash mismatch: recorded {expected}, computed {actual}")]
    TransportHashMismatch { expected: String, actual: String },
    #[error("signed properties are missing `{field}`")]
    MissingProperty { field: &'static str },
    #[error("signature value does not verify against the embedded certificate")]
    SignatureInvalid,
}

/// Summary of a successfully verified signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    pub doc_digest: DocDigest,
    pub props_digest: PropsDigest,
    pub certificate_digest: Digest,
    pub signing_time: String,
}

/// # Examples
/// ```rust,no_run
/// use invois_core::config::{DocumentFamily, SigningConfig};
/// use invois_core::document::xml;
/// use invois_core::verify::verify;
///
/// let document = xml::parse(&std::fs::read_to_string("signed.xml")?)?;
/// let verified = verify(&document, &SigningConfig::for_family(DocumentFamily::Xml))?;
/// println!("signed at {}", verified.signing_time);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn verify(document: &Document, config: &SigningConfig) -> Result<VerifiedSignature> {
    config.validate()?;
    let canonicalizer = config.canonicalizer();
    let index = SlotIndex::build(document);
    index.require_all()?;

    let recorded_doc = DocDigest::from_base64(&slot_text(document, &index, Slot::DocDigestValue)?)?;
    let recorded_props =
        PropsDigest::from_base64(&slot_text(document, &index, Slot::PropsDigestValue)?)?;
    let signature =
        SignatureValue::from_base64(&slot_text(document, &index, Slot::SignatureValue)?)?;
    let certificate_der = digest::decode_base64(
        "embedded certificate",
        &slot_text(document, &index, Slot::Certificate)?,
    )?;

    let clean = CleanDocument::strip(document);
    let actual_doc = DocDigest::new(Digest::of(
        &canonicalizer.canonicalize(clean.as_document())?,
    ));
    if actual_doc != recorded_doc {
        return Err(VerificationError::DocDigestMismatch {
            expected: recorded_doc.to_base64(),
            actual: actual_doc.to_base64(),
        }
        .into());
    }

    let properties = element(document, &index, Slot::SignedProperties)?;
    let actual_props = PropsDigest::new(Digest::of(&canonicalizer.canonicalize_element(&properties)?));
    if actual_props != recorded_props {
        return Err(VerificationError::PropsDigestMismatch {
            expected: recorded_props.to_base64(),
            actual: actual_props.to_base64(),
        }
        .into());
    }

    let certificate_digest = Digest::of(&certificate_der);
    let recorded_cert = descend_text(properties.node, &CERT_DIGEST_PATH)
        .ok_or(VerificationError::MissingProperty { field: "CertDigest" })?;
    if recorded_cert != certificate_digest.to_base64() {
        return Err(VerificationError::CertificateDigestMismatch {
            expected: recorded_cert,
            actual: certificate_digest.to_base64(),
        }
        .into());
    }
    let signing_time = descend_text(properties.node, &SIGNING_TIME_PATH)
        .ok_or(VerificationError::MissingProperty { field: "SigningTime" })?;

    let signed_info = element(document, &index, Slot::SignedInfo)?;
    let hash = Digest::of(&canonicalizer.canonicalize_element(&signed_info)?);
    let verifying_key = credentials::verifying_key_from_der(&certificate_der)?;
    let signature = Signature::try_from(signature.as_bytes()).map_err(|e| {
        CryptoError::MalformedSignature {
            message: e.to_string(),
        }
    })?;
    verifying_key
        .verify_prehash(hash.as_bytes(), &signature)
        .map_err(|_| VerificationError::SignatureInvalid)?;

    log::info!("verified signature over document digest {actual_doc}");
    Ok(VerifiedSignature {
        doc_digest: actual_doc,
        props_digest: actual_props,
        certificate_digest,
        signing_time,
    })
}

fn slot_text(document: &Document, index: &SlotIndex, slot: Slot) -> Result<String> {
    let node = document
        .node_at(index.require(slot)?)
        .ok_or(StructuralError::SlotCardinality { slot, found: 0 })?;
    match node.text_value() {
        Some(scalar) => Ok(scalar.render().into_owned()),
        None => Err(StructuralError::SlotNotText { slot }.into()),
    }
}

fn element<'d>(
    document: &'d Document,
    index: &SlotIndex,
    slot: Slot,
) -> Result<crate::document::ElementRef<'d>> {
    let position = index.require(slot)?;
    Ok(document
        .element_at(position)
        .ok_or(StructuralError::SlotCardinality { slot, found: 0 })?)
}

fn descend_text(node: &Node, path: &[&str]) -> Option<String> {
    let target = path.iter().try_fold(node, |current, local| {
        current.field(local).and_then(|field| field.values().first())
    })?;
    target.text_value().map(|scalar| scalar.render().into_owned())
}
