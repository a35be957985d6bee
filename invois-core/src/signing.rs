//! Staged signing pipeline.
//!
//! ```text
//! Clean -> DigestedDoc -> PropertiesBuilt -> PropertiesDigested -> Signed -> SignedArtifact
//! ```
//!
//! Each stage consumes the previous one, so digests cannot be computed out of order and a
//! template cannot be assembled twice. Any failure aborts the run and is reported with the
//! stage it happened in.
//!
//! # Examples
//! ```rust,no_run
//! use invois_core::config::{DocumentFamily, SigningConfig};
//! use invois_core::credentials::SigningCredentials;
//! use invois_core::document::{CleanDocument, json};
//! use invois_core::signing::DocumentSigner;
//!
//! let credentials = SigningCredentials::from_pem(
//!     &std::fs::read_to_string("signer-cert.pem")?,
//!     &std::fs::read_to_string("signer-key.pem")?,
//! )?;
//! let clean = CleanDocument::new(json::parse(&std::fs::read_to_string("invoice.json")?)?)?;
//! let signer = DocumentSigner::new(&credentials, SigningConfig::for_family(DocumentFamily::Json))?;
//! let signed = signer.sign(clean)?;
//! println!("{}", signed.serialize()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod assemble;
pub mod properties;
pub mod signed_info;
pub mod template;

use crate::canonical::{CanonicalizationMethod, Canonicalizer};
use crate::config::{DocumentFamily, SigningConfig};
use crate::credentials::SigningCredentials;
use crate::digest::{Digest, DocDigest, PropsDigest};
use crate::document::namespaces::Names;
use crate::document::{CleanDocument, Document, StructuralError};
use crate::transport::TransportEncoding;
use crate::{Error, Result};
use assemble::{FinalDocumentData, SlotIndex};
use properties::{SignedPropertiesData, SigningTime};
use signed_info::{SignatureValue, SignedInfo};
use std::fmt;
use template::Slot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningStage {
    DigestingDocument,
    BuildingProperties,
    DigestingProperties,
    Signing,
    Assembling,
}

impl SigningStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningStage::DigestingDocument => "document digest",
            SigningStage::BuildingProperties => "signed properties",
            SigningStage::DigestingProperties => "signed properties digest",
            SigningStage::Signing => "signature",
            SigningStage::Assembling => "assembly",
        }
    }
}

impl fmt::Display for SigningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signs clean documents of one family with one set of credentials.
pub struct DocumentSigner<'c> {
    credentials: &'c SigningCredentials,
    config: SigningConfig,
    canonicalizer: Box<dyn Canonicalizer>,
    names: Names,
}

impl<'c> DocumentSigner<'c> {
    pub fn new(credentials: &'c SigningCredentials, config: SigningConfig) -> Result<Self> {
        config.validate()?;
        if config.canonicalization() == CanonicalizationMethod::InclusiveXml11 {
            log::warn!(
                "signing with {}; receivers expecting exclusive canonicalization will reject these signatures",
                config.canonicalization()
            );
        }
        Ok(Self {
            credentials,
            canonicalizer: config.canonicalizer(),
            names: Names::new(config.family()),
            config,
        })
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    pub fn begin(&self, document: CleanDocument) -> Clean<'_> {
        Clean {
            signer: self,
            document,
        }
    }

    pub fn sign(&self, document: CleanDocument) -> Result<SignedArtifact> {
        self.sign_at(document, SigningTime::now())
    }

    /// Sign with a fixed signing time; the output is then fully deterministic.
    pub fn sign_at(&self, document: CleanDocument, signing_time: SigningTime) -> Result<SignedArtifact> {
        self.begin(document)
            .digest()?
            .build_properties(signing_time)?
            .digest_properties()?
            .sign()?
            .assemble()
    }
}

pub struct Clean<'a> {
    signer: &'a DocumentSigner<'a>,
    document: CleanDocument,
}

impl<'a> Clean<'a> {
    pub fn digest(self) -> Result<DigestedDoc<'a>> {
        let canonical = self
            .signer
            .canonicalizer
            .canonicalize(self.document.as_document())
            .map_err(|e| Error::at(SigningStage::DigestingDocument, e))?;
        let doc_digest = DocDigest::new(Digest::of(&canonical));
        log::debug!("document digest {doc_digest}");
        Ok(DigestedDoc {
            signer: self.signer,
            document: self.document,
            doc_digest,
        })
    }
}

pub struct DigestedDoc<'a> {
    signer: &'a DocumentSigner<'a>,
    document: CleanDocument,
    doc_digest: DocDigest,
}

impl<'a> DigestedDoc<'a> {
    pub fn doc_digest(&self) -> &DocDigest {
        &self.doc_digest
    }

    pub fn build_properties(self, signing_time: SigningTime) -> Result<PropertiesBuilt<'a>> {
        let stage = |e: StructuralError| Error::at(SigningStage::BuildingProperties, e);
        let signer = self.signer;
        let properties = SignedPropertiesData::new(signer.credentials, signing_time);
        let extension = template::signature_extension(
            &signer.names,
            signer.credentials,
            properties.to_node(&signer.names),
            signer.config.canonicalization(),
        );
        let document_signature = template::document_signature(&signer.names);
        let template =
            template::insert_signature(&signer.names, self.document, extension, document_signature)
                .map_err(stage)?;
        let index = SlotIndex::build(&template);
        index.require_all().map_err(stage)?;
        log::debug!("signed properties built for signing time {signing_time}");
        Ok(PropertiesBuilt {
            signer,
            template,
            index,
            doc_digest: self.doc_digest,
            properties,
        })
    }
}

pub struct PropertiesBuilt<'a> {
    signer: &'a DocumentSigner<'a>,
    template: Document,
    index: SlotIndex,
    doc_digest: DocDigest,
    properties: SignedPropertiesData,
}

impl<'a> PropertiesBuilt<'a> {
    pub fn template(&self) -> &Document {
        &self.template
    }

    pub fn properties(&self) -> &SignedPropertiesData {
        &self.properties
    }

    /// Digest the signed properties as they sit in the template, with inherited namespaces.
    pub fn digest_properties(self) -> Result<PropertiesDigested<'a>> {
        let stage = |e: StructuralError| Error::at(SigningStage::DigestingProperties, e);
        let position = self.index.require(Slot::SignedProperties).map_err(stage)?;
        let element = self
            .template
            .element_at(position)
            .ok_or(StructuralError::SlotCardinality {
                slot: Slot::SignedProperties,
                found: 0,
            })
            .map_err(stage)?;
        let canonical = self
            .signer
            .canonicalizer
            .canonicalize_element(&element)
            .map_err(stage)?;
        let props_digest = PropsDigest::new(Digest::of(&canonical));
        log::debug!("signed properties digest {props_digest}");
        Ok(PropertiesDigested {
            signer: self.signer,
            template: self.template,
            index: self.index,
            doc_digest: self.doc_digest,
            props_digest,
            properties: self.properties,
        })
    }
}

pub struct PropertiesDigested<'a> {
    signer: &'a DocumentSigner<'a>,
    template: Document,
    index: SlotIndex,
    doc_digest: DocDigest,
    props_digest: PropsDigest,
    properties: SignedPropertiesData,
}

impl<'a> PropertiesDigested<'a> {
    pub fn props_digest(&self) -> &PropsDigest {
        &self.props_digest
    }

    pub fn sign(self) -> Result<Signed<'a>> {
        let signer = self.signer;
        let stage = |e: Error| Error::at(SigningStage::Signing, e);
        let position = self
            .index
            .require(Slot::SignedInfo)
            .map_err(|e| stage(e.into()))?;
        let scope = self
            .template
            .element_at(position)
            .map(|element| element.scope)
            .ok_or(StructuralError::SlotCardinality {
                slot: Slot::SignedInfo,
                found: 0,
            })
            .map_err(|e| stage(e.into()))?;
        let signed_info = SignedInfo::build(
            &signer.config,
            signer.canonicalizer.as_ref(),
            scope,
            &self.doc_digest,
            &self.props_digest,
        )
        .map_err(|e| stage(e.into()))?;
        let signature_value = signed_info
            .sign(signer.credentials)
            .map_err(|e| stage(e.into()))?;
        log::info!(
            "signed {} document with certificate serial {}",
            signer.config.family(),
            signer.credentials.serial_number()
        );
        Ok(Signed {
            signer,
            template: self.template,
            index: self.index,
            doc_digest: self.doc_digest,
            props_digest: self.props_digest,
            properties: self.properties,
            signature_value,
        })
    }
}

pub struct Signed<'a> {
    signer: &'a DocumentSigner<'a>,
    template: Document,
    index: SlotIndex,
    doc_digest: DocDigest,
    props_digest: PropsDigest,
    properties: SignedPropertiesData,
    signature_value: SignatureValue,
}

impl Signed<'_> {
    pub fn signature_value(&self) -> &SignatureValue {
        &self.signature_value
    }

    pub fn assemble(self) -> Result<SignedArtifact> {
        let data = FinalDocumentData {
            signature_value: self.signature_value,
            props_digest: self.props_digest,
            doc_digest: self.doc_digest,
            certificate_der: self.signer.credentials.certificate_der().to_vec(),
        };
        let document = assemble::assemble_indexed(&self.template, &self.index, &data)
            .map_err(|e| Error::at(SigningStage::Assembling, e))?;
        Ok(SignedArtifact {
            document,
            family: self.signer.config.family(),
            doc_digest: data.doc_digest,
            props_digest: data.props_digest,
            signature_value: data.signature_value,
            signing_time: self.properties.signing_time(),
        })
    }
}

/// Signed document plus the values computed while signing it.
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    document: Document,
    family: DocumentFamily,
    doc_digest: DocDigest,
    props_digest: PropsDigest,
    signature_value: SignatureValue,
    signing_time: SigningTime,
}

impl SignedArtifact {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn family(&self) -> DocumentFamily {
        self.family
    }

    pub fn doc_digest(&self) -> &DocDigest {
        &self.doc_digest
    }

    pub fn props_digest(&self) -> &PropsDigest {
        &self.props_digest
    }

    pub fn signature_value(&self) -> &SignatureValue {
        &self.signature_value
    }

    pub fn signing_time(&self) -> SigningTime {
        self.signing_time
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(self.family.serialize(&self.document)?)
    }

    pub fn transport(&self) -> Result<TransportEncoding> {
        TransportEncoding::from_artifact(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;

    fn credentials() -> SigningCredentials {
        SigningCredentials::from_pem(
            include_str!("../tests/fixtures/credentials/signer-cert.pem"),
            include_str!("../tests/fixtures/credentials/signer-key.pem"),
        )
        .expect("credentials")
    }

    fn clean() -> CleanDocument {
        CleanDocument::new(Document::new(
            "Invoice",
            Node::element().with_field("ID", Node::text("INV-1")),
        ))
        .expect("clean")
    }

    #[test]
    fn stages_chain_to_a_signed_artifact() {
        let credentials = credentials();
        let signer = DocumentSigner::new(&credentials, SigningConfig::default()).expect("signer");
        let time = SigningTime::parse("2025-02-06T01:50:00Z").expect("time");
        let digested = signer.begin(clean()).digest().expect("digest");
        let doc_digest = *digested.doc_digest();
        let artifact = digested
            .build_properties(time)
            .and_then(PropertiesBuilt::digest_properties)
            .and_then(PropertiesDigested::sign)
            .and_then(Signed::assemble)
            .expect("signed");
        assert_eq!(artifact.doc_digest(), &doc_digest);
        assert_eq!(artifact.signing_time(), time);
    }

    #[test]
    fn signed_info_outside_the_template_fails_the_signing_stage() {
        let credentials = credentials();
        let signer = DocumentSigner::new(&credentials, SigningConfig::default()).expect("signer");
        let time = SigningTime::parse("2025-02-06T01:50:00Z").expect("time");
        let mut digested = signer
            .begin(clean())
            .digest()
            .and_then(|stage| stage.build_properties(time))
            .and_then(PropertiesBuilt::digest_properties)
            .expect("digested properties");
        digested.template = clean().into_document();

        let err = digested.sign().err().expect("stale slot index");
        assert_eq!(err.stage(), Some(SigningStage::Signing));
        assert!(matches!(
            err.root(),
            Error::Structural(StructuralError::SlotCardinality {
                slot: Slot::SignedInfo,
                found: 0,
            })
        ));
    }
}
