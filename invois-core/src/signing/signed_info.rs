//! Signed information and the RSA-SHA256 signature over it.
use crate::canonical::Canonicalizer;
use crate::config::{DocumentFamily, SigningConfig};
use crate::credentials::{CryptoError, SigningCredentials};
use crate::digest::{self, Digest, DocDigest, EncodingError, PropsDigest};
use crate::document::namespaces::{Names, Namespace};
use crate::document::{ElementRef, NamespaceScope, Node, StructuralError};
use crate::signing::template::signed_info_node;
use base64ct::{Base64, Encoding};
use std::fmt;

/// Raw RSASSA-PKCS1-v1_5 signature bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureValue(Vec<u8>);

impl SignatureValue {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        digest::decode_base64("signature value", text).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }
}

impl fmt::Debug for SignatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureValue({})", self.to_base64())
    }
}

impl fmt::Display for SignatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Signed information built from both digests and canonicalized in its final scope.
#[derive(Debug, Clone)]
pub struct SignedInfo {
    node: Node,
    canonical: Vec<u8>,
    hash: Digest,
}

impl SignedInfo {
    pub fn build(
        config: &SigningConfig,
        canonicalizer: &dyn Canonicalizer,
        scope: NamespaceScope,
        doc_digest: &DocDigest,
        props_digest: &PropsDigest,
    ) -> Result<Self, StructuralError> {
        let names = Names::new(config.family());
        let node = signed_info_node(
            &names,
            config.canonicalization(),
            Some(doc_digest),
            Some(props_digest),
        );
        let name = names.ds("SignedInfo");
        let canonical = canonicalizer.canonicalize_element(&ElementRef {
            name: &name,
            node: &node,
            scope,
        })?;
        let hash = Digest::of(&canonical);
        Ok(Self {
            node,
            canonical,
            hash,
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn canonical_bytes(&self) -> &[u8] {
        &self.canonical
    }

    /// SHA-256 of the canonical bytes; the value that is signed.
    pub fn hash(&self) -> &Digest {
        &self.hash
    }

    /// PKCS#1 v1.5 padding is deterministic, so equal inputs give equal signatures.
    pub fn sign(&self, credentials: &SigningCredentials) -> Result<SignatureValue, CryptoError> {
        credentials.sign_prehash(&self.hash).map(SignatureValue)
    }
}

/// Namespace scope of the signed information inside the standard template.
pub(crate) fn template_scope(family: DocumentFamily) -> NamespaceScope {
    let mut scope = NamespaceScope::new();
    if family == DocumentFamily::Xml {
        for namespace in [
            Namespace::Invoice,
            Namespace::Cac,
            Namespace::Cbc,
            Namespace::Ext,
            Namespace::Sig,
            Namespace::Sac,
            Namespace::Sbc,
            Namespace::Ds,
        ] {
            scope.declare(namespace.prefix().unwrap_or(""), namespace.uri());
        }
    }
    scope
}

/// Sign base64 document and signed-properties digests.
///
/// Both digests are decoded before any cryptographic work, so malformed input fails with an
/// encoding error. The signature covers the canonical signed information as it appears in
/// the standard template.
pub fn sign(
    doc_digest: &str,
    props_digest: &str,
    credentials: &SigningCredentials,
    config: &SigningConfig,
) -> crate::Result<SignatureValue> {
    let doc_digest = DocDigest::from_base64(doc_digest)?;
    let props_digest = PropsDigest::from_base64(props_digest)?;
    config.validate()?;
    let canonicalizer = config.canonicalizer();
    let signed_info = SignedInfo::build(
        config,
        canonicalizer.as_ref(),
        template_scope(config.family()),
        &doc_digest,
        &props_digest,
    )?;
    Ok(signed_info.sign(credentials)?)
}
