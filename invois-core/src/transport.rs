//! Submission encoding: base64 document plus hex SHA-256 of the identical bytes.
use crate::config::DocumentFamily;
use crate::digest::TransportDigest;
use crate::document::Document;
use crate::signing::SignedArtifact;
use crate::Result;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

/// # Examples
/// ```rust
/// use invois_core::config::DocumentFamily;
/// use invois_core::transport::TransportEncoding;
///
/// let encoded = TransportEncoding::encode(DocumentFamily::Json, b"{}");
/// assert_eq!(encoded.document(), "e30=");
/// assert_eq!(
///     encoded.document_hash(),
///     "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportEncoding {
    format: DocumentFamily,
    document_hash: String,
    document: String,
}

impl TransportEncoding {
    /// Encode already-serialized bytes; the hash covers exactly the bytes that are encoded.
    pub fn encode(format: DocumentFamily, bytes: &[u8]) -> Self {
        Self {
            format,
            document_hash: TransportDigest::of(bytes).to_hex(),
            document: Base64::encode_string(bytes),
        }
    }

    pub fn from_document(document: &Document, format: DocumentFamily) -> Result<Self> {
        let serialized = format.serialize(document)?;
        Ok(Self::encode(format, serialized.as_bytes()))
    }

    pub fn from_artifact(artifact: &SignedArtifact) -> Result<Self> {
        Self::from_document(artifact.document(), artifact.family())
    }

    pub fn format(&self) -> DocumentFamily {
        self.format
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn document_hash(&self) -> &str {
        &self.document_hash
    }

    /// Decode the payload and confirm it still matches the recorded hash.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let bytes = crate::digest::decode_base64("transport document", &self.document)?;
        let actual = TransportDigest::of(&bytes).to_hex();
        if actual != self.document_hash {
            return Err(crate::verify::VerificationError::TransportHashMismatch {
                expected: self.document_hash.clone(),
                actual,
            }
            .into());
        }
        Ok(bytes)
    }
}
