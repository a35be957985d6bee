//! SHA-256 digests and their base64 / hex encodings.
//!
//! The three digest channels in a signature are distinct types: [`DocDigest`] over the clean
//! document, [`PropsDigest`] over the signed properties and [`TransportDigest`] over the
//! serialized submission bytes. The certificate digest is a plain [`Digest`].
use base64ct::{Base64, Encoding};
use sha2::{Digest as _, Sha256};
use std::fmt;
use thiserror::Error;

pub const DIGEST_LEN: usize = 32;

const PEM_CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_CERT_END: &str = "-----END CERTIFICATE-----";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("invalid base64 in {what}: unexpected {character:?} at offset {offset}")]
    InvalidBase64 {
        what: &'static str,
        character: char,
        offset: usize,
    },
    #[error("malformed base64 in {what}: {message}")]
    MalformedBase64 { what: &'static str, message: String },
    #[error("{what} is missing the `{marker}` marker")]
    MissingPemMarker {
        what: &'static str,
        marker: &'static str,
    },
    #[error("{what} decodes to {found} bytes, expected {DIGEST_LEN}")]
    DigestLength { what: &'static str, found: usize },
}

/// SHA-256 output.
///
/// # Examples
/// ```rust
/// use invois_core::digest::Digest;
///
/// let digest = Digest::of(b"abc");
/// assert_eq!(digest.to_base64(), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
/// assert_eq!(Digest::from_base64(&digest.to_base64())?, digest);
/// # Ok::<(), invois_core::digest::EncodingError>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        Self::decode_labeled("digest", text)
    }

    pub(crate) fn decode_labeled(what: &'static str, text: &str) -> Result<Self, EncodingError> {
        let bytes = decode_base64(what, text)?;
        let found = bytes.len();
        let array: [u8; DIGEST_LEN] = bytes
            .try_into()
            .map_err(|_| EncodingError::DigestLength { what, found })?;
        Ok(Self(array))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_base64())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Digest of the canonical clean document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocDigest(Digest);

impl DocDigest {
    pub fn new(digest: Digest) -> Self {
        Self(digest)
    }

    pub fn digest(&self) -> &Digest {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        self.0.to_base64()
    }

    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        Digest::decode_labeled("document digest", text).map(Self)
    }
}

impl fmt::Display for DocDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Digest of the canonical signed-properties element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropsDigest(Digest);

impl PropsDigest {
    pub fn new(digest: Digest) -> Self {
        Self(digest)
    }

    pub fn digest(&self) -> &Digest {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        self.0.to_base64()
    }

    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        Digest::decode_labeled("signed properties digest", text).map(Self)
    }
}

impl fmt::Display for PropsDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Digest of the exact serialized submission bytes, reported as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportDigest(Digest);

impl TransportDigest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Digest::of(bytes))
    }

    pub fn digest(&self) -> &Digest {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Display for TransportDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Base64 of the SHA-256 of `bytes`.
///
/// # Examples
/// ```rust
/// assert_eq!(
///     invois_core::digest::digest(b""),
///     "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
/// );
/// ```
pub fn digest(bytes: &[u8]) -> String {
    Digest::of(bytes).to_base64()
}

/// DER bytes of the first certificate in a PEM text.
///
/// Only whitespace is removed from the body; any other non-base64 character fails with its
/// offset inside the body.
pub fn certificate_der(pem: &str) -> Result<Vec<u8>, EncodingError> {
    const WHAT: &str = "certificate PEM";
    let start = pem
        .find(PEM_CERT_BEGIN)
        .ok_or(EncodingError::MissingPemMarker {
            what: WHAT,
            marker: PEM_CERT_BEGIN,
        })?
        + PEM_CERT_BEGIN.len();
    let length = pem[start..]
        .find(PEM_CERT_END)
        .ok_or(EncodingError::MissingPemMarker {
            what: WHAT,
            marker: PEM_CERT_END,
        })?;
    decode_base64(WHAT, &pem[start..start + length])
}

/// Base64 SHA-256 of the certificate's DER encoding.
///
/// # Examples
/// ```rust
/// use invois_core::digest::certificate_digest;
///
/// assert!(certificate_digest("not a certificate").is_err());
/// ```
pub fn certificate_digest(pem: &str) -> Result<String, EncodingError> {
    certificate_der(pem).map(|der| digest(&der))
}

/// Decode standard padded base64 after dropping whitespace.
pub(crate) fn decode_base64(what: &'static str, text: &str) -> Result<Vec<u8>, EncodingError> {
    let mut compact = String::with_capacity(text.len());
    for (offset, character) in text.char_indices() {
        match character {
            c if c.is_ascii_whitespace() => {}
            'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' | '=' => compact.push(character),
            _ => {
                return Err(EncodingError::InvalidBase64 {
                    what,
                    character,
                    offset,
                });
            }
        }
    }
    Base64::decode_vec(&compact).map_err(|err| EncodingError::MalformedBase64 {
        what,
        message: err.to_string(),
    })
}
