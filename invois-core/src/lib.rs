//! Signing pipeline for MyInvois-style e-invoice documents.
//!
//! A clean document (JSON or XML UBL) is canonicalized and digested, a XAdES signed
//! properties block is built and digested in place, the `SignedInfo` is signed with
//! RSA-SHA256 and the results are written into a signature template.
//!
//! # Examples
//! ```rust
//! use invois_core::config::{DocumentFamily, SigningConfig};
//! use invois_core::canonical::CanonicalizationMethod;
//!
//! let config = SigningConfig::for_family(DocumentFamily::Xml);
//! assert_eq!(config.canonicalization(), CanonicalizationMethod::ExclusiveXml);
//! ```
pub mod canonical;
pub mod config;
pub mod credentials;
pub mod digest;
pub mod document;
pub mod invoice;
pub mod signing;
pub mod transport;
pub mod verify;

pub use config::{DocumentFamily, SigningConfig};
pub use credentials::SigningCredentials;
pub use document::{CleanDocument, Document};
pub use signing::{DocumentSigner, SignedArtifact, SigningStage};

use thiserror::Error;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Structural(#[from] document::StructuralError),
    #[error(transparent)]
    Crypto(#[from] credentials::CryptoError),
    #[error(transparent)]
    Encoding(#[from] digest::EncodingError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Invoice(#[from] invoice::InvoiceError),
    #[error(transparent)]
    Verification(#[from] verify::VerificationError),
    #[error("{stage} failed: {source}")]
    Stage {
        stage: SigningStage,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn at(stage: SigningStage, error: impl Into<Error>) -> Self {
        Error::Stage {
            stage,
            source: Box::new(error.into()),
        }
    }

    /// Pipeline stage the error was raised in, if it came from a signing run.
    pub fn stage(&self) -> Option<SigningStage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error with any stage wrapper removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::config::ConfigError;
    use crate::credentials::CryptoError;
    use crate::digest::EncodingError;
    use crate::document::StructuralError;
    use crate::invoice::InvoiceError;
    use crate::signing::SigningStage;
    use crate::verify::VerificationError;

    #[test]
    fn error_conversions_cover_variants() {
        let err: Error = StructuralError::MissingRoot.into();
        assert!(matches!(err, Error::Structural(_)));

        let err: Error = CryptoError::KeyMismatch.into();
        assert!(matches!(err, Error::Crypto(_)));

        let err: Error = EncodingError::DigestLength {
            what: "digest",
            found: 3,
        }
        .into();
        assert!(matches!(err, Error::Encoding(_)));

        let err: Error = ConfigError::InvalidFamily {
            input: "yaml".into(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));

        let err: Error = InvoiceError::MissingLineItems.into();
        assert!(matches!(err, Error::Invoice(_)));

        let err: Error = VerificationError::SignatureInvalid.into();
        assert!(matches!(err, Error::Verification(_)));
    }

    #[test]
    fn stage_wrapper_reports_stage_and_root() {
        let err = Error::at(SigningStage::Assembling, StructuralError::MissingRoot);
        assert_eq!(err.stage(), Some(SigningStage::Assembling));
        assert!(matches!(err.root(), Error::Structural(StructuralError::MissingRoot)));
        assert!(err.to_string().starts_with("assembly failed: "));
        assert_eq!(Error::from(CryptoError::KeyMismatch).stage(), None);
    }
}
