//! Document family and canonicalization selection.
use crate::canonical::{CanonicalizationMethod, Canonicalizer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wire family of a document.
/// - Json: the structured-object form submitted as JSON.
/// - Xml: the UBL markup form.
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use invois_core::config::DocumentFamily;
///
/// let family = DocumentFamily::from_str("XML")?;
/// assert_eq!(family, DocumentFamily::Xml);
/// # Ok::<(), invois_core::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFamily {
    #[default]
    Json,
    Xml,
}

impl DocumentFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFamily::Json => "json",
            DocumentFamily::Xml => "xml",
        }
    }

    /// Default canonicalization for the family.
    pub fn default_canonicalization(&self) -> CanonicalizationMethod {
        match self {
            DocumentFamily::Json => CanonicalizationMethod::JsonSortedKeys,
            DocumentFamily::Xml => CanonicalizationMethod::ExclusiveXml,
        }
    }
}

impl FromStr for DocumentFamily {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "json" => Ok(DocumentFamily::Json),
            "xml" => Ok(DocumentFamily::Xml),
            _ => Err(ConfigError::InvalidFamily {
                input: input.to_string(),
            }),
        }
    }
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for unknown or incompatible configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid document family: {input}")]
    InvalidFamily { input: String },
    #[error("invalid canonicalization method: {input}")]
    InvalidCanonicalization { input: String },
    #[error("canonicalization {method} cannot be used with {family} documents")]
    Incompatible {
        family: DocumentFamily,
        method: CanonicalizationMethod,
    },
}

/// Signing configuration: which family is signed and how it is canonicalized.
///
/// The canonicalization method is recorded in the signed information, so changing it alters
/// every signature produced afterwards.
///
/// # Examples
/// ```rust
/// use invois_core::canonical::CanonicalizationMethod;
/// use invois_core::config::{DocumentFamily, SigningConfig};
///
/// let config = SigningConfig::for_family(DocumentFamily::Xml);
/// assert_eq!(config.canonicalization(), CanonicalizationMethod::ExclusiveXml);
/// assert!(SigningConfig::new(DocumentFamily::Json, CanonicalizationMethod::ExclusiveXml).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    family: DocumentFamily,
    canonicalization: CanonicalizationMethod,
}

impl SigningConfig {
    pub fn new(
        family: DocumentFamily,
        canonicalization: CanonicalizationMethod,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            family,
            canonicalization,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn for_family(family: DocumentFamily) -> Self {
        Self {
            family,
            canonicalization: family.default_canonicalization(),
        }
    }

    pub fn family(&self) -> DocumentFamily {
        self.family
    }

    pub fn canonicalization(&self) -> CanonicalizationMethod {
        self.canonicalization
    }

    /// Deserialized configs bypass [`SigningConfig::new`], so the pipeline validates again.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canonicalization.family() == self.family {
            Ok(())
        } else {
            Err(ConfigError::Incompatible {
                family: self.family,
                method: self.canonicalization,
            })
        }
    }

    pub(crate) fn canonicalizer(&self) -> Box<dyn Canonicalizer> {
        self.canonicalization.canonicalizer()
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self::for_family(DocumentFamily::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_parse_is_case_insensitive() {
        assert_eq!("Json".parse::<DocumentFamily>(), Ok(DocumentFamily::Json));
        assert_eq!("xml".parse::<DocumentFamily>(), Ok(DocumentFamily::Xml));
        assert_eq!(
            "yaml".parse::<DocumentFamily>(),
            Err(ConfigError::InvalidFamily {
                input: "yaml".into()
            })
        );
    }

    #[test]
    fn defaults_follow_family() {
        let config = SigningConfig::default();
        assert_eq!(config.family(), DocumentFamily::Json);
        assert_eq!(config.canonicalization(), CanonicalizationMethod::JsonSortedKeys);
        assert!(config.validate().is_ok());
        assert!(SigningConfig::for_family(DocumentFamily::Xml).validate().is_ok());
    }

    #[test]
    fn incompatible_pairs_are_rejected() {
        let err = SigningConfig::new(DocumentFamily::Xml, CanonicalizationMethod::JsonSortedKeys)
            .expect_err("json c14n on xml");
        assert!(matches!(err, ConfigError::Incompatible { .. }));
        assert!(
            SigningConfig::new(DocumentFamily::Xml, CanonicalizationMethod::InclusiveXml11).is_ok()
        );
    }

    #[test]
    fn deserialized_config_is_validated() {
        let config: SigningConfig =
            serde_json::from_str(r#"{"family":"json","canonicalization":"exclusive_xml"}"#)
                .expect("deserialize");
        assert!(config.validate().is_err());
    }
}
