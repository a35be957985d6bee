//! Canonical byte forms for hashing.
//!
//! Each [`Canonicalizer`] turns a whole document or one element (with its inherited
//! namespace scope) into a deterministic byte sequence. Equal inputs always yield equal
//! bytes. Object key order and markup formatting do not change the output, but the order
//! of repeated values does.
pub mod json;
pub mod xml;

pub use json::JsonCanonicalizer;
pub use xml::{XmlCanonicalizer, XmlMode};

use crate::config::{ConfigError, DocumentFamily};
use crate::document::{Document, ElementRef, StructuralError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const EXCLUSIVE_XML_URI: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const INCLUSIVE_XML11_URI: &str = "http://www.w3.org/2006/12/xml-c14n11";

pub trait Canonicalizer: Send + Sync {
    fn method(&self) -> CanonicalizationMethod;

    fn canonicalize(&self, document: &Document) -> Result<Vec<u8>, StructuralError>;

    /// Canonicalize one element in the context of its ancestors' namespace scope.
    fn canonicalize_element(&self, element: &ElementRef<'_>) -> Result<Vec<u8>, StructuralError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalizationMethod {
    /// Compact JSON with lexicographically sorted keys.
    JsonSortedKeys,
    /// Exclusive XML Canonicalization 1.0, without comments.
    ExclusiveXml,
    /// Canonical XML 1.1, without comments.
    InclusiveXml11,
}

impl CanonicalizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalizationMethod::JsonSortedKeys => "json_sorted_keys",
            CanonicalizationMethod::ExclusiveXml => "exclusive_xml",
            CanonicalizationMethod::InclusiveXml11 => "inclusive_xml11",
        }
    }

    /// Algorithm URI recorded in markup signed information.
    pub fn uri(&self) -> Option<&'static str> {
        match self {
            CanonicalizationMethod::JsonSortedKeys => None,
            CanonicalizationMethod::ExclusiveXml => Some(EXCLUSIVE_XML_URI),
            CanonicalizationMethod::InclusiveXml11 => Some(INCLUSIVE_XML11_URI),
        }
    }

    pub fn family(&self) -> DocumentFamily {
        match self {
            CanonicalizationMethod::JsonSortedKeys => DocumentFamily::Json,
            CanonicalizationMethod::ExclusiveXml | CanonicalizationMethod::InclusiveXml11 => {
                DocumentFamily::Xml
            }
        }
    }

    pub fn canonicalizer(&self) -> Box<dyn Canonicalizer> {
        match self {
            CanonicalizationMethod::JsonSortedKeys => Box::new(JsonCanonicalizer),
            CanonicalizationMethod::ExclusiveXml => Box::new(XmlCanonicalizer::exclusive()),
            CanonicalizationMethod::InclusiveXml11 => Box::new(XmlCanonicalizer::inclusive11()),
        }
    }
}

impl FromStr for CanonicalizationMethod {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "json_sorted_keys" | "json" => Ok(CanonicalizationMethod::JsonSortedKeys),
            "exclusive_xml" | "exc-c14n" | EXCLUSIVE_XML_URI => {
                Ok(CanonicalizationMethod::ExclusiveXml)
            }
            "inclusive_xml11" | "c14n11" | INCLUSIVE_XML11_URI => {
                Ok(CanonicalizationMethod::InclusiveXml11)
            }
            _ => Err(ConfigError::InvalidCanonicalization {
                input: input.to_string(),
            }),
        }
    }
}

impl fmt::Display for CanonicalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonicalize a whole document with `method`.
///
/// # Examples
/// ```rust
/// use invois_core::canonical::{canonicalize, CanonicalizationMethod};
/// use invois_core::document::json;
///
/// let doc = json::parse(r#"{"Invoice":[{"B":[{"_":"2"}],"A":[{"_":"1"}]}]}"#)?;
/// let bytes = canonicalize(&doc, CanonicalizationMethod::JsonSortedKeys)?;
/// assert_eq!(bytes, br#"{"Invoice":[{"A":[{"_":"1"}],"B":[{"_":"2"}]}]}"#);
/// # Ok::<(), invois_core::document::StructuralError>(())
/// ```
pub fn canonicalize(
    document: &Document,
    method: CanonicalizationMethod,
) -> Result<Vec<u8>, StructuralError> {
    method.canonicalizer().canonicalize(document)
}
