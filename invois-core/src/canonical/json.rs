use super::{CanonicalizationMethod, Canonicalizer};
use crate::document::json::{self, KeyOrder};
use crate::document::{Document, ElementRef, StructuralError};

/// Sorted-key compact JSON.
///
/// Keys are ordered by their UTF-8 bytes, arrays keep their order, strings use JSON
/// escaping and numbers appear in their normalized form. A node whose attribute and field
/// share a name has no canonical form and is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCanonicalizer;

impl Canonicalizer for JsonCanonicalizer {
    fn method(&self) -> CanonicalizationMethod {
        CanonicalizationMethod::JsonSortedKeys
    }

    fn canonicalize(&self, document: &Document) -> Result<Vec<u8>, StructuralError> {
        let mut out = String::new();
        json::write_document(document, KeyOrder::Sorted, &mut out)?;
        Ok(out.into_bytes())
    }

    fn canonicalize_element(&self, element: &ElementRef<'_>) -> Result<Vec<u8>, StructuralError> {
        let mut out = String::new();
        json::write_element(element.name, element.node, KeyOrder::Sorted, &mut out)?;
        Ok(out.into_bytes())
    }
}
