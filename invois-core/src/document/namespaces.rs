//! UBL namespaces and family-aware element naming.
use super::Node;
use crate::config::DocumentFamily;

pub const INVOICE_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
pub const CBC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
pub const CAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
pub const EXT_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
pub const SIG_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonSignatureComponents-2";
pub const SAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:SignatureAggregateComponents-2";
pub const SBC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:SignatureBasicComponents-2";
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const XADES_NS: &str = "http://uri.etsi.org/01903/v1.3.2#";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Invoice,
    Cac,
    Cbc,
    Ext,
    Sig,
    Sac,
    Sbc,
    Ds,
    Xades,
}

impl Namespace {
    /// Prefix used in markup; `None` for the default namespace.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Namespace::Invoice => None,
            Namespace::Cac => Some("cac"),
            Namespace::Cbc => Some("cbc"),
            Namespace::Ext => Some("ext"),
            Namespace::Sig => Some("sig"),
            Namespace::Sac => Some("sac"),
            Namespace::Sbc => Some("sbc"),
            Namespace::Ds => Some("ds"),
            Namespace::Xades => Some("xades"),
        }
    }

    pub fn uri(self) -> &'static str {
        match self {
            Namespace::Invoice => INVOICE_NS,
            Namespace::Cac => CAC_NS,
            Namespace::Cbc => CBC_NS,
            Namespace::Ext => EXT_NS,
            Namespace::Sig => SIG_NS,
            Namespace::Sac => SAC_NS,
            Namespace::Sbc => SBC_NS,
            Namespace::Ds => DS_NS,
            Namespace::Xades => XADES_NS,
        }
    }

    /// Attribute name that declares this namespace in markup.
    pub fn declaration(self) -> String {
        match self.prefix() {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        }
    }
}

/// Root-level namespace markers of the structured-object family.
const JSON_MARKERS: [(&str, Namespace); 3] = [
    ("_D", Namespace::Invoice),
    ("_A", Namespace::Cac),
    ("_B", Namespace::Cbc),
];

const XML_ROOT_NAMESPACES: [Namespace; 4] =
    [Namespace::Invoice, Namespace::Cac, Namespace::Cbc, Namespace::Ext];

/// Element naming for one document family.
///
/// Markup names are prefixed (`cbc:ID`); structured-object names are bare (`ID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Names {
    family: DocumentFamily,
}

impl Names {
    pub fn new(family: DocumentFamily) -> Self {
        Self { family }
    }

    pub fn family(&self) -> DocumentFamily {
        self.family
    }

    pub fn qualify(&self, namespace: Namespace, local: &str) -> String {
        match (self.family, namespace.prefix()) {
            (DocumentFamily::Xml, Some(prefix)) => format!("{prefix}:{local}"),
            _ => local.to_string(),
        }
    }

    pub fn cac(&self, local: &str) -> String {
        self.qualify(Namespace::Cac, local)
    }

    pub fn cbc(&self, local: &str) -> String {
        self.qualify(Namespace::Cbc, local)
    }

    pub fn ds(&self, local: &str) -> String {
        self.qualify(Namespace::Ds, local)
    }

    pub fn xades(&self, local: &str) -> String {
        self.qualify(Namespace::Xades, local)
    }

    /// Add namespace declarations to `node`. Only markup carries them.
    pub fn declare(&self, mut node: Node, namespaces: &[Namespace]) -> Node {
        if self.family == DocumentFamily::Xml {
            for namespace in namespaces {
                node.set_attribute(namespace.declaration(), namespace.uri());
            }
        }
        node
    }

    /// Attributes placed on the document root.
    pub fn root_attributes(&self) -> Vec<(String, String)> {
        match self.family {
            DocumentFamily::Json => JSON_MARKERS
                .iter()
                .map(|(marker, namespace)| (marker.to_string(), namespace.uri().to_string()))
                .collect(),
            DocumentFamily::Xml => XML_ROOT_NAMESPACES
                .iter()
                .map(|namespace| (namespace.declaration(), namespace.uri().to_string()))
                .collect(),
        }
    }
}
