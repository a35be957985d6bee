//! Signature template and the named slots the assembler fills.
//!
//! The enveloped signature lives in `UBLExtensions` as the first root field. A
//! document-level `Signature` reference goes after the last `AdditionalDocumentReference`,
//! else before `AccountingSupplierParty`, else at the end.
use crate::canonical::CanonicalizationMethod;
use crate::credentials::SigningCredentials;
use crate::digest::{DocDigest, PropsDigest};
use crate::document::namespaces::{Names, Namespace};
use crate::document::{local_name, CleanDocument, Document, Field, Node, StructuralError};
use std::fmt;

pub const SIGNATURE_ID: &str = "signature";
pub const SIGNED_PROPERTIES_ID: &str = "id-xades-signed-props";
pub const SIGNED_PROPERTIES_URI: &str = "#id-xades-signed-props";
pub const SIGNED_PROPERTIES_TYPE: &str = "http://uri.etsi.org/01903/v1.3.2#SignedProperties";
pub const DOC_REFERENCE_ID: &str = "id-doc-signed-data";
pub const EXTENSION_URI: &str = "urn:oasis:names:specification:ubl:dsig:enveloped:xades";
pub const SIGNATURE_INFORMATION_ID: &str = "urn:oasis:names:specification:ubl:signature:1";
pub const REFERENCED_SIGNATURE_ID: &str = "urn:oasis:names:specification:ubl:signature:Invoice";
pub const SIGNATURE_METHOD_ID: &str = "urn:oasis:names:specification:ubl:dsig:enveloped:xades";
pub const SHA256_URI: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const RSA_SHA256_URI: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const XPATH_TRANSFORM_URI: &str = "http://www.w3.org/TR/1999/REC-xpath-19991116";

const EXCLUDE_EXTENSIONS_XPATH: &str = "not(//ancestor-or-self::ext:UBLExtensions)";
const EXCLUDE_SIGNATURE_XPATH: &str = "not(//ancestor-or-self::cac:Signature)";

/// One path step: a local name, optionally constrained by an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Selector {
    pub(crate) local: &'static str,
    pub(crate) attribute: Option<(&'static str, &'static str)>,
}

const fn step(local: &'static str) -> Selector {
    Selector {
        local,
        attribute: None,
    }
}

const fn step_with(local: &'static str, name: &'static str, value: &'static str) -> Selector {
    Selector {
        local,
        attribute: Some((name, value)),
    }
}

const SIGNATURE_PATH: [Selector; 6] = [
    step("UBLExtensions"),
    step("UBLExtension"),
    step("ExtensionContent"),
    step("UBLDocumentSignatures"),
    step("SignatureInformation"),
    step_with("Signature", "Id", SIGNATURE_ID),
];

macro_rules! signature_path {
    ($($selector:expr),* $(,)?) => {{
        const PATH: &[Selector] = &[
            SIGNATURE_PATH[0],
            SIGNATURE_PATH[1],
            SIGNATURE_PATH[2],
            SIGNATURE_PATH[3],
            SIGNATURE_PATH[4],
            SIGNATURE_PATH[5],
            $($selector),*
        ];
        PATH
    }};
}

/// Named locations in a signed document's signature sub-tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    SignedInfo,
    SignedProperties,
    SignatureValue,
    Certificate,
    DocDigestValue,
    PropsDigestValue,
}

impl Slot {
    pub const ALL: [Slot; 6] = [
        Slot::SignedInfo,
        Slot::SignedProperties,
        Slot::SignatureValue,
        Slot::Certificate,
        Slot::DocDigestValue,
        Slot::PropsDigestValue,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Slot::SignedInfo => "SignedInfo",
            Slot::SignedProperties => "SignedProperties",
            Slot::SignatureValue => "SignatureValue",
            Slot::Certificate => "Certificate",
            Slot::DocDigestValue => "DocDigestValue",
            Slot::PropsDigestValue => "PropsDigestValue",
        }
    }

    pub(crate) fn path(&self) -> &'static [Selector] {
        match self {
            Slot::SignedInfo => signature_path![step("SignedInfo")],
            Slot::SignatureValue => signature_path![step("SignatureValue")],
            Slot::Certificate => signature_path![
                step("KeyInfo"),
                step("X509Data"),
                step("X509Certificate"),
            ],
            Slot::DocDigestValue => signature_path![
                step("SignedInfo"),
                step_with("Reference", "Id", DOC_REFERENCE_ID),
                step("DigestValue"),
            ],
            Slot::PropsDigestValue => signature_path![
                step("SignedInfo"),
                step_with("Reference", "URI", SIGNED_PROPERTIES_URI),
                step("DigestValue"),
            ],
            Slot::SignedProperties => signature_path![
                step("Object"),
                step_with("QualifyingProperties", "Target", SIGNATURE_ID),
                step_with("SignedProperties", "Id", SIGNED_PROPERTIES_ID),
            ],
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        f.write_str(" (")?;
        for (index, selector) in self.path().iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            f.write_str(selector.local)?;
            if let Some((name, value)) = selector.attribute {
                write!(f, "[@{name}='{value}']")?;
            }
        }
        f.write_str(")")
    }
}

/// Signed information node. Digest values are left empty when not supplied.
pub(crate) fn signed_info_node(
    names: &Names,
    method: CanonicalizationMethod,
    doc_digest: Option<&DocDigest>,
    props_digest: Option<&PropsDigest>,
) -> Node {
    let digest_method = || Node::empty().with_attribute("Algorithm", SHA256_URI);
    let digest_value = |value: Option<String>| Node::text(value.unwrap_or_default());

    let mut doc_reference = Node::element()
        .with_attribute("Id", DOC_REFERENCE_ID)
        .with_attribute("URI", "");
    let mut signed_info = Node::element();
    if let Some(uri) = method.uri() {
        signed_info.push_field(
            names.ds("CanonicalizationMethod"),
            Node::empty().with_attribute("Algorithm", uri),
        );
        let xpath = |expression: &str| {
            Node::element()
                .with_attribute("Algorithm", XPATH_TRANSFORM_URI)
                .with_field(names.ds("XPath"), Node::text(expression))
        };
        doc_reference.push_field(
            names.ds("Transforms"),
            Node::element().with_fields(
                names.ds("Transform"),
                vec![
                    xpath(EXCLUDE_EXTENSIONS_XPATH),
                    xpath(EXCLUDE_SIGNATURE_XPATH),
                    Node::empty().with_attribute("Algorithm", uri),
                ],
            ),
        );
    }
    let doc_reference = doc_reference
        .with_field(names.ds("DigestMethod"), digest_method())
        .with_field(
            names.ds("DigestValue"),
            digest_value(doc_digest.map(DocDigest::to_base64)),
        );
    let props_reference = Node::element()
        .with_attribute("Type", SIGNED_PROPERTIES_TYPE)
        .with_attribute("URI", SIGNED_PROPERTIES_URI)
        .with_field(names.ds("DigestMethod"), digest_method())
        .with_field(
            names.ds("DigestValue"),
            digest_value(props_digest.map(PropsDigest::to_base64)),
        );

    signed_info
        .with_field(
            names.ds("SignatureMethod"),
            Node::empty().with_attribute("Algorithm", RSA_SHA256_URI),
        )
        .with_fields(names.ds("Reference"), vec![doc_reference, props_reference])
}

/// `UBLExtensions` sub-tree with empty slots and the signed properties embedded.
pub(crate) fn signature_extension(
    names: &Names,
    credentials: &SigningCredentials,
    signed_properties: Node,
    method: CanonicalizationMethod,
) -> Node {
    let qualifying = names.declare(
        Node::element().with_attribute("Target", SIGNATURE_ID),
        &[Namespace::Xades],
    );
    let qualifying = qualifying.with_field(names.xades("SignedProperties"), signed_properties);

    let key_info = Node::element().with_field(
        names.ds("X509Data"),
        Node::element()
            .with_field(names.ds("X509Certificate"), Node::empty())
            .with_field(
                names.ds("X509SubjectName"),
                Node::text(credentials.subject_name()),
            )
            .with_field(
                names.ds("X509IssuerSerial"),
                Node::element()
                    .with_field(
                        names.ds("X509IssuerName"),
                        Node::text(credentials.issuer_name()),
                    )
                    .with_field(
                        names.ds("X509SerialNumber"),
                        Node::text(credentials.serial_number()),
                    ),
            ),
    );

    let signature = names
        .declare(
            Node::element().with_attribute("Id", SIGNATURE_ID),
            &[Namespace::Ds],
        )
        .with_field(
            names.ds("SignedInfo"),
            signed_info_node(names, method, None, None),
        )
        .with_field(names.ds("SignatureValue"), Node::empty())
        .with_field(names.ds("KeyInfo"), key_info)
        .with_field(
            names.ds("Object"),
            Node::element().with_field(names.xades("QualifyingProperties"), qualifying),
        );

    let information = Node::element()
        .with_field(names.cbc("ID"), Node::text(SIGNATURE_INFORMATION_ID))
        .with_field(
            names.qualify(Namespace::Sbc, "ReferencedSignatureID"),
            Node::text(REFERENCED_SIGNATURE_ID),
        )
        .with_field(names.ds("Signature"), signature);

    let signatures = names
        .declare(
            Node::element(),
            &[Namespace::Sig, Namespace::Sac, Namespace::Sbc],
        )
        .with_field(
            names.qualify(Namespace::Sac, "SignatureInformation"),
            information,
        );

    let extension = Node::element()
        .with_field(
            names.qualify(Namespace::Ext, "ExtensionURI"),
            Node::text(EXTENSION_URI),
        )
        .with_field(
            names.qualify(Namespace::Ext, "ExtensionContent"),
            Node::element().with_field(
                names.qualify(Namespace::Sig, "UBLDocumentSignatures"),
                signatures,
            ),
        );

    names
        .declare(Node::element(), &[Namespace::Ext])
        .with_field(names.qualify(Namespace::Ext, "UBLExtension"), extension)
}

/// Document-level `Signature` reference.
pub(crate) fn document_signature(names: &Names) -> Node {
    Node::element()
        .with_field(names.cbc("ID"), Node::text(REFERENCED_SIGNATURE_ID))
        .with_field(
            names.cbc("SignatureMethod"),
            Node::text(SIGNATURE_METHOD_ID),
        )
}

/// Insert both signature sub-trees into a clean document.
pub(crate) fn insert_signature(
    names: &Names,
    clean: CleanDocument,
    extension: Node,
    signature: Node,
) -> Result<Document, StructuralError> {
    let mut document = clean.into_document();
    let element = document.name().to_string();
    let fields = document
        .root_mut()
        .fields_mut()
        .ok_or(StructuralError::TextRoot { element })?;

    fields.insert(
        0,
        Field::new(names.qualify(Namespace::Ext, "UBLExtensions"), vec![extension]),
    );
    let index = fields
        .iter()
        .rposition(|field| local_name(field.name()) == "AdditionalDocumentReference")
        .map(|index| index + 1)
        .or_else(|| {
            fields
                .iter()
                .position(|field| local_name(field.name()) == "AccountingSupplierParty")
        })
        .unwrap_or(fields.len());
    fields.insert(index, Field::new(names.cac("Signature"), vec![signature]));
    Ok(document)
}
