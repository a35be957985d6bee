//! Slot resolution and final document assembly.
//!
//! The assembler never edits the template in place. It copies the template and substitutes
//! the computed values at slots that must each resolve to exactly one empty text leaf.
use crate::digest::{DocDigest, PropsDigest};
use crate::document::{Content, Document, Node, Position, StructuralError};
use crate::signing::signed_info::SignatureValue;
use crate::signing::template::{Selector, Slot};
use base64ct::{Base64, Encoding};
use std::collections::BTreeMap;

/// Positions of every slot in one document, resolved in a single pass.
#[derive(Debug, Clone, Default)]
pub struct SlotIndex {
    positions: BTreeMap<Slot, Vec<Position>>,
}

impl SlotIndex {
    pub fn build(document: &Document) -> Self {
        let positions = Slot::ALL
            .iter()
            .map(|slot| (*slot, resolve(document, slot.path())))
            .collect();
        Self { positions }
    }

    pub fn count(&self, slot: Slot) -> usize {
        self.positions.get(&slot).map_or(0, Vec::len)
    }

    /// Position of `slot`, which must match exactly one node.
    pub fn require(&self, slot: Slot) -> Result<&Position, StructuralError> {
        match self.positions.get(&slot).map(Vec::as_slice) {
            Some([position]) => Ok(position),
            other => Err(StructuralError::SlotCardinality {
                slot,
                found: other.map_or(0, <[Position]>::len),
            }),
        }
    }

    /// Check that every slot resolves exactly once.
    pub fn require_all(&self) -> Result<(), StructuralError> {
        for slot in Slot::ALL {
            self.require(slot)?;
        }
        Ok(())
    }
}

fn resolve(document: &Document, path: &[Selector]) -> Vec<Position> {
    let mut frontier = vec![Position::root()];
    for selector in path {
        let mut next = Vec::new();
        for position in &frontier {
            let Some(node) = document.node_at(position) else {
                continue;
            };
            for (field_index, field) in node.fields().iter().enumerate() {
                if field.local_name() != selector.local {
                    continue;
                }
                for (value_index, child) in field.values().iter().enumerate() {
                    if matches(child, selector) {
                        next.push(position.child(field_index, value_index));
                    }
                }
            }
        }
        frontier = next;
    }
    frontier
}

fn matches(node: &Node, selector: &Selector) -> bool {
    match selector.attribute {
        Some((name, value)) => node.attribute(name) == Some(value),
        None => true,
    }
}

/// Values the assembler writes into the template.
#[derive(Debug, Clone)]
pub struct FinalDocumentData {
    pub signature_value: SignatureValue,
    pub props_digest: PropsDigest,
    pub doc_digest: DocDigest,
    pub certificate_der: Vec<u8>,
}

/// Produce the signed document from a template with empty slots.
pub fn assemble(template: &Document, data: &FinalDocumentData) -> Result<Document, StructuralError> {
    assemble_indexed(template, &SlotIndex::build(template), data)
}

pub(crate) fn assemble_indexed(
    template: &Document,
    index: &SlotIndex,
    data: &FinalDocumentData,
) -> Result<Document, StructuralError> {
    let values = [
        (Slot::SignatureValue, data.signature_value.to_base64()),
        (Slot::Certificate, Base64::encode_string(&data.certificate_der)),
        (Slot::DocDigestValue, data.doc_digest.to_base64()),
        (Slot::PropsDigestValue, data.props_digest.to_base64()),
    ];

    let mut substitutions = Vec::with_capacity(values.len());
    for (slot, value) in values {
        let position = index.require(slot)?;
        let node = template
            .node_at(position)
            .ok_or(StructuralError::SlotCardinality { slot, found: 0 })?;
        match node.content() {
            Content::Text(scalar) if scalar.is_empty() => {}
            Content::Fields(fields) if fields.is_empty() => {}
            Content::Text(_) => return Err(StructuralError::SlotAlreadyFilled { slot }),
            Content::Fields(_) => return Err(StructuralError::SlotNotText { slot }),
        }
        substitutions.push((slot, position, node.with_text(value)));
    }

    let mut document = template.clone();
    for (slot, position, node) in substitutions {
        let target = document
            .node_at_mut(position)
            .ok_or(StructuralError::SlotCardinality { slot, found: 0 })?;
        *target = node;
    }
    log::debug!("assembled signed document <{}>", document.name());
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(with_certificate_slot: bool) -> Node {
        let x509 = if with_certificate_slot {
            Node::element().with_field("X509Certificate", Node::empty())
        } else {
            Node::element()
        };
        Node::element()
            .with_attribute("Id", "signature")
            .with_field(
                "SignedInfo",
                Node::element().with_fields(
                    "Reference",
                    vec![
                        Node::element()
                            .with_attribute("Id", "id-doc-signed-data")
                            .with_field("DigestValue", Node::empty()),
                        Node::element()
                            .with_attribute("URI", "#id-xades-signed-props")
                            .with_field("DigestValue", Node::empty()),
                    ],
                ),
            )
            .with_field("SignatureValue", Node::empty())
            .with_field("KeyInfo", Node::element().with_field("X509Data", x509))
    }

    fn template(signature: Node) -> Document {
        let path = Node::element().with_field(
            "UBLExtension",
            Node::element().with_field(
                "ExtensionContent",
                Node::element().with_field(
                    "UBLDocumentSignatures",
                    Node::element().with_field(
                        "SignatureInformation",
                        Node::element().with_field("Signature", signature),
                    ),
                ),
            ),
        );
        Document::new("Invoice", Node::element().with_field("UBLExtensions", path))
    }

    fn data() -> FinalDocumentData {
        use crate::digest::Digest;
        FinalDocumentData {
            signature_value: SignatureValue::from_bytes(vec![7; 4]),
            props_digest: PropsDigest::new(Digest::of(b"props")),
            doc_digest: DocDigest::new(Digest::of(b"doc")),
            certificate_der: vec![0x30, 0x00],
        }
    }

    fn slot_text(document: &Document, slot: Slot) -> String {
        let index = SlotIndex::build(document);
        let node = document
            .node_at(index.require(slot).expect("slot"))
            .expect("node");
        node.text_value().expect("text").render().into_owned()
    }

    #[test]
    fn fills_each_slot_without_touching_the_template() {
        let template = template(signature(true));
        let data = data();
        let signed = assemble(&template, &data).expect("assemble");
        assert_eq!(slot_text(&signed, Slot::SignatureValue), "BwcHBw==");
        assert_eq!(slot_text(&signed, Slot::Certificate), "MAA=");
        assert_eq!(slot_text(&signed, Slot::DocDigestValue), data.doc_digest.to_base64());
        assert_eq!(slot_text(&signed, Slot::PropsDigestValue), data.props_digest.to_base64());
        assert_eq!(slot_text(&template, Slot::SignatureValue), "");
    }

    #[test]
    fn missing_certificate_slot_is_named() {
        let err = assemble(&template(signature(false)), &data()).expect_err("no slot");
        assert!(matches!(
            err,
            StructuralError::SlotCardinality {
                slot: Slot::Certificate,
                found: 0
            }
        ));
    }

    #[test]
    fn duplicate_slot_is_rejected() {
        let doc = template(signature(true).with_field("SignatureValue", Node::empty()));
        let index = SlotIndex::build(&doc);
        assert_eq!(index.count(Slot::SignatureValue), 2);
        assert!(matches!(
            assemble(&doc, &data()),
            Err(StructuralError::SlotCardinality {
                slot: Slot::SignatureValue,
                found: 2
            })
        ));
    }

    #[test]
    fn slots_are_write_once() {
        let signed = assemble(&template(signature(true)), &data()).expect("assemble");
        assert!(matches!(
            assemble(&signed, &data()),
            Err(StructuralError::SlotAlreadyFilled {
                slot: Slot::SignatureValue
            })
        ));
    }
}
