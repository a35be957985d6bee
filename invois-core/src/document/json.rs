//! Structured-object (JSON) codec.
//!
//! The top-level object holds the root's string attributes (namespace markers such as
//! `_D`) and exactly one array member whose single element is the root node. Inside a
//! node object, `"_"` holds the text scalar, other string members are attributes, and array
//! members are fields.
use super::{Content, Document, Field, Node, Number, Scalar, StructuralError, TEXT_KEY};
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Parse a structured-object document. Repeated object keys are rejected.
///
/// Numbers keep their source digits, so amounts carry no binary rounding.
pub fn parse(text: &str) -> Result<Document, StructuralError> {
    reject_duplicate_keys(text)?;
    let value: Value = serde_json::from_str(text).map_err(malformed)?;
    from_value(&value)
}

fn malformed(err: serde_json::Error) -> StructuralError {
    StructuralError::MalformedJson {
        message: err.to_string(),
    }
}

// `Value` keeps the last of two equal keys, so repeats are caught in a separate pass.
fn reject_duplicate_keys(text: &str) -> Result<(), StructuralError> {
    let mut duplicate = None;
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let checked = KeyCheck {
        element: "$",
        duplicate: &mut duplicate,
    }
    .deserialize(&mut deserializer)
    .and_then(|()| deserializer.end());
    match (checked, duplicate) {
        (_, Some((element, key))) => Err(StructuralError::DuplicateKey { element, key }),
        (Err(err), None) => Err(malformed(err)),
        (Ok(()), None) => Ok(()),
    }
}

/// Walks a JSON text without building it, recording the first repeated key and the
/// member that holds it.
struct KeyCheck<'a> {
    element: &'a str,
    duplicate: &'a mut Option<(String, String)>,
}

impl<'de> DeserializeSeed<'de> for KeyCheck<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for KeyCheck<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<(), E> {
        Ok(())
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<(), E> {
        Ok(())
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<(), E> {
        Ok(())
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<(), E> {
        Ok(())
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<(), E> {
        Ok(())
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while seq
            .next_element_seed(KeyCheck {
                element: self.element,
                duplicate: &mut *self.duplicate,
            })?
            .is_some()
        {}
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if seen.contains(&key) {
                let message = format!("duplicate key `{key}` in `{}`", self.element);
                *self.duplicate = Some((self.element.to_string(), key));
                return Err(de::Error::custom(message));
            }
            map.next_value_seed(KeyCheck {
                element: &key,
                duplicate: &mut *self.duplicate,
            })?;
            seen.insert(key);
        }
        Ok(())
    }
}

pub fn from_value(value: &Value) -> Result<Document, StructuralError> {
    let Value::Object(members) = value else {
        return Err(StructuralError::UnexpectedJson {
            path: "$".into(),
            message: "document must be an object",
        });
    };

    let mut attributes = Vec::new();
    let mut root: Option<(String, Node)> = None;
    for (key, member) in members {
        let path = format!("$.{key}");
        match member {
            Value::String(text) => attributes.push((key.clone(), text.clone())),
            Value::Array(items) => {
                if root.is_some() {
                    return Err(StructuralError::UnexpectedJson {
                        path,
                        message: "document holds more than one root field",
                    });
                }
                let [item] = items.as_slice() else {
                    return Err(StructuralError::UnexpectedJson {
                        path,
                        message: "root field must hold exactly one node",
                    });
                };
                root = Some((key.clone(), node_from_value(item, &format!("{path}[0]"))?));
            }
            _ => {
                return Err(StructuralError::UnexpectedJson {
                    path,
                    message: "expected a string attribute or the root array",
                });
            }
        }
    }

    let (name, mut node) = root.ok_or(StructuralError::MissingRoot)?;
    // Marker attributes always lead the root's attribute list.
    attributes.append(&mut node.attributes);
    node.attributes = attributes;
    Ok(Document::new(name, node))
}

fn node_from_value(value: &Value, path: &str) -> Result<Node, StructuralError> {
    let Value::Object(members) = value else {
        return Err(StructuralError::UnexpectedJson {
            path: path.to_string(),
            message: "expected an object node",
        });
    };

    let mut node = Node::element();
    let mut text = None;
    let mut has_fields = false;
    for (key, member) in members {
        let member_path = format!("{path}.{key}");
        match member {
            _ if key == TEXT_KEY => text = Some(scalar_from_value(member, &member_path)?),
            Value::String(value) => node.attributes.push((key.clone(), value.clone())),
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(StructuralError::UnexpectedJson {
                        path: member_path,
                        message: "field must hold at least one node",
                    });
                }
                for (index, item) in items.iter().enumerate() {
                    let child = node_from_value(item, &format!("{member_path}[{index}]"))?;
                    node.push_field(key.clone(), child);
                }
                has_fields = true;
            }
            _ => {
                return Err(StructuralError::UnexpectedJson {
                    path: member_path,
                    message: "expected a string attribute or an array field",
                });
            }
        }
    }

    match text {
        Some(_) if has_fields => Err(StructuralError::MixedContent {
            element: path.to_string(),
        }),
        Some(scalar) => {
            node.content = Content::Text(scalar);
            Ok(node)
        }
        None => Ok(node),
    }
}

fn scalar_from_value(value: &Value, path: &str) -> Result<Scalar, StructuralError> {
    match value {
        Value::String(text) => Ok(Scalar::Text(text.clone())),
        Value::Number(number) => Number::parse(&number.to_string()).map(Scalar::Number),
        Value::Bool(flag) => Ok(Scalar::Bool(*flag)),
        _ => Err(StructuralError::UnexpectedJson {
            path: path.to_string(),
            message: "text value must be a string, number or boolean",
        }),
    }
}

/// Compact serialization in document order.
pub fn to_string(document: &Document) -> Result<String, StructuralError> {
    let mut out = String::new();
    write_document(document, KeyOrder::Document, &mut out)?;
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyOrder {
    Document,
    Sorted,
}

enum Member<'a> {
    Attribute(&'a str),
    Text(&'a Scalar),
    Field(&'a [Node]),
    Body(&'a Node),
}

pub(crate) fn write_document(
    document: &Document,
    order: KeyOrder,
    out: &mut String,
) -> Result<(), StructuralError> {
    let root = document.root();
    let mut members: Vec<(&str, Member<'_>)> = root
        .attributes()
        .iter()
        .map(|(key, value)| (key.as_str(), Member::Attribute(value)))
        .collect();
    members.push((document.name(), Member::Body(root)));
    write_object("$", members, order, out)
}

/// Write a single element as a node object (attributes, text and fields).
pub(crate) fn write_element(
    name: &str,
    node: &Node,
    order: KeyOrder,
    out: &mut String,
) -> Result<(), StructuralError> {
    let mut members = attribute_members(node);
    members.extend(content_members(node));
    write_object(name, members, order, out)
}

fn attribute_members(node: &Node) -> Vec<(&str, Member<'_>)> {
    node.attributes()
        .iter()
        .map(|(key, value)| (key.as_str(), Member::Attribute(value)))
        .collect()
}

fn content_members(node: &Node) -> Vec<(&str, Member<'_>)> {
    match node.content() {
        Content::Text(scalar) => vec![(TEXT_KEY, Member::Text(scalar))],
        Content::Fields(fields) => fields
            .iter()
            .map(|field: &Field| (field.name(), Member::Field(field.values())))
            .collect(),
    }
}

fn write_object(
    element: &str,
    mut members: Vec<(&str, Member<'_>)>,
    order: KeyOrder,
    out: &mut String,
) -> Result<(), StructuralError> {
    if order == KeyOrder::Sorted {
        members.sort_by(|a, b| a.0.cmp(b.0));
    }
    let mut seen = HashSet::with_capacity(members.len());
    for (key, _) in &members {
        if !seen.insert(*key) {
            return Err(StructuralError::DuplicateKey {
                element: element.to_string(),
                key: key.to_string(),
            });
        }
    }

    out.push('{');
    for (index, (key, member)) in members.into_iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        write_string(key, out)?;
        out.push(':');
        match member {
            Member::Attribute(value) => write_string(value, out)?,
            Member::Text(scalar) => write_scalar(scalar, out)?,
            Member::Field(values) => {
                out.push('[');
                for (position, value) in values.iter().enumerate() {
                    if position > 0 {
                        out.push(',');
                    }
                    write_element(key, value, order, out)?;
                }
                out.push(']');
            }
            Member::Body(root) => {
                out.push('[');
                write_object(key, content_members(root), order, out)?;
                out.push(']');
            }
        }
    }
    out.push('}');
    Ok(())
}

fn write_scalar(scalar: &Scalar, out: &mut String) -> Result<(), StructuralError> {
    match scalar {
        Scalar::Text(text) => write_string(text, out),
        Scalar::Number(number) => {
            out.push_str(number.as_str());
            Ok(())
        }
        Scalar::Bool(flag) => {
            out.push_str(if *flag { "true" } else { "false" });
            Ok(())
        }
    }
}

fn write_string(text: &str, out: &mut String) -> Result<(), StructuralError> {
    let encoded = serde_json::to_string(text).map_err(|err| StructuralError::Serialize {
        message: err.to_string(),
    })?;
    out.push_str(&encoded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"_D":"urn:invoice","Invoice":[{"ID":[{"_":"INV-1"}],"InvoiceLine":[{"ID":[{"_":"1"}]},{"ID":[{"_":"2"}]}],"TaxAmount":[{"_":10.50,"currencyID":"MYR"}]}]}"#;

    #[test]
    fn parses_root_markers_and_fields() {
        let doc = parse(SAMPLE).expect("parse");
        assert_eq!(doc.name(), "Invoice");
        assert_eq!(doc.root().attribute("_D"), Some("urn:invoice"));
        let lines = doc.root().field("InvoiceLine").expect("lines");
        assert_eq!(lines.values().len(), 2);
        let tax = &doc.root().field("TaxAmount").expect("tax").values()[0];
        assert_eq!(tax.attribute("currencyID"), Some("MYR"));
        assert_eq!(tax.text_value().map(|s| s.render().into_owned()), Some("10.5".into()));
    }

    #[test]
    fn document_order_round_trip() {
        let doc = parse(SAMPLE).expect("parse");
        let text = to_string(&doc).expect("serialize");
        assert_eq!(parse(&text).expect("reparse"), doc);
        assert!(text.starts_with(r#"{"_D":"urn:invoice","Invoice":[{"ID""#));
    }

    #[test]
    fn rejects_shapes_outside_the_mapping() {
        let cases = [
            r#"[]"#,
            r#"{"_D":"x"}"#,
            r#"{"A":[{}],"B":[{}]}"#,
            r#"{"Invoice":[{},{}]}"#,
            r#"{"Invoice":[{"ID":[]}]}"#,
            r#"{"Invoice":[{"ID":5}]}"#,
            r#"{"Invoice":[{"ID":[{"_":null}]}]}"#,
            r#"{"Invoice":[{"_":"text","ID":[{"_":"1"}]}]}"#,
        ];
        for case in cases {
            assert!(parse(case).is_err(), "accepted {case}");
        }
    }

    #[test]
    fn malformed_json_is_structural() {
        let err = parse(r#"{"Invoice":[{"#).expect_err("truncated");
        assert!(matches!(err, StructuralError::MalformedJson { .. }));
    }

    #[test]
    fn repeated_keys_are_rejected() {
        let err = parse(r#"{"Invoice":[{"ID":[{"_":"A"}],"ID":[{"_":"B"}]}]}"#)
            .expect_err("repeated field");
        assert!(matches!(
            err,
            StructuralError::DuplicateKey { element, key } if element == "Invoice" && key == "ID"
        ));

        let err = parse(r#"{"_D":"urn:a","_D":"urn:b","Invoice":[{}]}"#).expect_err("markers");
        assert!(matches!(
            err,
            StructuralError::DuplicateKey { element, key } if element == "$" && key == "_D"
        ));

        let err = parse(r#"{"Invoice":[{"Party":[{"Name":[{"_":"x","_":"y"}]}]}]}"#)
            .expect_err("nested text");
        assert!(matches!(err, StructuralError::DuplicateKey { element, .. } if element == "Name"));
    }

    #[test]
    fn numbers_keep_their_source_digits() {
        let doc = parse(
            r#"{"Invoice":[{"Amount":[{"_":123456789012345678901234.5}],"Rate":[{"_":0.1000000000000000055511151231257827}],"Unit":[{"_":2.50e1}]}]}"#,
        )
        .expect("parse");
        assert_eq!(
            to_string(&doc).expect("serialize"),
            r#"{"Invoice":[{"Amount":[{"_":123456789012345678901234.5}],"Rate":[{"_":0.1000000000000000055511151231257827}],"Unit":[{"_":25}]}]}"#
        );
    }

    #[test]
    fn attribute_field_collision_is_duplicate_key() {
        let node = Node::element()
            .with_attribute("ID", "attr")
            .with_field("ID", Node::text("field"));
        let mut out = String::new();
        let err = write_element("Party", &node, KeyOrder::Sorted, &mut out).expect_err("dup");
        assert!(matches!(err, StructuralError::DuplicateKey { key, .. } if key == "ID"));
    }
}
