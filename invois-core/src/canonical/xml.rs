use super::{CanonicalizationMethod, Canonicalizer};
use crate::document::{
    declared_prefix, prefix, Content, Document, ElementRef, NamespaceScope, Node, StructuralError,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlMode {
    /// Only namespaces visibly used by an element are rendered on it.
    Exclusive,
    /// Every in-scope namespace is rendered where it first differs from the output parent.
    Inclusive11,
}

/// XML canonicalization without comments.
///
/// Namespace declarations come first, default namespace then prefixes in order, followed
/// by attributes ordered by namespace URI and local name. Empty elements are written as
/// start/end pairs.
#[derive(Debug, Clone, Copy)]
pub struct XmlCanonicalizer {
    mode: XmlMode,
}

impl XmlCanonicalizer {
    pub fn exclusive() -> Self {
        Self {
            mode: XmlMode::Exclusive,
        }
    }

    pub fn inclusive11() -> Self {
        Self {
            mode: XmlMode::Inclusive11,
        }
    }

    pub fn mode(&self) -> XmlMode {
        self.mode
    }

    fn write_element(
        &self,
        name: &str,
        node: &Node,
        inherited: &NamespaceScope,
        rendered: &BTreeMap<String, String>,
        out: &mut String,
    ) -> Result<(), StructuralError> {
        let mut scope = inherited.clone();
        scope.extend_from(node);

        let element_prefix = prefix(name).unwrap_or("");
        if !element_prefix.is_empty() && scope.resolve(element_prefix).is_none() {
            return Err(unbound(name, element_prefix));
        }

        let mut attributes = Vec::new();
        let mut utilized = vec![element_prefix];
        for (key, value) in node.attributes() {
            if declared_prefix(key).is_some() {
                continue;
            }
            let namespace = match prefix(key) {
                Some(attribute_prefix) => {
                    let uri = scope
                        .resolve(attribute_prefix)
                        .ok_or_else(|| unbound(name, attribute_prefix))?;
                    if attribute_prefix != "xml" {
                        utilized.push(attribute_prefix);
                    }
                    uri
                }
                None => "",
            };
            attributes.push((namespace, crate::document::local_name(key), key.as_str(), value));
        }
        attributes.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let candidates: Vec<(&str, &str)> = match self.mode {
            XmlMode::Exclusive => utilized
                .iter()
                .map(|p| (*p, scope.resolve(p).unwrap_or("")))
                .collect(),
            XmlMode::Inclusive11 => scope.bindings().collect(),
        };

        let mut declarations: Vec<(&str, &str)> = Vec::new();
        let mut rendered_here = rendered.clone();
        for (namespace_prefix, uri) in candidates {
            let previous = rendered.get(namespace_prefix).map(String::as_str).unwrap_or("");
            if uri == previous || declarations.iter().any(|(p, _)| *p == namespace_prefix) {
                continue;
            }
            declarations.push((namespace_prefix, uri));
            rendered_here.insert(namespace_prefix.to_string(), uri.to_string());
        }
        declarations.sort_by(|a, b| a.0.cmp(b.0));

        out.push('<');
        out.push_str(name);
        for (namespace_prefix, uri) in &declarations {
            if namespace_prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(namespace_prefix);
                out.push_str("=\"");
            }
            escape_attribute(uri, out);
            out.push('"');
        }
        for (_, _, key, value) in &attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            escape_attribute(value, out);
            out.push('"');
        }
        out.push('>');

        match node.content() {
            Content::Text(scalar) => escape_text(&scalar.render(), out),
            Content::Fields(fields) => {
                for field in fields {
                    for value in field.values() {
                        self.write_element(field.name(), value, &scope, &rendered_here, out)?;
                    }
                }
            }
        }

        out.push_str("</");
        out.push_str(name);
        out.push('>');
        Ok(())
    }
}

impl Canonicalizer for XmlCanonicalizer {
    fn method(&self) -> CanonicalizationMethod {
        match self.mode {
            XmlMode::Exclusive => CanonicalizationMethod::ExclusiveXml,
            XmlMode::Inclusive11 => CanonicalizationMethod::InclusiveXml11,
        }
    }

    fn canonicalize(&self, document: &Document) -> Result<Vec<u8>, StructuralError> {
        self.canonicalize_element(&document.root_element())
    }

    fn canonicalize_element(&self, element: &ElementRef<'_>) -> Result<Vec<u8>, StructuralError> {
        let mut out = String::new();
        self.write_element(
            element.name,
            element.node,
            &element.scope,
            &BTreeMap::new(),
            &mut out,
        )?;
        Ok(out.into_bytes())
    }
}

fn unbound(element: &str, namespace_prefix: &str) -> StructuralError {
    StructuralError::UnboundPrefix {
        element: element.to_string(),
        prefix: namespace_prefix.to_string(),
    }
}

/// Text escapes of the C14N table; both quote characters stay literal in text.
fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

/// Attribute value escapes of the C14N table. `'` is never escaped, and `"` only here.
fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{xml, Position};

    const NESTED: &str = r#"<Invoice xmlns="urn:inv" xmlns:cbc="urn:cbc" xmlns:unused="urn:unused">
  <cbc:ID>1</cbc:ID>
  <Party xmlns:ds="urn:ds"><ds:Name  b="2" a="1">x</ds:Name><Empty/></Party>
</Invoice>"#;

    fn c14n(canonicalizer: XmlCanonicalizer, text: &str) -> String {
        let doc = xml::parse(text).expect("parse");
        String::from_utf8(canonicalizer.canonicalize(&doc).expect("c14n")).expect("utf8")
    }

    #[test]
    fn interrupted_repeats_stay_in_document_order() {
        let text = "<R><A>1</A><B>x</B><A>2</A></R>";
        assert_eq!(c14n(XmlCanonicalizer::exclusive(), text), text);
        assert_eq!(c14n(XmlCanonicalizer::inclusive11(), text), text);
    }

    #[test]
    fn quotes_follow_the_c14n_escape_table() {
        let text = r#"<R a="x&quot;y'z">a"b'c &amp; d</R>"#;
        assert_eq!(c14n(XmlCanonicalizer::exclusive(), text), text);
    }

    #[test]
    fn exclusive_renders_only_used_namespaces() {
        assert_eq!(
            c14n(XmlCanonicalizer::exclusive(), NESTED),
            concat!(
                r#"<Invoice xmlns="urn:inv"><cbc:ID xmlns:cbc="urn:cbc">1</cbc:ID>"#,
                r#"<Party><ds:Name xmlns:ds="urn:ds" a="1" b="2">x</ds:Name><Empty></Empty></Party>"#,
                r#"</Invoice>"#
            )
        );
    }

    #[test]
    fn inclusive_renders_all_namespaces_at_apex() {
        assert_eq!(
            c14n(XmlCanonicalizer::inclusive11(), NESTED),
            concat!(
                r#"<Invoice xmlns="urn:inv" xmlns:cbc="urn:cbc" xmlns:unused="urn:unused">"#,
                r#"<cbc:ID>1</cbc:ID>"#,
                r#"<Party xmlns:ds="urn:ds"><ds:Name a="1" b="2">x</ds:Name><Empty></Empty></Party>"#,
                r#"</Invoice>"#
            )
        );
    }

    #[test]
    fn subtree_uses_inherited_scope() {
        let doc = xml::parse(NESTED).expect("parse");
        let party = doc.element_at(&Position::root().child(1, 0)).expect("party");
        let exclusive = XmlCanonicalizer::exclusive()
            .canonicalize_element(&party)
            .expect("c14n");
        assert_eq!(
            String::from_utf8(exclusive).expect("utf8"),
            r#"<Party xmlns="urn:inv"><ds:Name xmlns:ds="urn:ds" a="1" b="2">x</ds:Name><Empty></Empty></Party>"#
        );
        let inclusive = XmlCanonicalizer::inclusive11()
            .canonicalize_element(&party)
            .expect("c14n");
        assert!(String::from_utf8(inclusive)
            .expect("utf8")
            .starts_with(r#"<Party xmlns="urn:inv" xmlns:cbc="urn:cbc" xmlns:ds="urn:ds" xmlns:unused="urn:unused">"#));
    }

    #[test]
    fn escapes_text_and_attributes() {
        let doc = xml::parse("<R a=\"&quot;&lt;&amp;&#9;\">&lt;&amp;&gt;&#13;\"</R>").expect("parse");
        let out = XmlCanonicalizer::exclusive().canonicalize(&doc).expect("c14n");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "<R a=\"&quot;&lt;&amp;&#x9;\">&lt;&amp;&gt;&#xD;\"</R>"
        );
    }

    #[test]
    fn unbound_prefix_is_structural() {
        let doc = xml::parse("<R><x:V>1</x:V></R>").expect("parse");
        let err = XmlCanonicalizer::exclusive()
            .canonicalize(&doc)
            .expect_err("unbound");
        assert!(matches!(err, StructuralError::UnboundPrefix { prefix, .. } if prefix == "x"));
    }

    #[test]
    fn default_namespace_is_undeclared_when_leaving_it() {
        let out = c14n(
            XmlCanonicalizer::exclusive(),
            r#"<R xmlns="urn:a"><C xmlns=""><D/></C></R>"#,
        );
        assert_eq!(out, r#"<R xmlns="urn:a"><C xmlns=""><D></D></C></R>"#);
    }
}
