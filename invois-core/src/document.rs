//! Ordered document tree shared by the structured-object (JSON) and markup (XML) families.
//!
//! A document is a named root [`Node`]. Every node carries its attributes in insertion
//! order and either a text [`Scalar`] or a list of [`Field`]s. A field is a name plus one
//! or more value nodes, so repeatable elements (invoice lines, references) and single
//! elements share one shape.
//!
//! # Examples
//! ```rust
//! use invois_core::document::{Document, Node};
//!
//! let doc = Document::new(
//!     "Invoice",
//!     Node::element()
//!         .with_field("ID", Node::text("INV-1"))
//!         .with_field("IssueDate", Node::text("2024-01-01")),
//! );
//! assert_eq!(doc.root().fields().len(), 2);
//! ```
pub mod json;
pub mod namespaces;
mod number;
pub mod xml;

pub use number::Number;

use crate::config::DocumentFamily;
use crate::signing::template::Slot;
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

/// Text key used by the structured-object family for a node's scalar value.
pub const TEXT_KEY: &str = "_";

/// Root-level fields that make up the signature sub-tree.
const SIGNATURE_FIELDS: [&str; 2] = ["UBLExtensions", "Signature"];

/// Malformed input or a template that does not have the expected shape.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("malformed markup at byte {position}: {message}")]
    MalformedMarkup { position: u64, message: String },
    #[error("unbalanced markup: element <{element}> is never closed")]
    UnclosedElement { element: String },
    #[error("malformed JSON document: {message}")]
    MalformedJson { message: String },
    #[error("unexpected JSON value at {path}: {message}")]
    UnexpectedJson { path: String, message: &'static str },
    #[error("element <{element}> mixes text with child elements")]
    MixedContent { element: String },
    #[error("element <{element}> uses undeclared namespace prefix `{prefix}`")]
    UnboundPrefix { element: String, prefix: String },
    #[error("key `{key}` appears more than once in <{element}>")]
    DuplicateKey { element: String, key: String },
    #[error("invalid number `{value}`: {reason}")]
    InvalidNumber { value: String, reason: &'static str },
    #[error("document has no root element")]
    MissingRoot,
    #[error("root element <{element}> holds text instead of fields")]
    TextRoot { element: String },
    #[error("document already contains a signature sub-tree (`{field}`)")]
    SignaturePresent { field: String },
    #[error("slot {slot} resolved to {found} nodes, expected exactly one")]
    SlotCardinality { slot: Slot, found: usize },
    #[error("slot {slot} already holds a value")]
    SlotAlreadyFilled { slot: Slot },
    #[error("slot {slot} has child elements, expected a text leaf")]
    SlotNotText { slot: Slot },
    #[error("failed to serialize document: {message}")]
    Serialize { message: String },
}

/// Scalar value carried by a text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Text(String),
    Number(Number),
    Bool(bool),
}

impl Scalar {
    /// Single textual rendering used by both families' markup and canonical output.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Scalar::Text(text) => Cow::Borrowed(text),
            Scalar::Number(number) => Cow::Borrowed(number.as_str()),
            Scalar::Bool(true) => Cow::Borrowed("true"),
            Scalar::Bool(false) => Cow::Borrowed("false"),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Text(text) if text.is_empty())
    }
}

/// Node payload: a scalar leaf or an ordered list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(Scalar),
    Fields(Vec<Field>),
}

/// Named, repeatable child element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    values: Vec<Node>,
}

impl Field {
    pub fn new(name: impl Into<String>, values: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn values(&self) -> &[Node] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    attributes: Vec<(String, String)>,
    content: Content,
}

impl Node {
    /// Element node with no fields yet.
    pub fn element() -> Self {
        Self {
            attributes: Vec::new(),
            content: Content::Fields(Vec::new()),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::scalar(Scalar::Text(value.into()))
    }

    pub fn number(value: Number) -> Self {
        Self::scalar(Scalar::Number(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::scalar(Scalar::Bool(value))
    }

    /// Empty-but-present leaf.
    pub fn empty() -> Self {
        Self::text(String::new())
    }

    pub fn scalar(value: Scalar) -> Self {
        Self {
            attributes: Vec::new(),
            content: Content::Text(value),
        }
    }

    /// Set an attribute, replacing an existing one with the same name.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Append a value to the field called `name`, creating the field if needed.
    ///
    /// Adding a field to a text node turns it into an element node and drops the text.
    pub fn with_field(mut self, name: impl Into<String>, value: Node) -> Self {
        self.push_field(name, value);
        self
    }

    pub fn with_fields(mut self, name: impl Into<String>, values: Vec<Node>) -> Self {
        let name = name.into();
        for value in values {
            self.push_field(name.clone(), value);
        }
        self
    }

    pub fn push_field(&mut self, name: impl Into<String>, value: Node) {
        let name = name.into();
        if let Content::Text(_) = self.content {
            self.content = Content::Fields(Vec::new());
        }
        if let Content::Fields(fields) = &mut self.content {
            match fields.iter_mut().find(|field| field.name == name) {
                Some(field) => field.values.push(value),
                None => fields.push(Field::new(name, vec![value])),
            }
        }
    }

    /// Same attributes, new text content.
    pub fn with_text(&self, value: impl Into<String>) -> Self {
        Self {
            attributes: self.attributes.clone(),
            content: Content::Text(Scalar::Text(value.into())),
        }
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Fields of an element node; empty for text nodes.
    pub fn fields(&self) -> &[Field] {
        match &self.content {
            Content::Fields(fields) => fields,
            Content::Text(_) => &[],
        }
    }

    pub fn text_value(&self) -> Option<&Scalar> {
        match &self.content {
            Content::Text(scalar) => Some(scalar),
            Content::Fields(_) => None,
        }
    }

    /// First field whose local name (prefix ignored) matches.
    pub fn field(&self, local: &str) -> Option<&Field> {
        self.fields().iter().find(|field| field.local_name() == local)
    }

    /// True for an empty text leaf or an element without fields.
    pub fn is_blank(&self) -> bool {
        match &self.content {
            Content::Text(scalar) => scalar.is_empty(),
            Content::Fields(fields) => fields.is_empty(),
        }
    }

    pub(crate) fn fields_mut(&mut self) -> Option<&mut Vec<Field>> {
        match &mut self.content {
            Content::Fields(fields) => Some(fields),
            Content::Text(_) => None,
        }
    }
}

/// One step from a node to a child: field index, then value index within the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Step {
    pub field: usize,
    pub value: usize,
}

/// Address of a node inside a document, relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position(Vec<Step>);

impl Position {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, field: usize, value: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(Step { field, value });
        Self(steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }
}

/// Namespace bindings in effect at some point of a markup tree.
///
/// The default namespace is stored under the empty prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScope {
    bindings: BTreeMap<String, String>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    /// Add the `xmlns` / `xmlns:p` declarations carried by `node`.
    pub fn extend_from(&mut self, node: &Node) {
        for (key, value) in node.attributes() {
            if let Some(prefix) = declared_prefix(key) {
                self.declare(prefix, value.clone());
            }
        }
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(namespaces::XML_NS);
        }
        self.bindings
            .get(prefix)
            .map(String::as_str)
            .filter(|uri| !uri.is_empty() || prefix.is_empty())
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A node together with its element name and the namespaces inherited from its ancestors.
#[derive(Debug, Clone)]
pub struct ElementRef<'a> {
    pub name: &'a str,
    pub node: &'a Node,
    pub scope: NamespaceScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    name: String,
    root: Node,
}

impl Document {
    pub fn new(name: impl Into<String>, root: Node) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_element(&self) -> ElementRef<'_> {
        ElementRef {
            name: &self.name,
            node: &self.root,
            scope: NamespaceScope::new(),
        }
    }

    pub fn node_at(&self, position: &Position) -> Option<&Node> {
        position.steps().iter().try_fold(&self.root, |node, step| {
            node.fields().get(step.field)?.values.get(step.value)
        })
    }

    pub(crate) fn node_at_mut(&mut self, position: &Position) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for step in position.steps() {
            node = node
                .fields_mut()?
                .get_mut(step.field)?
                .values
                .get_mut(step.value)?;
        }
        Some(node)
    }

    pub(crate) fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Element at `position` with the namespace scope of its ancestors.
    pub fn element_at(&self, position: &Position) -> Option<ElementRef<'_>> {
        let mut scope = NamespaceScope::new();
        let mut name = self.name.as_str();
        let mut node = &self.root;
        for step in position.steps() {
            scope.extend_from(node);
            let field = node.fields().get(step.field)?;
            name = field.name();
            node = field.values.get(step.value)?;
        }
        Some(ElementRef { name, node, scope })
    }

    /// Name of the first root-level signature field, if any.
    pub fn signature_field(&self) -> Option<&str> {
        self.root
            .fields()
            .iter()
            .find(|field| SIGNATURE_FIELDS.contains(&field.local_name()))
            .map(Field::name)
    }

    pub fn has_signature(&self) -> bool {
        self.signature_field().is_some()
    }

    /// Copy of the document with the root-level signature sub-trees removed.
    pub fn without_signature(&self) -> Document {
        let root = match &self.root.content {
            Content::Fields(fields) => Node {
                attributes: self.root.attributes.clone(),
                content: Content::Fields(
                    fields
                        .iter()
                        .filter(|field| !SIGNATURE_FIELDS.contains(&field.local_name()))
                        .cloned()
                        .collect(),
                ),
            },
            Content::Text(_) => self.root.clone(),
        };
        Document::new(self.name.clone(), root)
    }
}

/// Document guaranteed to carry no signature sub-tree.
///
/// This is the only input the signing pipeline accepts; DocDigest is computed over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanDocument(Document);

impl CleanDocument {
    /// Reject documents that already contain `UBLExtensions` or a document-level `Signature`.
    pub fn new(document: Document) -> Result<Self, StructuralError> {
        if let Some(field) = document.signature_field() {
            return Err(StructuralError::SignaturePresent {
                field: field.to_string(),
            });
        }
        Ok(Self(document))
    }

    /// Wrap a tree produced by the document builder, which never emits signature fields.
    pub(crate) fn from_built(document: Document) -> Self {
        debug_assert!(!document.has_signature());
        Self(document)
    }

    /// Drop any signature sub-tree and keep the rest.
    pub fn strip(document: &Document) -> Self {
        Self(document.without_signature())
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

impl DocumentFamily {
    pub fn parse(self, text: &str) -> Result<Document, StructuralError> {
        match self {
            DocumentFamily::Json => json::parse(text),
            DocumentFamily::Xml => xml::parse(text),
        }
    }

    pub fn serialize(self, document: &Document) -> Result<String, StructuralError> {
        match self {
            DocumentFamily::Json => json::to_string(document),
            DocumentFamily::Xml => xml::to_string(document),
        }
    }
}

pub fn local_name(qualified: &str) -> &str {
    qualified
        .split_once(':')
        .map_or(qualified, |(_, local)| local)
}

pub fn prefix(qualified: &str) -> Option<&str> {
    qualified.split_once(':').map(|(prefix, _)| prefix)
}

/// Prefix declared by an `xmlns` / `xmlns:p` attribute name.
pub(crate) fn declared_prefix(attribute: &str) -> Option<&str> {
    if attribute == "xmlns" {
        Some("")
    } else {
        attribute.strip_prefix("xmlns:")
    }
}
