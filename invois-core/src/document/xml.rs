//! Markup (XML) codec built on quick-xml.
//!
//! Comments, processing instructions and the declaration are dropped on read.
//! Whitespace-only text between child elements is formatting and is ignored; any other
//! text next to child elements is rejected as mixed content.
use super::{Content, Document, Field, Node, StructuralError};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fmt::Display;

struct Frame {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    fields: Vec<Field>,
}

impl Frame {
    fn open(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self, StructuralError> {
        let name = utf8(start.name().as_ref(), reader)?.to_string();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| malformed(reader, err))?;
            let key = utf8(attribute.key.as_ref(), reader)?.to_string();
            let value = attribute
                .unescape_value()
                .map_err(|err| malformed(reader, err))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            text: String::new(),
            fields: Vec::new(),
        })
    }

    fn into_node(self) -> Result<(String, Node), StructuralError> {
        let content = if self.fields.is_empty() {
            Content::Text(super::Scalar::Text(self.text))
        } else if self.text.trim().is_empty() {
            Content::Fields(self.fields)
        } else {
            return Err(StructuralError::MixedContent { element: self.name });
        };
        Ok((
            self.name,
            Node {
                attributes: self.attributes,
                content,
            },
        ))
    }

    /// Consecutive siblings of one name share a field; an interrupted run starts a new one.
    fn push_child(&mut self, name: String, node: Node) {
        match self.fields.last_mut() {
            Some(field) if field.name == name => field.values.push(node),
            _ => self.fields.push(Field::new(name, vec![node])),
        }
    }
}

pub fn parse(text: &str) -> Result<Document, StructuralError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Node)> = None;
    loop {
        let event = reader.read_event().map_err(|err| malformed(&reader, err))?;
        match event {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(malformed(&reader, "more than one root element"));
                }
                stack.push(Frame::open(&start, &reader)?);
            }
            Event::Empty(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(malformed(&reader, "more than one root element"));
                }
                let frame = Frame::open(&start, &reader)?;
                close(frame, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| malformed(&reader, "closing tag without an open element"))?;
                close(frame, &mut stack, &mut root)?;
            }
            Event::Text(content) => {
                let content = content.unescape().map_err(|err| malformed(&reader, err))?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&content),
                    None if content.trim().is_empty() => {}
                    None => return Err(malformed(&reader, "text outside the root element")),
                }
            }
            Event::CData(data) => {
                let content = utf8(&data, &reader)?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(content),
                    None => return Err(malformed(&reader, "CDATA outside the root element")),
                }
            }
            Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(frame) = stack.pop() {
        return Err(StructuralError::UnclosedElement { element: frame.name });
    }
    let (name, node) = root.ok_or(StructuralError::MissingRoot)?;
    Ok(Document::new(name, node))
}

fn close(
    frame: Frame,
    stack: &mut [Frame],
    root: &mut Option<(String, Node)>,
) -> Result<(), StructuralError> {
    let (name, node) = frame.into_node()?;
    match stack.last_mut() {
        Some(parent) => parent.push_child(name, node),
        None => *root = Some((name, node)),
    }
    Ok(())
}

fn utf8<'b>(bytes: &'b [u8], reader: &Reader<&[u8]>) -> Result<&'b str, StructuralError> {
    std::str::from_utf8(bytes).map_err(|err| malformed(reader, err))
}

fn malformed(reader: &Reader<&[u8]>, err: impl Display) -> StructuralError {
    StructuralError::MalformedMarkup {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

/// Serialize with an XML declaration and no extra whitespace.
pub fn to_string(document: &Document) -> Result<String, StructuralError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(serialize_error)?;
    writer.get_mut().push(b'\n');
    write_element(&mut writer, document.name(), document.root())?;
    String::from_utf8(writer.into_inner()).map_err(serialize_error)
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    node: &Node,
) -> Result<(), StructuralError> {
    let mut start = BytesStart::new(name);
    for (key, value) in node.attributes() {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    writer
        .write_event(Event::Start(start))
        .map_err(serialize_error)?;
    match node.content() {
        Content::Text(scalar) => {
            let text = scalar.render();
            if !text.is_empty() {
                writer
                    .write_event(Event::Text(BytesText::new(&text)))
                    .map_err(serialize_error)?;
            }
        }
        Content::Fields(fields) => {
            for field in fields {
                for value in field.values() {
                    write_element(writer, field.name(), value)?;
                }
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(serialize_error)
}

fn serialize_error(err: impl Display) -> StructuralError {
    StructuralError::Serialize {
        message: err.to_string(),
    }
}
