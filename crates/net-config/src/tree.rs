//! Generic document tree
//!
//! XML documents are held as `serde_json::Value` using the usual
//! xml-to-dict layout: attributes become `@name` keys, text next to child
//! elements becomes `#text`, a leaf element becomes a string, an empty
//! element becomes `null` and repeated siblings collapse into an array.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use serde_json::{Map, Value};

use ncif_core::{DecodeError, EncodeError};

/// Key holding element text when the element also has attributes or children
pub const TEXT_KEY: &str = "#text";
/// Prefix marking attribute keys
pub const ATTRIBUTE_PREFIX: char = '@';

struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
    has_children: bool,
}

impl Frame {
    fn new(start: &BytesStart<'_>) -> Result<Self, DecodeError> {
        let name = element_name(start.name().as_ref())?;
        let mut fields = Map::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| DecodeError::malformed(e.to_string()))?;
            let key = element_name(attribute.key.as_ref())?;
            let value = attribute
                .unescape_value()
                .map_err(|e| DecodeError::malformed(e.to_string()))?;
            fields.insert(
                format!("{}{}", ATTRIBUTE_PREFIX, key),
                Value::String(value.into_owned()),
            );
        }
        Ok(Self {
            name,
            fields,
            text: String::new(),
            has_children: false,
        })
    }

    fn into_value(self) -> (String, Value) {
        let Frame {
            name,
            mut fields,
            mut text,
            has_children,
        } = self;

        // Indentation between child elements is not content; leaf text is
        // kept exactly as written.
        if has_children && is_blank(&text) {
            text.clear();
        }
        let value = if fields.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            }
        } else {
            if !text.is_empty() {
                fields.insert(TEXT_KEY.to_string(), Value::String(text));
            }
            Value::Object(fields)
        };
        (name, value)
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

fn element_name(raw: &[u8]) -> Result<String, DecodeError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| DecodeError::malformed(format!("non UTF-8 name: {}", e)))
}

fn insert_child(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

/// Parse an XML document into a tree rooted at its single top-level element.
pub fn from_xml(document: &str) -> Result<Value, DecodeError> {
    let mut reader = Reader::from_str(document);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            DecodeError::malformed(format!(
                "parse error at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(start) => stack.push(Frame::new(&start)?),
            Event::Empty(start) => {
                let (name, value) = Frame::new(&start)?.into_value();
                attach(&mut stack, &mut root, name, value)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| DecodeError::malformed(e.to_string()))?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None if is_blank(&text) => {}
                    None => {
                        return Err(DecodeError::malformed(
                            "text outside of the root element",
                        ))
                    }
                }
            }
            Event::CData(data) => {
                let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&data);
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| DecodeError::malformed("unbalanced closing tag"))?;
                let (name, value) = frame.into_value();
                attach(&mut stack, &mut root, name, value)?;
            }
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if !stack.is_empty() {
        return Err(DecodeError::malformed("document ended inside an element"));
    }

    let (name, value) = root.ok_or_else(|| DecodeError::malformed("document has no root element"))?;
    let mut tree = Map::new();
    tree.insert(name, value);
    Ok(Value::Object(tree))
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<(String, Value)>,
    name: String,
    value: Value,
) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.has_children = true;
            insert_child(&mut parent.fields, name, value);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some((name, value));
            Ok(())
        }
        None => Err(DecodeError::malformed("document has more than one root element")),
    }
}

/// Serialize a tree produced by [`from_xml`] (or built by hand) back to XML.
///
/// The tree must be an object; every top-level key becomes a root element.
pub fn to_xml(tree: &Value) -> Result<String, EncodeError> {
    let roots = tree.as_object().ok_or_else(|| EncodeError::Serialize {
        reason: "document tree must be an object".to_string(),
    })?;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    for (name, value) in roots {
        write_element(&mut writer, name, value).map_err(|e| EncodeError::Serialize {
            reason: e.to_string(),
        })?;
    }

    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| EncodeError::Serialize {
        reason: e.to_string(),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &Value,
) -> quick_xml::Result<()> {
    match value {
        Value::Null => {
            writer.write_event(Event::Empty(BytesStart::new(name)))?;
        }
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
        }
        Value::Object(fields) => {
            let mut start = BytesStart::new(name);
            let mut has_content = false;
            for (key, field) in fields {
                if let Some(attribute) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    let text = scalar_text(field).unwrap_or_default();
                    start.push_attribute((attribute, text.as_str()));
                } else {
                    has_content = true;
                }
            }

            if !has_content {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }

            writer.write_event(Event::Start(start))?;
            for (key, field) in fields {
                if key.starts_with(ATTRIBUTE_PREFIX) {
                    continue;
                }
                if key == TEXT_KEY {
                    let text = scalar_text(field).unwrap_or_default();
                    writer.write_event(Event::Text(BytesText::new(&text)))?;
                } else {
                    write_element(writer, key, field)?;
                }
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        scalar => {
            let text = scalar_text(scalar).unwrap_or_default();
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
    }
    Ok(())
}
