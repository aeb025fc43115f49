//! `quick-xml` backed codec

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use super::{CodecError, MarkupCodec};

/// XML ⇄ tree codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl XmlCodec {
    pub fn new() -> Self {
        Self
    }
}

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, CodecError> {
        let mut children = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(malformed)?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = format!("@{}", utf8(attr.key.local_name().as_ref())?);
            let value = attr.unescape_value().map_err(malformed)?;
            children.insert(key, Value::String(value.into_owned()));
        }

        Ok(Self { name: utf8(start.local_name().as_ref())?, children, text: String::new() })
    }

    fn close(self) -> (String, Value) {
        let Self { name, mut children, text } = self;
        if children.is_empty() {
            return (name, Value::String(text));
        }
        if !text.trim().is_empty() {
            children.insert("#text".to_string(), Value::String(text));
        }
        (name, Value::Object(children))
    }
}

fn insert_child(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.insert(name, value);
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<String, CodecError> {
    std::str::from_utf8(bytes).map(str::to_string).map_err(malformed)
}

fn malformed(err: impl std::fmt::Display) -> CodecError {
    CodecError::Malformed(err.to_string())
}

impl MarkupCodec for XmlCodec {
    fn decode(&self, markup: &str) -> Result<Value, CodecError> {
        let mut reader = Reader::from_str(markup);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<(String, Value)> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                CodecError::Malformed(format!("{e} at byte {}", reader.buffer_position()))
            })?;

            let closed = match event {
                Event::Start(start) => {
                    stack.push(Frame::open(&start)?);
                    None
                }
                Event::Empty(start) => Some(Frame::open(&start)?.close()),
                Event::End(_) => stack.pop().map(Frame::close),
                Event::Text(content) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(&content.unescape().map_err(malformed)?);
                    }
                    None
                }
                Event::CData(content) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(&String::from_utf8_lossy(&content));
                    }
                    None
                }
                Event::Eof => break,
                _ => None,
            };

            if let Some((name, value)) = closed {
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None if root.is_none() => root = Some((name, value)),
                    None => return Err(CodecError::Malformed("multiple root elements".into())),
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(CodecError::Malformed(format!("unclosed element <{}>", open.name)));
        }

        let (name, value) =
            root.ok_or_else(|| CodecError::Malformed("document has no root element".into()))?;
        let mut document = Map::new();
        document.insert(name, value);
        Ok(Value::Object(document))
    }

    fn encode(&self, tree: &Value) -> Result<String, CodecError> {
        let Value::Object(document) = tree else {
            return Err(CodecError::Unsupported("document must be an object".into()));
        };
        if document.len() != 1 {
            return Err(CodecError::Unsupported(format!(
                "document must have exactly one root, found {}",
                document.len()
            )));
        }

        let mut out = String::new();
        for (name, value) in document {
            write_element(&mut out, name, value)?;
        }
        Ok(out)
    }
}

fn write_element(out: &mut String, name: &str, value: &Value) -> Result<(), CodecError> {
    if name.is_empty() || name.starts_with('@') || name.starts_with('#') {
        return Err(CodecError::Unsupported(format!("invalid element name '{name}'")));
    }

    match value {
        Value::Array(items) => {
            for item in items {
                write_element(out, name, item)?;
            }
        }
        Value::Object(map) => {
            out.push('<');
            out.push_str(name);
            for (key, attr) in map.iter().filter(|(key, _)| key.starts_with('@')) {
                let text = scalar(attr).ok_or_else(|| {
                    CodecError::Unsupported(format!("attribute '{key}' must be a scalar"))
                })?;
                out.push_str(&format!(" {}=\"{}\"", &key[1..], escape(text.as_str())));
            }
            out.push('>');
            if let Some(text) = map.get("#text").and_then(scalar) {
                out.push_str(&escape(text.as_str()));
            }
            for (key, child) in map.iter().filter(|(key, _)| !key.starts_with(['@', '#'])) {
                write_element(out, key, child)?;
            }
            out.push_str(&format!("</{name}>"));
        }
        Value::Null => out.push_str(&format!("<{name}/>")),
        other => {
            let text = scalar(other).unwrap_or_default();
            out.push_str(&format!("<{name}>{}</{name}>", escape(text.as_str())));
        }
    }
    Ok(())
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
