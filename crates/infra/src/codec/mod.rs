//! Markup codec
//!
//! The SII services speak XML. Protocol code never touches XML directly: it
//! asks a [`MarkupCodec`] for a `serde_json::Value` tree and walks that tree
//! with [`find`] and [`text`].
//!
//! Tree shape produced by [`XmlCodec`]:
//! - the document is an object with a single key, the root element name
//! - elements are keyed by local name (namespace prefixes dropped)
//! - attributes become `@name` keys, mixed content becomes `#text`
//! - repeated children collapse into an array
//! - leaf elements are plain strings

mod xml;

use serde_json::Value;
use thiserror::Error;

pub use self::xml::XmlCodec;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed markup: {0}")]
    Malformed(String),

    #[error("cannot encode tree: {0}")]
    Unsupported(String),
}

/// Converts between markup text and a generic tree.
pub trait MarkupCodec: Send + Sync {
    fn decode(&self, markup: &str) -> Result<Value, CodecError>;

    fn encode(&self, tree: &Value) -> Result<String, CodecError>;
}

/// Follow `path` through nested objects. Arrays resolve to their first item.
pub fn find<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(tree, |node, key| first_item(node).get(key)).map(first_item)
}

/// Text content of a leaf or of an element carrying `#text`.
pub fn text(node: &Value) -> Option<String> {
    match first_item(node) {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map.get("#text").and_then(text),
        _ => None,
    }
}

/// Text at `path`, trimmed; `None` when absent or blank.
pub fn text_at(tree: &Value, path: &[&str]) -> Option<String> {
    find(tree, path)
        .and_then(text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Depth-first search for the first element named `name`.
pub fn find_element<'a>(tree: &'a Value, name: &str) -> Option<&'a Value> {
    match tree {
        Value::Object(map) => map.get(name).map(first_item).or_else(|| {
            map.iter()
                .filter(|(key, _)| !key.starts_with('@') && !key.starts_with('#'))
                .find_map(|(_, child)| find_element(child, name))
        }),
        Value::Array(items) => items.iter().find_map(|item| find_element(item, name)),
        _ => None,
    }
}

fn first_item(node: &Value) -> &Value {
    match node {
        Value::Array(items) => items.first().unwrap_or(node),
        other => other,
    }
}
