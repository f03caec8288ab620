//! Front-matter documents: parse, merge, render.
//!
//! A document is a YAML metadata block between `---` fences followed by a
//! free-text body:
//!
//! ```text
//! ---
//! name: Jane Doe
//! permalink: /presenters/jane-doe/
//! ---
//!
//! Jane writes compilers.
//! ```
//!
//! Exported biographies and session descriptions are parsed the same way, so
//! a speaker can ship their own front matter inside the bio. [`assemble`]
//! overlays the derived metadata on top of whatever block the text carried.
//! Keys are kept sorted, which keeps regenerated files diff-stable.

use crate::error::ProcessingError;
use serde::Serialize;
use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, serde_yaml::Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub metadata: Metadata,
    pub body: String,
}

fn is_fence(line: &str) -> bool {
    let line = line.trim_end();
    line.len() >= 3 && line.bytes().all(|b| b == b'-')
}

/// Strip trailing whitespace from every line.
pub fn strip_trailing_whitespace(text: &str) -> String {
    text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// Parse text into front matter and body.
///
/// Text without an opening fence, or with an unterminated one, is all body.
/// A block that parses to something other than a mapping contributes no
/// metadata. Malformed YAML inside a terminated block is an error.
pub fn parse(text: &str) -> Result<Document, ProcessingError> {
    let text = text.trim();
    let mut lines = text.split('\n');
    if !lines.next().is_some_and(is_fence) {
        return Ok(Document {
            metadata: Metadata::new(),
            body: text.to_string(),
        });
    }

    let rest: Vec<&str> = lines.collect();
    let Some(close) = rest.iter().position(|line| is_fence(line)) else {
        return Ok(Document {
            metadata: Metadata::new(),
            body: text.to_string(),
        });
    };

    let yaml = rest[..close].join("\n");
    let body = rest[close + 1..].join("\n").trim().to_string();
    let metadata = match serde_yaml::from_str::<serde_yaml::Value>(&yaml)? {
        serde_yaml::Value::Mapping(mapping) => mapping_to_metadata(mapping)?,
        _ => Metadata::new(),
    };
    Ok(Document { metadata, body })
}

fn mapping_to_metadata(mapping: serde_yaml::Mapping) -> Result<Metadata, ProcessingError> {
    mapping
        .into_iter()
        .map(|(key, value)| key_to_string(&key).map(|key| (key, value)))
        .collect()
}

fn key_to_string(key: &serde_yaml::Value) -> Result<String, ProcessingError> {
    use serde_yaml::Value;
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ProcessingError::shape(
            "front matter",
            format!("unsupported key {other:?}"),
        )),
    }
}

/// Serialize a derived document into metadata. Unset fields are absent.
pub fn to_metadata<T: Serialize>(derived: &T) -> Result<Metadata, ProcessingError> {
    match serde_yaml::to_value(derived)? {
        serde_yaml::Value::Mapping(mapping) => mapping_to_metadata(mapping),
        _ => Err(ProcessingError::shape(
            "document",
            "derived fields did not serialize to a mapping",
        )),
    }
}

/// Parse the free-text field and overlay derived metadata on it.
///
/// Trailing whitespace is stripped from every line before parsing. Derived
/// keys replace same-named keys from the parsed block; the body is kept.
pub fn assemble(text: &str, derived: Metadata) -> Result<Document, ProcessingError> {
    let mut document = parse(&strip_trailing_whitespace(text))?;
    document.metadata.extend(derived);
    Ok(document)
}

/// Render a document back to text with a trailing newline.
pub fn render(document: &Document) -> Result<String, ProcessingError> {
    let mut out = String::from("---\n");
    if !document.metadata.is_empty() {
        out.push_str(&serde_yaml::to_string(&document.metadata)?);
    }
    out.push_str("---\n");
    if !document.body.is_empty() {
        out.push('\n');
        out.push_str(&document.body);
        out.push('\n');
    }
    Ok(out)
}
