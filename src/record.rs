//! Read-only access to raw export rows.
//!
//! A [`RawRecord`] borrows one JSON object from the loaded batch and exposes
//! typed lookups that classify failures the same way the schemas do: a key
//! that is absent entirely is a [`ProcessingError`], a value of the wrong
//! type is a [`ValidationError`].

use crate::error::{ProcessingError, RecordError, ValidationError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path:?} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{0:?} must contain a JSON array of records")]
    NotAnArray(PathBuf),
}

/// Load a whole export file: one JSON array, read entirely into memory.
pub fn load_records(path: &Path) -> Result<Vec<Value>, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(LoadError::NotAnArray(path.to_path_buf())),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawRecord<'a> {
    pub fn new(value: &'a Value) -> Result<Self, ProcessingError> {
        value
            .as_object()
            .map(|fields| Self { fields })
            .ok_or(ProcessingError::NotAnObject)
    }

    pub fn fields(&self) -> &'a Map<String, Value> {
        self.fields
    }

    /// `None` for both an absent key and an explicit `null`.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// A string that must be present under a key that must exist.
    pub fn require_str(&self, key: &str) -> Result<&'a str, RecordError> {
        match self.fields.get(key) {
            None => Err(ProcessingError::MissingKey(key.to_string()).into()),
            Some(Value::Null) => Err(ValidationError::MissingField(key.to_string()).into()),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(ValidationError::wrong_type(key, "a string").into()),
        }
    }

    /// A string that may be absent or `null`.
    pub fn optional_str(&self, key: &str) -> Result<Option<&'a str>, ValidationError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(ValidationError::wrong_type(key, "a string")),
        }
    }

    /// A string, or the English entry of a translation mapping (`{"en": "..."}`).
    pub fn localized(&self, key: &str) -> Result<Option<&'a str>, RecordError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Object(map)) => match map.get("en") {
                Some(Value::String(s)) => Ok(Some(s)),
                Some(Value::Null) => Ok(None),
                Some(_) => Err(ValidationError::wrong_type(key, "a translated string").into()),
                None => Err(ProcessingError::shape(key, "translation mapping has no `en` entry").into()),
            },
            Some(_) => Err(ProcessingError::shape(key, "expected a string or a mapping").into()),
        }
    }

    /// A list of strings. `None` means the source held `null` or nothing.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, ValidationError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| ValidationError::wrong_type(key, "a list of strings"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ValidationError::wrong_type(key, "a list of strings"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Pretty-printed JSON of the whole row, for operator diagnostics.
    pub fn dump(&self) -> String {
        serde_json::to_string_pretty(self.fields).unwrap_or_else(|_| format!("{:?}", self.fields))
    }
}
