//! Per-record failure taxonomy.
//!
//! Every record that fails is classified into one of three kinds:
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | [`ValidationError`] | a field is missing, empty, or cannot be coerced to its declared type |
//! | [`PhotoError`] | a profile photo cannot be fetched or its content type is unusable |
//! | [`ProcessingError`] | anything else: missing keys, wrong nesting, I/O, serialization |
//!
//! All three are caught at the record boundary by the pipeline and wrapped in
//! [`RecordError`], so one bad row never aborts a batch.

use crate::photo::PhotoError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("required field `{0}` is missing or empty")]
    MissingField(String),
    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("field `{field}` is not a valid timestamp: {value:?}")]
    InvalidTimestamp { field: String, value: String },
    #[error("field `{field}` has unsupported value {value:?} (expected one of {allowed})")]
    NotAllowed {
        field: String,
        value: String,
        allowed: String,
    },
    #[error("unknown session type {0:?}")]
    UnknownSessionType(String),
    #[error("field `{field}` has no letters or digits to build a slug from: {value:?}")]
    Unsluggable { field: String, value: String },
}

impl ValidationError {
    pub fn wrong_type(field: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            field: field.into(),
            expected,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("key `{0}` is missing from the record")]
    MissingKey(String),
    #[error("unexpected shape for `{key}`: {detail}")]
    UnexpectedShape { key: String, detail: String },
    #[error("schedule entry {0:?} has no start time to address it by")]
    Unaddressable(String),
    #[error("front matter is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ProcessingError {
    pub fn shape(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            key: key.into(),
            detail: detail.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A failure attributed to a single record.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("resource error: {0}")]
    Resource(#[from] PhotoError),
    #[error("processing error: {0}")]
    Processing(#[from] ProcessingError),
}

impl RecordError {
    /// Short label for the failure kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Resource(_) => "resource",
            Self::Processing(_) => "processing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_field_names() {
        let err = ValidationError::wrong_type("Tags", "a list of strings");
        assert_eq!(err.to_string(), "field `Tags` must be a list of strings");

        let err: RecordError = ProcessingError::MissingKey("Room".into()).into();
        assert_eq!(
            err.to_string(),
            "processing error: key `Room` is missing from the record"
        );
        assert_eq!(err.kind(), "processing");
    }
}
