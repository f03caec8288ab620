//! Three-state optional fields.
//!
//! Merging derived metadata into an existing front-matter block needs to know
//! whether a field was *assigned* during derivation, not only its final value:
//!
//! - [`Field::Unset`] — never assigned; left out of the merge entirely, so a
//!   same-named key from the parsed block survives.
//! - [`Field::Null`] — explicitly assigned "nothing"; written as `null`.
//! - [`Field::Value`] — explicitly assigned; written as the value.
//!
//! Document structs mark every `Field` with
//! `#[serde(skip_serializing_if = "Field::is_unset")]`.

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Unset,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn value_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Unset => Field::Unset,
            Self::Null => Field::Null,
            Self::Value(v) => Field::Value(f(v)),
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> From<Option<T>> for Field<T> {
    /// An explicit assignment: `None` becomes [`Field::Null`], never `Unset`.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Null,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Unset | Self::Null => serializer.serialize_none(),
        }
    }
}
