//! Shared test utilities.
//!
//! Row builders start from a complete, valid export row and let each test
//! override only the columns it cares about. [`ScriptedFetcher`] stands in
//! for the network.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let row = session_row(json!({"Proposal state": "rejected"}));
//! let fetcher = ScriptedFetcher::image("image/png");
//! ```

use crate::photo::{FetchedImage, Fetcher, PhotoError};
use serde_json::{Value, json};
use std::cell::Cell;

// =========================================================================
// Export rows
// =========================================================================

/// Overlay `overrides` (a JSON object) on top of `base`, key by key.
fn overlay(mut base: Value, overrides: Value) -> Value {
    if let (Some(base), Value::Object(overrides)) = (base.as_object_mut(), overrides) {
        base.extend(overrides);
    }
    base
}

/// A presenter-export row with every column present.
pub fn presenter_row(overrides: Value) -> Value {
    overlay(
        json!({
            "Name": "Jane Doe",
            "Biography": "",
            "Picture": null,
            "Organization or Affiliation": "",
            "URL": null,
            "github": null,
            "What is your mastodon/fediverse handle?": null,
            "Twitter handle": null,
            "instagram": null,
            "bluesky": null
        }),
        overrides,
    )
}

/// An accepted 25-minute talk in Room A.
pub fn session_row(overrides: Value) -> Value {
    overlay(
        json!({
            "Proposal state": "accepted",
            "Proposal title": "Untitled talk",
            "Session type": {"en": "25-minute talks"},
            "Tags": [],
            "Description": "",
            "Speaker names": ["Jane Doe"],
            "Room": {"en": "Room A"},
            "Start": "2024-05-01T09:00:00",
            "End": "2024-05-01T09:25:00"
        }),
        overrides,
    )
}

// =========================================================================
// Fetcher stub
// =========================================================================

/// A [`Fetcher`] that answers every request the same way and counts calls.
pub struct ScriptedFetcher {
    content_type: Option<&'static str>,
    fail: bool,
    calls: Cell<usize>,
}

impl ScriptedFetcher {
    pub const BODY: &'static [u8] = b"\x89PNG\r\n\x1a\nnot really a png";

    /// Succeeds with [`Self::BODY`] served as `content_type`.
    pub fn image(content_type: &'static str) -> Self {
        Self {
            content_type: Some(content_type),
            fail: false,
            calls: Cell::new(0),
        }
    }

    /// Fails every request with [`PhotoError::Fetch`].
    pub fn failing() -> Self {
        Self {
            content_type: None,
            fail: true,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, PhotoError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(PhotoError::Fetch {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(FetchedImage {
            bytes: Self::BODY.to_vec(),
            content_type: self.content_type.map(str::to_string),
        })
    }
}
