//! Presenter photo reconciliation.
//!
//! A presenter's photo ends up as one of three things:
//!
//! 1. A file already sitting next to the presenter documents
//!    (`{slug}.<ext>`, any extension but `.md`). Local files always win and
//!    are never refreshed, so curated replacements survive re-runs.
//! 2. A freshly downloaded copy of the exported `Picture` URL, saved as
//!    `{slug}.<ext>`.
//! 3. The raw exported value, when there is no output root, nothing to
//!    download, or the download failed.
//!
//! Downloads go through the [`Fetcher`] trait so tests can script responses.

use crate::field::Field;
use reqwest::header::CONTENT_TYPE;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

const USER_AGENT: &str = concat!("conference-content/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error(
        "don't know how to handle content type {} from {url}",
        .content_type.as_deref().unwrap_or("(none)")
    )]
    UnsupportedContentType {
        url: String,
        content_type: Option<String>,
    },
    #[error("cannot write photo {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A downloaded image body and the content type it was served with.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub trait Fetcher {
    /// Fetch `url`. Transport failures and non-success statuses are
    /// [`PhotoError::Fetch`].
    fn fetch(&self, url: &str) -> Result<FetchedImage, PhotoError>;
}

/// Blocking HTTP fetcher with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, PhotoError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, PhotoError> {
        let failed = |reason: String| PhotoError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .map_err(|e| failed(format!("failed to read body: {e}")))?;
        debug!(url, bytes = bytes.len(), content_type = ?content_type, "fetched photo");

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// First file in `dir` (lexical order) named `{slug}.<ext>`, ignoring `.md`.
///
/// A missing directory simply has no photos.
pub fn find_local_photo(dir: &Path, slug: &str) -> Option<String> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .find(|name| is_photo_for(name, slug))
}

fn is_photo_for(file_name: &str, slug: &str) -> bool {
    !slug.is_empty()
        && file_name
        .strip_prefix(slug)
        .is_some_and(|rest| rest.len() > 1 && rest.starts_with('.'))
        && !file_name.ends_with(".md")
}

/// Extension for a downloaded photo.
///
/// The URL's last path segment wins when it has a suffix. Otherwise the
/// content type decides: `image/<subtype>` without a structured-syntax `+`
/// gives `<subtype>`; anything else gives `None`.
pub fn extension_for(url: &str, content_type: Option<&str>) -> Option<String> {
    let from_url = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| last.rsplit_once('.'))
            .map(|(_, ext)| ext.to_string())
            .filter(|ext| !ext.is_empty())
    });
    if from_url.is_some() {
        return from_url;
    }

    let mime = content_type?.split(';').next()?.trim();
    mime.strip_prefix("image/")
        .filter(|subtype| !subtype.is_empty() && !subtype.contains('+'))
        .map(str::to_string)
}

/// Reconciles presenter photos against one asset directory.
pub struct PhotoResolver<'a> {
    fetcher: &'a dyn Fetcher,
    asset_dir: Option<PathBuf>,
}

impl<'a> PhotoResolver<'a> {
    /// `asset_dir` is `None` in emit mode: no lookups, no downloads.
    pub fn new(fetcher: &'a dyn Fetcher, asset_dir: Option<PathBuf>) -> Self {
        Self { fetcher, asset_dir }
    }

    /// Final photo value for the presenter with `slug`, given the exported one.
    ///
    /// Only an unsupported content type is an error; failed downloads are
    /// logged and fall back to the exported URL.
    pub fn resolve(&self, slug: &str, exported: Field<String>) -> Result<Field<String>, PhotoError> {
        let Some(dir) = &self.asset_dir else {
            return Ok(exported);
        };
        if let Some(local) = find_local_photo(dir, slug) {
            debug!(slug, photo = %local, "using existing photo");
            return Ok(Field::Value(local));
        }
        let url = match &exported {
            Field::Value(url) if url.starts_with("http") => url.clone(),
            _ => return Ok(exported),
        };

        let image = match self.fetcher.fetch(&url) {
            Ok(image) => image,
            Err(err @ PhotoError::Fetch { .. }) => {
                warn!(slug, "error downloading profile picture: {err}");
                return Ok(exported);
            }
            Err(err) => return Err(err),
        };
        let ext = extension_for(&url, image.content_type.as_deref()).ok_or_else(|| {
            PhotoError::UnsupportedContentType {
                url: url.clone(),
                content_type: image.content_type.clone(),
            }
        })?;

        let filename = format!("{slug}.{ext}");
        let path = dir.join(&filename);
        fs::create_dir_all(dir)
            .and_then(|()| fs::write(&path, &image.bytes))
            .map_err(|source| PhotoError::Io {
                path: path.clone(),
                source,
            })?;
        info!(slug, path = %path.display(), "saved profile picture");
        Ok(Field::Value(filename))
    }
}
