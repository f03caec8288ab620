//! Validate existing site content against the document schemas.
//!
//! Walks every kind directory under the content root, parses each `.md`
//! file's front matter, and runs it through that kind's schema. Hand-edited
//! files and generated ones are checked the same way.

use crate::config::PathsConfig;
use crate::document;
use crate::error::{ProcessingError, RecordError};
use crate::schema::DocumentKind;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("content root {0:?} does not exist")]
    MissingRoot(PathBuf),
    #[error("cannot walk {path:?}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

#[derive(Debug)]
pub struct CheckFailure {
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub error: RecordError,
}

/// Files checked for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSummary {
    pub kind: DocumentKind,
    pub dir: PathBuf,
    pub checked: usize,
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub kinds: Vec<KindSummary>,
    pub failures: Vec<CheckFailure>,
}

impl CheckReport {
    pub fn checked(&self) -> usize {
        self.kinds.iter().map(|k| k.checked).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn kind_dir(content_root: &Path, paths: &PathsConfig, kind: DocumentKind) -> PathBuf {
    match kind {
        DocumentKind::Presenter => content_root.join(&paths.presenters),
        DocumentKind::Schedule => content_root.join(&paths.schedule),
        other => content_root.join(other.directory()),
    }
}

/// Check every document under `{root}/{content_dir}`. Missing kind
/// directories are reported with zero files.
pub fn check_site(root: &Path, paths: &PathsConfig) -> Result<CheckReport, CheckError> {
    let content_root = paths.content_root(root);
    if !content_root.is_dir() {
        return Err(CheckError::MissingRoot(content_root));
    }

    let mut report = CheckReport::default();
    for kind in DocumentKind::ALL {
        let dir = kind_dir(&content_root, paths, kind);
        let files = if dir.is_dir() { markdown_files(&dir)? } else { Vec::new() };
        debug!(%kind, dir = %dir.display(), files = files.len(), "checking");

        for path in &files {
            if let Err(error) = check_file(path, kind) {
                warn!(%kind, path = %path.display(), "{error}");
                report.failures.push(CheckFailure {
                    kind,
                    path: path.clone(),
                    error,
                });
            }
        }
        report.kinds.push(KindSummary {
            kind,
            dir,
            checked: files.len(),
        });
    }
    Ok(report)
}

fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>, CheckError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|source| CheckError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Validate one file's front matter against `kind`.
pub fn check_file(path: &Path, kind: DocumentKind) -> Result<(), RecordError> {
    let text = fs::read_to_string(path).map_err(|e| ProcessingError::io(path, e))?;
    let parsed = document::parse(&text)?;
    let fields = match serde_json::to_value(&parsed.metadata) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(ProcessingError::shape("front matter", "not a mapping").into()),
        Err(e) => return Err(ProcessingError::shape("front matter", e.to_string()).into()),
    };
    kind.schema().validate(&fields)?;
    Ok(())
}
