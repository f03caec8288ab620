//! Output routing: where a rendered document goes.
//!
//! With an output root, documents land at deterministic paths:
//!
//! ```text
//! {root}/{content_dir}/{presenters}/{slug}.md
//! {root}/{content_dir}/{schedule}/{category}/{YYYY}-{MM}-{DD}-{HH}-{mm}-{track}-{slug}.md
//! ```
//!
//! Without one, rendered text is emitted to a sink instead (stdout in the CLI).
//! Existing files are overwritten; parent directories are created as needed.

use crate::config::PathsConfig;
use crate::error::ProcessingError;
use crate::schema::ScheduleDocument;
use chrono::DateTime;
use chrono_tz::Tz;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written(PathBuf),
    Emitted,
}

pub fn presenter_path(paths: &PathsConfig, root: &Path, slug: &str) -> PathBuf {
    paths.presenter_dir(root).join(format!("{slug}.md"))
}

/// `{YYYY}-{MM}-{DD}-{HH}-{mm}-{track}-{slug}.md`, zero-padded, in the
/// timestamp's own zone.
pub fn schedule_filename(start: &DateTime<Tz>, track: &str, slug: &str) -> String {
    format!("{}-{track}-{slug}.md", start.format("%Y-%m-%d-%H-%M"))
}

/// Address of a schedule entry. Entries without a start time have none.
pub fn schedule_path(
    paths: &PathsConfig,
    root: &Path,
    doc: &ScheduleDocument,
    slug: &str,
) -> Result<PathBuf, ProcessingError> {
    let start = doc.start().ok_or_else(|| {
        let title = doc.base.title.value().cloned().unwrap_or_else(|| slug.to_string());
        ProcessingError::Unaddressable(title)
    })?;
    let track = doc.track.value().map(String::as_str).unwrap_or_default();
    Ok(paths
        .schedule_dir(root)
        .join(doc.category.as_str())
        .join(schedule_filename(&start, track, slug)))
}

/// Write `rendered` to `path`, or emit it to `sink` when there is no path.
pub fn deliver(
    rendered: &str,
    path: Option<PathBuf>,
    sink: &mut dyn Write,
) -> Result<Outcome, ProcessingError> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| ProcessingError::io(parent, e))?;
            }
            fs::write(&path, rendered).map_err(|e| ProcessingError::io(&path, e))?;
            Ok(Outcome::Written(path))
        }
        None => {
            sink.write_all(rendered.as_bytes())
                .and_then(|()| sink.flush())
                .map_err(|e| ProcessingError::io("<output>", e))?;
            Ok(Outcome::Emitted)
        }
    }
}
