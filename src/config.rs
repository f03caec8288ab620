//! Pipeline configuration.
//!
//! Handles loading, validating, and merging a `config.toml`. Stock defaults
//! describe one conference (Central time, two talk rooms, three tutorial
//! tracks); a user file overrides just the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! timezone = "America/Chicago"    # Conference time zone (IANA name)
//!
//! [schedule]
//! tutorial_length_minutes = 210   # Forced length of tutorial slots
//! default_track = "t0"            # Track for rooms missing from the table
//! accepted_states = ["accepted", "confirmed"]
//!
//! [schedule.tracks]               # Room name → track code
//! "Room A" = "t0"
//!
//! [schedule.session_types]        # Session type label → category
//! "Tutorials" = "tutorials"
//!
//! [paths]
//! content_dir = "src/_content"    # Relative to the output folder
//! presenters = "presenters"
//! schedule = "schedule"
//! presenter_assets = "presenters"
//!
//! [http]
//! timeout_secs = 30               # Photo download timeout
//! ```
//!
//! Tables merge key-by-key, so adding one room to `[schedule.tracks]` keeps
//! the stock rooms. Unknown keys are rejected to catch typos early.

use crate::schema::Category;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// The single time zone every schedule timestamp is converted into.
    pub timezone: String,
    pub schedule: ScheduleConfig,
    pub paths: PathsConfig,
    pub http: HttpConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Chicago".to_string(),
            schedule: ScheduleConfig::default(),
            paths: PathsConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.conference_tz()?;
        if self.schedule.default_track.trim().is_empty() {
            return Err(ConfigError::Validation(
                "schedule.default_track must not be empty".into(),
            ));
        }
        if self.schedule.accepted_states.is_empty() {
            return Err(ConfigError::Validation(
                "schedule.accepted_states must not be empty".into(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http.timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// The parsed conference time zone.
    pub fn conference_tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Validation(format!("unknown timezone {:?}", self.timezone)))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

/// Session-export interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Length forced onto every tutorial with a start time, in minutes.
    /// The public schedule deliberately differs from the submitted duration.
    pub tutorial_length_minutes: u32,
    /// Track code for rooms that are not in `tracks`.
    pub default_track: String,
    /// Proposal states that produce a schedule document.
    pub accepted_states: Vec<String>,
    /// Room name → track code.
    pub tracks: BTreeMap<String, String>,
    /// Session type label → category. Unknown labels fail the record.
    pub session_types: BTreeMap<String, Category>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let tracks = [
            ("Room A", "t0"),
            ("Room B", "t1"),
            ("Online talks", "t2"),
            ("Tutorial Track A", "t0"),
            ("Tutorial Track B", "t1"),
            ("Tutorial Track C", "t2"),
        ];
        let session_types = [
            ("25-minute talks", Category::Talks),
            ("45-minute talks", Category::Talks),
            ("Tutorials", Category::Tutorials),
        ];
        Self {
            tutorial_length_minutes: 210,
            default_track: "t0".to_string(),
            accepted_states: vec!["accepted".to_string(), "confirmed".to_string()],
            tracks: tracks
                .into_iter()
                .map(|(room, track)| (room.to_string(), track.to_string()))
                .collect(),
            session_types: session_types
                .into_iter()
                .map(|(label, category)| (label.to_string(), category))
                .collect(),
        }
    }
}

/// Where documents and assets go, relative to the output folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub content_dir: String,
    pub presenters: String,
    pub schedule: String,
    pub presenter_assets: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content_dir: "src/_content".to_string(),
            presenters: "presenters".to_string(),
            schedule: "schedule".to_string(),
            presenter_assets: "presenters".to_string(),
        }
    }
}

impl PathsConfig {
    pub fn content_root(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.content_dir)
    }

    pub fn presenter_dir(&self, output_root: &Path) -> PathBuf {
        self.content_root(output_root).join(&self.presenters)
    }

    pub fn schedule_dir(&self, output_root: &Path) -> PathBuf {
        self.content_root(output_root).join(&self.schedule)
    }

    pub fn presenter_asset_dir(&self, output_root: &Path) -> PathBuf {
        self.content_root(output_root).join(&self.presenter_assets)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Upper bound on a single photo download. Expiry counts as a failed fetch.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the pipeline config.
///
/// With no path the stock defaults are returned. With a path, the file must
/// exist; its values are merged on top of the stock defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Conference Content Configuration
# ================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Every schedule timestamp is converted into this zone (IANA name).
timezone = "America/Chicago"

# ---------------------------------------------------------------------------
# Session export
# ---------------------------------------------------------------------------
[schedule]
# Tutorials are submitted as 180 minutes but laid out as 210.
tutorial_length_minutes = 210
# Track used for rooms that are not listed in [schedule.tracks].
default_track = "t0"
# Only proposals in these states become schedule documents.
accepted_states = ["accepted", "confirmed"]

# Room name -> track code. Tables merge with the defaults key by key.
[schedule.tracks]
"Room A" = "t0"
"Room B" = "t1"
"Online talks" = "t2"
"Tutorial Track A" = "t0"
"Tutorial Track B" = "t1"
"Tutorial Track C" = "t2"

# Session type label -> category. A label missing here fails the record.
# Categories: break, lunch, rooms, social-event, sprints, talks, tutorials
[schedule.session_types]
"25-minute talks" = "talks"
"45-minute talks" = "talks"
"Tutorials" = "tutorials"

# ---------------------------------------------------------------------------
# Output layout (relative to --output-folder)
# ---------------------------------------------------------------------------
[paths]
content_dir = "src/_content"
presenters = "presenters"
schedule = "schedule"
# Downloaded profile photos live next to the presenter documents.
presenter_assets = "presenters"

# ---------------------------------------------------------------------------
# Photo downloads
# ---------------------------------------------------------------------------
[http]
# A download that takes longer than this is treated as failed.
timeout_secs = 30
"##
}
