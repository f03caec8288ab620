//! Batch driver: loaded export rows → delivered documents.
//!
//! Each row runs through validation → derivation → (photo reconciliation) →
//! assembly → routing. A row that fails at any step is logged with its raw
//! contents and recorded in the [`BatchReport`]; the batch carries on with
//! the next row.

use crate::config::{ConfigError, PipelineConfig};
use crate::derive::{self, AnonymousSpeakers};
use crate::document::{assemble, render, to_metadata};
use crate::error::RecordError;
use crate::photo::{Fetcher, PhotoResolver};
use crate::record::RawRecord;
use crate::route::{self, Outcome};
use crate::schema::{Surface, columns};
use chrono_tz::Tz;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// One row that could not be turned into a document.
#[derive(Debug)]
pub struct RecordFailure {
    /// Position in the export, from 0.
    pub index: usize,
    pub error: RecordError,
    /// Pretty-printed raw row.
    pub record: String,
}

/// Summary of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    pub written: Vec<PathBuf>,
    pub emitted: usize,
    /// Sessions outside the accepted proposal states.
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.written.len() + self.emitted
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Step {
    Delivered(Outcome),
    Skipped,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    tz: Tz,
    output_root: Option<PathBuf>,
    fetcher: &'a dyn Fetcher,
}

impl<'a> Pipeline<'a> {
    /// `output_root` of `None` means emit mode: documents go to the sink
    /// passed to each run, and no photos are looked up or downloaded.
    pub fn new(
        config: &'a PipelineConfig,
        output_root: Option<PathBuf>,
        fetcher: &'a dyn Fetcher,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tz = config.conference_tz()?;
        Ok(Self {
            config,
            tz,
            output_root,
            fetcher,
        })
    }

    pub fn run_presenters(&self, records: &[Value], sink: &mut dyn Write) -> BatchReport {
        let mut anonymous = AnonymousSpeakers::new();
        let asset_dir = self
            .output_root
            .as_deref()
            .map(|root| self.config.paths.presenter_asset_dir(root));
        let photos = PhotoResolver::new(self.fetcher, asset_dir);

        run_batch(records, |row| {
            self.presenter(row, &mut anonymous, &photos, sink)
                .map(Step::Delivered)
        })
    }

    pub fn run_schedule(&self, records: &[Value], sink: &mut dyn Write) -> BatchReport {
        run_batch(records, |row| self.session(row, sink))
    }

    fn presenter(
        &self,
        row: &Value,
        anonymous: &mut AnonymousSpeakers,
        photos: &PhotoResolver<'_>,
        sink: &mut dyn Write,
    ) -> Result<Outcome, RecordError> {
        let record = RawRecord::new(row)?;
        Surface::Presenters.schema().validate(record.fields())?;

        let mut doc = derive::derive_presenter(&record, anonymous)?;
        let slug = doc.slug();
        doc.photo = photos.resolve(&slug, std::mem::take(&mut doc.photo))?;

        let biography = record.optional_str(columns::BIOGRAPHY)?.unwrap_or_default();
        let document = assemble(biography, to_metadata(&doc)?)?;
        let path = self
            .output_root
            .as_deref()
            .map(|root| route::presenter_path(&self.config.paths, root, &slug));
        Ok(route::deliver(&render(&document)?, path, sink)?)
    }

    fn session(&self, row: &Value, sink: &mut dyn Write) -> Result<Step, RecordError> {
        let record = RawRecord::new(row)?;
        if !derive::is_accepted(&record, &self.config.schedule)? {
            debug!("skipping session outside the accepted states");
            return Ok(Step::Skipped);
        }
        Surface::Sessions.schema().validate(record.fields())?;

        let derived = derive::derive_schedule(&record, &self.config.schedule, self.tz)?;
        let description = record.optional_str(columns::DESCRIPTION)?.unwrap_or_default();
        let document = assemble(description, to_metadata(&derived.document)?)?;
        let path = self
            .output_root
            .as_deref()
            .map(|root| route::schedule_path(&self.config.paths, root, &derived.document, &derived.slug))
            .transpose()?;
        Ok(Step::Delivered(route::deliver(&render(&document)?, path, sink)?))
    }
}

fn run_batch(
    records: &[Value],
    mut process: impl FnMut(&Value) -> Result<Step, RecordError>,
) -> BatchReport {
    let mut report = BatchReport {
        total: records.len(),
        ..BatchReport::default()
    };

    for (index, row) in records.iter().enumerate() {
        debug!(index, "processing record");
        match process(row) {
            Ok(Step::Delivered(Outcome::Written(path))) => {
                info!(index, path = %path.display(), "wrote document");
                report.written.push(path);
            }
            Ok(Step::Delivered(Outcome::Emitted)) => report.emitted += 1,
            Ok(Step::Skipped) => report.skipped += 1,
            Err(err) => {
                let dump = serde_json::to_string_pretty(row).unwrap_or_else(|_| row.to_string());
                error!(index, kind = err.kind(), record = %dump, "failed to process record: {err}");
                report.failures.push(RecordFailure {
                    index,
                    error: err,
                    record: dump,
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProcessingError, ValidationError};
    use crate::test_helpers::{ScriptedFetcher, presenter_row, session_row};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn emit_pipeline<'a>(config: &'a PipelineConfig, fetcher: &'a ScriptedFetcher) -> Pipeline<'a> {
        Pipeline::new(config, None, fetcher).unwrap()
    }

    // =========================================================================
    // Presenters
    // =========================================================================

    #[test]
    fn presenter_without_output_root_is_emitted() {
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/png");
        let rows = vec![presenter_row(json!({
            "Name": "Jane Doe",
            "Biography": "---\npronouns: she/her\n---\nJane writes compilers.",
            "Picture": "https://cdn.example.com/jane"
        }))];

        let mut sink = Vec::new();
        let report = emit_pipeline(&config, &fetcher).run_presenters(&rows, &mut sink);
        let out = String::from_utf8(sink).unwrap();

        assert_eq!(report.emitted, 1);
        assert!(report.is_clean());
        assert!(out.starts_with("---\n"));
        assert!(out.contains("name: Jane Doe\n"));
        assert!(out.contains("pronouns: she/her\n"));
        assert!(out.contains("photo: https://cdn.example.com/jane\n"));
        assert!(out.ends_with("\nJane writes compilers.\n"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn failing_presenter_does_not_stop_the_batch() {
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/png");
        let rows = vec![
            presenter_row(json!({"Name": "Jane Doe"})),
            presenter_row(json!({"Name": 7})),
            json!("not a record"),
            presenter_row(json!({"Name": "Joe Bloggs"})),
        ];

        let report = emit_pipeline(&config, &fetcher).run_presenters(&rows, &mut Vec::new());
        assert_eq!(report.total, 4);
        assert_eq!(report.emitted, 2);
        let indices: Vec<usize> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(indices, [1, 2]);
        assert_eq!(report.failures[0].error.kind(), "validation");
        assert_eq!(report.failures[1].error.kind(), "processing");
        assert!(report.failures[0].record.contains("\"Name\": 7"));
    }

    #[test]
    fn presenters_are_written_with_downloaded_photos() {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/jpeg");
        let pipeline = Pipeline::new(&config, Some(tmp.path().to_path_buf()), &fetcher).unwrap();
        let rows = vec![presenter_row(json!({
            "Name": "Jane Doe",
            "Picture": "https://cdn.example.com/avatars/1234"
        }))];

        let report = pipeline.run_presenters(&rows, &mut Vec::new());
        let dir = tmp.path().join("src/_content/presenters");
        assert_eq!(report.written, [dir.join("jane-doe.md")]);

        let text = fs::read_to_string(dir.join("jane-doe.md")).unwrap();
        assert!(text.contains("photo: jane-doe.jpeg\n"));
        assert!(text.contains("permalink: /presenters/jane-doe/\n"));
        assert!(dir.join("jane-doe.jpeg").exists());
    }

    #[test]
    fn punctuation_only_names_get_distinct_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("src/_content/presenters");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(".gitkeep"), b"").unwrap();
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/png");
        let pipeline = Pipeline::new(&config, Some(tmp.path().to_path_buf()), &fetcher).unwrap();
        let rows = vec![
            presenter_row(json!({"Name": "???"})),
            presenter_row(json!({"Name": "!!!"})),
        ];

        let report = pipeline.run_presenters(&rows, &mut Vec::new());
        assert!(report.is_clean());
        assert_eq!(
            report.written,
            [dir.join("anonymous-speaker-0.md"), dir.join("anonymous-speaker-1.md")]
        );
        let text = fs::read_to_string(dir.join("anonymous-speaker-0.md")).unwrap();
        assert!(text.contains("permalink: /presenters/anonymous-speaker-0/
"));
        assert!(text.contains("photo: null
"));
    }

    #[test]
    fn unsupported_photo_type_fails_only_that_presenter() {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/svg+xml");
        let pipeline = Pipeline::new(&config, Some(tmp.path().to_path_buf()), &fetcher).unwrap();
        let rows = vec![
            presenter_row(json!({"Name": "Jane Doe", "Picture": "https://cdn.example.com/a"})),
            presenter_row(json!({"Name": "Joe Bloggs"})),
        ];

        let report = pipeline.run_presenters(&rows, &mut Vec::new());
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error.kind(), "resource");
    }

    // =========================================================================
    // Schedule
    // =========================================================================

    #[test]
    fn unaccepted_sessions_are_skipped_even_when_malformed() {
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/png");
        let rows = vec![
            session_row(json!({"Proposal state": "rejected", "Session type": 12})),
            session_row(json!({"Proposal state": "submitted"})),
            session_row(json!({"Proposal state": "confirmed"})),
        ];

        let report = emit_pipeline(&config, &fetcher).run_schedule(&rows, &mut Vec::new());
        assert_eq!(report.skipped, 2);
        assert_eq!(report.emitted, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn sessions_are_written_under_category() {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/png");
        let pipeline = Pipeline::new(&config, Some(tmp.path().to_path_buf()), &fetcher).unwrap();
        let rows = vec![session_row(json!({
            "Proposal title": "Intro to <Rust>",
            "Session type": {"en": "Tutorials"},
            "Room": {"en": "Tutorial Track B"},
            "Start": "2024-05-01T09:00:00",
            "Description": "Bring a laptop."
        }))];

        let report = pipeline.run_schedule(&rows, &mut Vec::new());
        let path = tmp
            .path()
            .join("src/_content/schedule/tutorials/2024-05-01-09-00-t1-intro-to-rust.md");
        assert_eq!(report.written, [path.clone()]);

        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("title: Intro to &lt;Rust&gt;\n"));
        assert!(text.contains("permalink: /tutorials/intro-to-rust/\n"));
        assert!(text.contains("end_datetime:"));
        assert!(text.contains("2024-05-01 12:30:00-05:00"));
        assert!(text.ends_with("\nBring a laptop.\n"));
    }

    #[test]
    fn session_without_start_fails_when_writing() {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/png");
        let pipeline = Pipeline::new(&config, Some(tmp.path().to_path_buf()), &fetcher).unwrap();
        let rows = vec![session_row(json!({"Start": null}))];

        let report = pipeline.run_schedule(&rows, &mut Vec::new());
        assert!(matches!(
            report.failures[0].error,
            RecordError::Processing(ProcessingError::Unaddressable(_))
        ));
    }

    #[test]
    fn session_without_start_is_still_emitted() {
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/png");
        let rows = vec![session_row(json!({"Start": null, "End": null}))];

        let mut sink = Vec::new();
        let report = emit_pipeline(&config, &fetcher).run_schedule(&rows, &mut sink);
        assert_eq!(report.emitted, 1);
        assert!(String::from_utf8(sink).unwrap().contains("datetime: null\n"));
    }

    #[test]
    fn missing_title_is_validation_failure() {
        let config = PipelineConfig::default();
        let fetcher = ScriptedFetcher::image("image/png");
        let rows = vec![session_row(json!({"Proposal title": "   "}))];

        let report = emit_pipeline(&config, &fetcher).run_schedule(&rows, &mut Vec::new());
        assert!(matches!(
            report.failures[0].error,
            RecordError::Validation(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn invalid_timezone_is_rejected_up_front() {
        let config = PipelineConfig {
            timezone: "Mars/Olympus_Mons".into(),
            ..PipelineConfig::default()
        };
        let fetcher = ScriptedFetcher::image("image/png");
        assert!(Pipeline::new(&config, None, &fetcher).is_err());
    }
}
