//! Field derivation: raw export rows → typed documents.
//!
//! ## Presenters
//!
//! | Field | Derived from |
//! |-------|--------------|
//! | `name` | `Name`, or `Anonymous speaker {n}` when it slugs to nothing |
//! | `permalink` | `/presenters/{slug(name)}/` |
//! | `company` | `Organization or Affiliation` (absent column → `""`) |
//! | `hidden` | always `false` |
//! | `photo` | `Picture`, reconciled later by [`crate::photo`] |
//! | `social` | six handle columns, with mastodon/twitter normalization |
//!
//! ## Schedule entries
//!
//! | Field | Derived from |
//! |-------|--------------|
//! | `category` | `Session type` through the session-type table (unknown → error) |
//! | `title` | `Proposal title`, with `<` and `>` escaped |
//! | `permalink` | `/{category}/{slug(title)}/` |
//! | `track` | `Room` through the track table (unknown → default track) |
//! | `datetime`, `end_datetime` | `Start`, `End` in the conference zone |
//! | `presenter_slugs` | slugs of `Speaker names` |
//!
//! Tutorials with a start time always end `tutorial_length_minutes` later,
//! whatever the export says.

use crate::config::ScheduleConfig;
use crate::error::{RecordError, ValidationError};
use crate::field::Field;
use crate::record::RawRecord;
use crate::schema::{
    Category, PresenterDocument, ScheduleDocument, Social, Timestamp, columns, parse_timestamp,
};
use crate::slug::slugify;
use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use tracing::warn;

/// Run-scoped source of `Anonymous speaker {n}` names.
///
/// Numbering starts at 0 and only moves forward, so anonymous presenters in
/// one run never share a slug.
#[derive(Debug, Default)]
pub struct AnonymousSpeakers {
    next: u32,
}

impl AnonymousSpeakers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_name(&mut self) -> String {
        let n = self.next;
        self.next += 1;
        format!("Anonymous speaker {n}")
    }

    /// How many names have been handed out so far.
    pub fn issued(&self) -> u32 {
        self.next
    }
}

// =============================================================================
// Social handles
// =============================================================================

/// Turn `@user@domain` into `https://domain/@user`.
///
/// Values without a leading `@` are returned unchanged. A handle that does
/// not split into exactly one user and one domain is rejected with `None`.
pub fn migrate_mastodon_handle(handle: &str) -> Option<String> {
    let Some(rest) = handle.strip_prefix('@') else {
        return Some(handle.to_string());
    };
    let mut parts = rest.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(user), Some(domain), None) => Some(format!("https://{domain}/@{user}")),
        _ => None,
    }
}

pub fn strip_twitter_prefix(handle: &str) -> &str {
    handle.strip_prefix('@').unwrap_or(handle)
}

fn derive_social(record: &RawRecord<'_>) -> Result<Social, ValidationError> {
    let handle = |column: &str| -> Result<Field<String>, ValidationError> {
        Ok(record.optional_str(column)?.map(str::to_string).into())
    };

    let mastodon = match record.optional_str(columns::MASTODON)? {
        Some(raw) => {
            let migrated = migrate_mastodon_handle(raw);
            if migrated.is_none() {
                warn!(handle = raw, "invalid mastodon handle, dropping it");
            }
            migrated.into()
        }
        None => Field::Null,
    };
    let twitter = record
        .optional_str(columns::TWITTER)?
        .map(|t| strip_twitter_prefix(t).to_string())
        .into();

    Ok(Social {
        bluesky: handle(columns::BLUESKY)?,
        github: handle(columns::GITHUB)?,
        instagram: handle(columns::INSTAGRAM)?,
        mastodon,
        twitter,
        website: handle(columns::URL)?,
    })
}

// =============================================================================
// Presenters
// =============================================================================

/// Derive a presenter document from a presenter-export row.
///
/// `photo` carries the raw `Picture` value; reconciliation against local
/// assets and remote URLs happens afterwards.
pub fn derive_presenter(
    record: &RawRecord<'_>,
    anonymous: &mut AnonymousSpeakers,
) -> Result<PresenterDocument, RecordError> {
    let name = match record.optional_str(columns::NAME)? {
        Some(name) if !slugify(name).is_empty() => name.to_string(),
        _ => anonymous.next_name(),
    };

    let mut doc = PresenterDocument::new(name)?;
    doc.company = if record.contains(columns::ORGANIZATION) {
        record
            .optional_str(columns::ORGANIZATION)?
            .map(str::to_string)
            .into()
    } else {
        Field::Value(String::new())
    };
    doc.hidden = Field::Value(false);
    doc.photo = record
        .optional_str(columns::PICTURE)?
        .map(str::to_string)
        .into();
    doc.social = Field::Value(derive_social(record)?);
    Ok(doc)
}

// =============================================================================
// Schedule entries
// =============================================================================

/// Whether a session row is in one of the accepted proposal states.
///
/// The state column must exist; a `null` state is simply not accepted.
pub fn is_accepted(record: &RawRecord<'_>, schedule: &ScheduleConfig) -> Result<bool, RecordError> {
    if !record.contains(columns::PROPOSAL_STATE) {
        return Err(crate::error::ProcessingError::MissingKey(columns::PROPOSAL_STATE.into()).into());
    }
    Ok(record
        .optional_str(columns::PROPOSAL_STATE)?
        .is_some_and(|state| schedule.accepted_states.iter().any(|s| s == state)))
}

pub fn lookup_category(schedule: &ScheduleConfig, label: &str) -> Result<Category, ValidationError> {
    schedule
        .session_types
        .get(label)
        .copied()
        .ok_or_else(|| ValidationError::UnknownSessionType(label.to_string()))
}

/// Track code for a room; rooms missing from the table share the default track.
pub fn lookup_track(schedule: &ScheduleConfig, room: Option<&str>) -> String {
    room.and_then(|r| schedule.tracks.get(r))
        .unwrap_or(&schedule.default_track)
        .clone()
}

/// Escape a title for embedding in generated HTML.
pub fn escape_title(title: &str) -> String {
    title.replace('<', "&lt;").replace('>', "&gt;")
}

fn parse_time(
    record: &RawRecord<'_>,
    column: &str,
    tz: Tz,
) -> Result<Option<DateTime<Tz>>, ValidationError> {
    record
        .optional_str(column)?
        .map(|raw| {
            parse_timestamp(raw, tz).ok_or_else(|| ValidationError::InvalidTimestamp {
                field: column.to_string(),
                value: raw.to_string(),
            })
        })
        .transpose()
}

/// A derived schedule entry plus the slug of its unescaped title.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSession {
    pub document: ScheduleDocument,
    pub slug: String,
}

/// Derive a schedule document from an accepted session-export row.
pub fn derive_schedule(
    record: &RawRecord<'_>,
    schedule: &ScheduleConfig,
    tz: Tz,
) -> Result<DerivedSession, RecordError> {
    let title = record.require_str(columns::PROPOSAL_TITLE)?;
    let label = record
        .localized(columns::SESSION_TYPE)?
        .ok_or_else(|| ValidationError::MissingField(columns::SESSION_TYPE.into()))?;
    let category = lookup_category(schedule, label)?;
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(ValidationError::Unsluggable {
            field: columns::PROPOSAL_TITLE.into(),
            value: title.to_string(),
        }
        .into());
    }
    let room = record.localized(columns::ROOM)?;

    let start = parse_time(record, columns::START, tz)?;
    let mut end = parse_time(record, columns::END, tz)?;
    // Elapsed minutes, not wall-clock: a tutorial spanning a DST change
    // ends an hour off its printed slot.
    if category == Category::Tutorials
        && let Some(start) = start
    {
        let length = TimeDelta::minutes(i64::from(schedule.tutorial_length_minutes));
        end = Some(start + length);
    }

    let mut doc = ScheduleDocument::new(category);
    doc.base.permalink = Field::Value(format!("/{category}/{slug}/"));
    doc.base.title = Field::Value(escape_title(title));
    doc.tags = record.string_list(columns::TAGS)?.into();
    doc.presenter_slugs = record
        .string_list(columns::SPEAKER_NAMES)?
        .map(|names| names.iter().map(|n| slugify(n)).collect())
        .into();
    doc.room = room.map(str::to_string).into();
    doc.track = Field::Value(lookup_track(schedule, room));
    doc.datetime = start.map(Timestamp).into();
    doc.end_datetime = end.map(Timestamp).into();

    Ok(DerivedSession {
        document: doc,
        slug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use crate::test_helpers::{presenter_row, session_row};
    use serde_json::json;

    fn chicago() -> Tz {
        chrono_tz::America::Chicago
    }

    fn local(dt: Option<DateTime<Tz>>) -> String {
        dt.map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_default()
    }

    // =========================================================================
    // Social handles
    // =========================================================================

    #[test]
    fn mastodon_handle_becomes_profile_url() {
        assert_eq!(
            migrate_mastodon_handle("@jane@fosstodon.org").as_deref(),
            Some("https://fosstodon.org/@jane")
        );
    }

    #[test]
    fn mastodon_url_is_left_alone() {
        assert_eq!(
            migrate_mastodon_handle("https://hachyderm.io/@joe").as_deref(),
            Some("https://hachyderm.io/@joe")
        );
    }

    #[test]
    fn malformed_mastodon_handles_are_rejected() {
        assert_eq!(migrate_mastodon_handle("@jane@fosstodon.org@extra"), None);
        assert_eq!(migrate_mastodon_handle("@jane"), None);
    }

    #[test]
    fn twitter_prefix_is_stripped() {
        assert_eq!(strip_twitter_prefix("@jane"), "jane");
        assert_eq!(strip_twitter_prefix("jane"), "jane");
    }

    // =========================================================================
    // Presenters
    // =========================================================================

    #[test]
    fn presenter_permalink_and_social_are_derived() {
        let row = presenter_row(json!({
            "Name": "Jane Doe",
            "Organization or Affiliation": "Acme",
            "What is your mastodon/fediverse handle?": "@jane@fosstodon.org",
            "Twitter handle": "@janedoe",
            "URL": "https://jane.dev"
        }));
        let record = RawRecord::new(&row).unwrap();
        let doc = derive_presenter(&record, &mut AnonymousSpeakers::new()).unwrap();

        assert_eq!(doc.name, "Jane Doe");
        assert_eq!(doc.base.permalink, Field::Value("/presenters/jane-doe/".into()));
        assert_eq!(doc.company, Field::Value("Acme".into()));
        assert_eq!(doc.hidden, Field::Value(false));
        let social = doc.social.value().unwrap();
        assert_eq!(social.mastodon, Field::Value("https://fosstodon.org/@jane".into()));
        assert_eq!(social.twitter, Field::Value("janedoe".into()));
        assert_eq!(social.website, Field::Value("https://jane.dev".into()));
        assert_eq!(social.github, Field::Null);
    }

    #[test]
    fn rejected_mastodon_handle_is_null() {
        let row = presenter_row(json!({
            "Name": "Jane Doe",
            "What is your mastodon/fediverse handle?": "@a@b@c"
        }));
        let record = RawRecord::new(&row).unwrap();
        let doc = derive_presenter(&record, &mut AnonymousSpeakers::new()).unwrap();
        assert_eq!(doc.social.value().unwrap().mastodon, Field::Null);
    }

    #[test]
    fn anonymous_presenters_are_numbered_in_run_order() {
        let mut anonymous = AnonymousSpeakers::new();
        let names: Vec<String> = [json!({}), json!({"Name": ""}), json!({"Name": "Real"}), json!({"Name": null})]
            .iter()
            .map(|row| {
                let record = RawRecord::new(row).unwrap();
                derive_presenter(&record, &mut anonymous).unwrap().name
            })
            .collect();

        assert_eq!(
            names,
            ["Anonymous speaker 0", "Anonymous speaker 1", "Real", "Anonymous speaker 2"]
        );
        assert_eq!(anonymous.issued(), 3);
    }

    #[test]
    fn names_without_slug_characters_are_anonymous() {
        let mut anonymous = AnonymousSpeakers::new();
        let docs: Vec<PresenterDocument> = ["???", "!!!", "Zoë"]
            .into_iter()
            .map(|name| {
                let row = presenter_row(json!({"Name": name}));
                let record = RawRecord::new(&row).unwrap();
                derive_presenter(&record, &mut anonymous).unwrap()
            })
            .collect();

        let slugs: Vec<String> = docs.iter().map(PresenterDocument::slug).collect();
        assert_eq!(slugs, ["anonymous-speaker-0", "anonymous-speaker-1", "zoe"]);
        assert_eq!(docs[0].name, "Anonymous speaker 0");
    }

    #[test]
    fn missing_organization_column_means_empty_company() {
        let row = json!({"Name": "Jane"});
        let record = RawRecord::new(&row).unwrap();
        let doc = derive_presenter(&record, &mut AnonymousSpeakers::new()).unwrap();
        assert_eq!(doc.company, Field::Value(String::new()));

        let row = json!({"Name": "Jane", "Organization or Affiliation": null});
        let record = RawRecord::new(&row).unwrap();
        let doc = derive_presenter(&record, &mut AnonymousSpeakers::new()).unwrap();
        assert_eq!(doc.company, Field::Null);
    }

    #[test]
    fn non_string_name_is_validation_error() {
        let row = json!({"Name": 42});
        let record = RawRecord::new(&row).unwrap();
        let result = derive_presenter(&record, &mut AnonymousSpeakers::new());
        assert!(matches!(result, Err(RecordError::Validation(_))));
    }

    // =========================================================================
    // Schedule entries
    // =========================================================================

    #[test]
    fn accepted_and_confirmed_pass_the_filter() {
        let schedule = ScheduleConfig::default();
        for (state, expected) in [
            ("accepted", true),
            ("confirmed", true),
            ("submitted", false),
            ("rejected", false),
        ] {
            let row = session_row(json!({"Proposal state": state}));
            let record = RawRecord::new(&row).unwrap();
            assert_eq!(is_accepted(&record, &schedule).unwrap(), expected, "{state}");
        }
    }

    #[test]
    fn missing_state_column_is_processing_error() {
        let row = json!({"Proposal title": "Untracked"});
        let record = RawRecord::new(&row).unwrap();
        assert!(matches!(
            is_accepted(&record, &ScheduleConfig::default()),
            Err(RecordError::Processing(ProcessingError::MissingKey(_)))
        ));
    }

    #[test]
    fn talk_fields_are_derived() {
        let row = session_row(json!({
            "Proposal title": "Fearless <Concurrency>",
            "Session type": {"en": "45-minute talks"},
            "Speaker names": ["Jane Doe", "José García"],
            "Tags": ["rust"],
            "Room": {"en": "Room B"},
            "Start": "2024-05-02T15:30:00+00:00",
            "End": "2024-05-02T16:15:00+00:00"
        }));
        let record = RawRecord::new(&row).unwrap();
        let derived = derive_schedule(&record, &ScheduleConfig::default(), chicago()).unwrap();
        let doc = &derived.document;

        assert_eq!(doc.category, Category::Talks);
        assert_eq!(doc.base.title, Field::Value("Fearless &lt;Concurrency&gt;".into()));
        assert_eq!(doc.base.permalink, Field::Value("/talks/fearless-concurrency/".into()));
        assert_eq!(derived.slug, "fearless-concurrency");
        assert_eq!(doc.track, Field::Value("t1".into()));
        assert_eq!(doc.room, Field::Value("Room B".into()));
        assert_eq!(
            doc.presenter_slugs,
            Field::Value(vec!["jane-doe".into(), "jose-garcia".into()])
        );
        assert_eq!(local(doc.start()), "2024-05-02T10:30:00");
        assert_eq!(local(doc.end()), "2024-05-02T11:15:00");
    }

    #[test]
    fn tutorial_end_is_overridden() {
        let row = session_row(json!({
            "Session type": {"en": "Tutorials"},
            "Room": {"en": "Tutorial Track C"},
            "Start": "2024-05-01T09:00:00",
            "End": "2024-05-01T12:00:00"
        }));
        let record = RawRecord::new(&row).unwrap();
        let derived = derive_schedule(&record, &ScheduleConfig::default(), chicago()).unwrap();

        assert_eq!(derived.document.category, Category::Tutorials);
        assert_eq!(local(derived.document.start()), "2024-05-01T09:00:00");
        assert_eq!(local(derived.document.end()), "2024-05-01T12:30:00");
        assert_eq!(derived.document.track, Field::Value("t2".into()));
    }

    #[test]
    fn tutorial_without_start_keeps_raw_end() {
        let row = session_row(json!({
            "Session type": "Tutorials",
            "Start": null,
            "End": "2024-05-01T12:00:00"
        }));
        let record = RawRecord::new(&row).unwrap();
        let derived = derive_schedule(&record, &ScheduleConfig::default(), chicago()).unwrap();
        assert_eq!(derived.document.datetime, Field::Null);
        assert_eq!(local(derived.document.end()), "2024-05-01T12:00:00");
    }

    #[test]
    fn talks_keep_their_submitted_end() {
        let row = session_row(json!({
            "Start": "2024-05-01T09:00:00",
            "End": "2024-05-01T09:25:00"
        }));
        let record = RawRecord::new(&row).unwrap();
        let derived = derive_schedule(&record, &ScheduleConfig::default(), chicago()).unwrap();
        assert_eq!(local(derived.document.end()), "2024-05-01T09:25:00");
    }

    #[test]
    fn unmapped_room_falls_back_to_default_track() {
        let schedule = ScheduleConfig::default();
        assert_eq!(lookup_track(&schedule, Some("Broom Closet")), "t0");
        assert_eq!(lookup_track(&schedule, None), "t0");
        assert_eq!(lookup_track(&schedule, Some("Online talks")), "t2");
    }

    #[test]
    fn unknown_session_type_is_validation_error() {
        let row = session_row(json!({"Session type": {"en": "Lightning talks"}}));
        let record = RawRecord::new(&row).unwrap();
        let result = derive_schedule(&record, &ScheduleConfig::default(), chicago());
        assert!(matches!(
            result,
            Err(RecordError::Validation(ValidationError::UnknownSessionType(label))) if label == "Lightning talks"
        ));
    }

    #[test]
    fn title_without_slug_characters_is_validation_error() {
        let row = session_row(json!({"Proposal title": "???"}));
        let record = RawRecord::new(&row).unwrap();
        let result = derive_schedule(&record, &ScheduleConfig::default(), chicago());
        assert!(matches!(
            result,
            Err(RecordError::Validation(ValidationError::Unsluggable { field, .. })) if field == "Proposal title"
        ));
    }

    #[test]
    fn tutorial_length_is_elapsed_time_across_dst() {
        // 2024-03-10: Chicago springs forward at 02:00.
        let row = session_row(json!({
            "Session type": "Tutorials",
            "Start": "2024-03-10T01:00:00",
            "End": "2024-03-10T04:30:00"
        }));
        let record = RawRecord::new(&row).unwrap();
        let derived = derive_schedule(&record, &ScheduleConfig::default(), chicago()).unwrap();
        assert_eq!(local(derived.document.end()), "2024-03-10T05:30:00");
    }

    #[test]
    fn unparseable_start_is_validation_error() {
        let row = session_row(json!({"Start": "May 1st, after lunch"}));
        let record = RawRecord::new(&row).unwrap();
        let result = derive_schedule(&record, &ScheduleConfig::default(), chicago());
        assert!(matches!(
            result,
            Err(RecordError::Validation(ValidationError::InvalidTimestamp { .. }))
        ));
    }

    #[test]
    fn null_tags_stay_null() {
        let row = session_row(json!({"Tags": null}));
        let record = RawRecord::new(&row).unwrap();
        let derived = derive_schedule(&record, &ScheduleConfig::default(), chicago()).unwrap();
        assert_eq!(derived.document.tags, Field::Null);
    }
}
