//! Record and document schemas.
//!
//! Two families of shapes pass through this module:
//!
//! - **Export surfaces** ([`Surface`]): the raw rows of a presenter export or a
//!   session export, keyed by the export's own column names.
//! - **Document kinds** ([`DocumentKind`]): the front matter of the generated
//!   site content (organizers, pages, jobs, posts, presenters, schedule).
//!
//! Both are described declaratively as a [`Schema`] of [`FieldSpec`]s and
//! checked by the same [`Schema::validate`] dispatch. Every document kind
//! shares the [`BASE_FIELDS`] contract (`permalink`, `redirect_from`,
//! `redirect_to`, `sitemap`, `title`); a kind's own spec with the same name
//! replaces the base one.
//!
//! ## Presence rules
//!
//! | [`Presence`] | key absent | `null` |
//! |--------------|------------|--------|
//! | `Optional` | fallback applied | allowed |
//! | `Keyed` | [`ProcessingError::MissingKey`] | allowed |
//! | `Required` | [`ValidationError::MissingField`] | [`ValidationError::MissingField`] |
//!
//! Fallbacks are per kind and deliberately differ: a schedule entry without
//! `tags` gets `null`, a post without `tags` gets `[]`.
//!
//! The typed documents produced by derivation ([`PresenterDocument`],
//! [`ScheduleDocument`]) live here too. Their optional fields are
//! [`Field`]s, so only fields assigned during derivation are serialized.

use crate::error::{ProcessingError, RecordError, ValidationError};
use crate::field::Field;
use crate::slug::slugify;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Export column names.
pub mod columns {
    pub const NAME: &str = "Name";
    pub const BIOGRAPHY: &str = "Biography";
    pub const PICTURE: &str = "Picture";
    pub const ORGANIZATION: &str = "Organization or Affiliation";
    pub const URL: &str = "URL";
    pub const GITHUB: &str = "github";
    pub const MASTODON: &str = "What is your mastodon/fediverse handle?";
    pub const TWITTER: &str = "Twitter handle";
    pub const INSTAGRAM: &str = "instagram";
    pub const BLUESKY: &str = "bluesky";

    pub const PROPOSAL_STATE: &str = "Proposal state";
    pub const PROPOSAL_TITLE: &str = "Proposal title";
    pub const SESSION_TYPE: &str = "Session type";
    pub const TAGS: &str = "Tags";
    pub const DESCRIPTION: &str = "Description";
    pub const SPEAKER_NAMES: &str = "Speaker names";
    pub const ROOM: &str = "Room";
    pub const START: &str = "Start";
    pub const END: &str = "End";
}

// =============================================================================
// Category
// =============================================================================

/// Closed classification of a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Break,
    Lunch,
    Rooms,
    SocialEvent,
    Sprints,
    Talks,
    Tutorials,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Break,
        Category::Lunch,
        Category::Rooms,
        Category::SocialEvent,
        Category::Sprints,
        Category::Talks,
        Category::Tutorials,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Break => "break",
            Category::Lunch => "lunch",
            Category::Rooms => "rooms",
            Category::SocialEvent => "social-event",
            Category::Sprints => "sprints",
            Category::Talks => "talks",
            Category::Tutorials => "tutorials",
        }
    }
}

const CATEGORY_NAMES: &[&str] = &[
    "break",
    "lunch",
    "rooms",
    "social-event",
    "sprints",
    "talks",
    "tutorials",
];

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "category".into(),
                value: s.to_string(),
                allowed: CATEGORY_NAMES.join(", "),
            })
    }
}

// =============================================================================
// Timestamps
// =============================================================================

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601-style timestamp and convert it into `tz`.
///
/// Timestamps carrying an offset are converted; naive timestamps (and bare
/// dates, at midnight) are read as wall-clock time in `tz`. Returns `None`
/// for anything unparseable or for a wall-clock time skipped by a DST jump.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&tz));
        }
    }
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    tz.from_local_datetime(&naive).earliest()
}

/// A conference-zone timestamp, serialized as `YYYY-MM-DD HH:MM:SS±HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(pub DateTime<Tz>);

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.format("%Y-%m-%d %H:%M:%S%:z"))
    }
}

// =============================================================================
// Typed documents
// =============================================================================

/// Front-matter fields every document kind accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frontmatter {
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub permalink: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub redirect_from: Field<Vec<String>>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub redirect_to: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub sitemap: Field<bool>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub title: Field<String>,
}

/// Social handles and profile URLs. Fields are kept in key order so the
/// nested mapping serializes sorted like the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Social {
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub bluesky: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub github: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub instagram: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub mastodon: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub twitter: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub website: Field<String>,
}

/// A presenter page's front matter.
///
/// There is no `slug` key: the slug is always `slug(name)` (see
/// [`PresenterDocument::slug`]) and is never written out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenterDocument {
    #[serde(flatten)]
    pub base: Frontmatter,
    pub name: String,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub company: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub hidden: Field<bool>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub override_schedule_title: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub pronouns: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub photo: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub role: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub social: Field<Social>,
}

impl PresenterDocument {
    /// A presenter with only a name. The permalink is assigned from the slug
    /// unless the caller replaces it.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".into()));
        }
        if slugify(&name).is_empty() {
            return Err(ValidationError::Unsluggable {
                field: "name".into(),
                value: name,
            });
        }
        let permalink = presenter_permalink(&name);
        Ok(Self {
            base: Frontmatter {
                permalink: Field::Value(permalink),
                ..Frontmatter::default()
            },
            name,
            company: Field::Unset,
            hidden: Field::Unset,
            override_schedule_title: Field::Unset,
            pronouns: Field::Unset,
            photo: Field::Unset,
            role: Field::Unset,
            social: Field::Unset,
        })
    }

    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// `/presenters/{slug}/` — the permalink a presenter gets when none is given.
pub fn presenter_permalink(name: &str) -> String {
    format!("/presenters/{}/", slugify(name))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleDocument {
    #[serde(flatten)]
    pub base: Frontmatter,
    pub category: Category,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub difficulty: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub end_datetime: Field<Timestamp>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub image: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub presenter_slugs: Field<Vec<String>>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub room: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub show_video_urls: Field<bool>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub slides_url: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub datetime: Field<Timestamp>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub tags: Field<Vec<String>>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub track: Field<String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub video_url: Field<String>,
}

impl ScheduleDocument {
    pub fn new(category: Category) -> Self {
        Self {
            base: Frontmatter::default(),
            category,
            difficulty: Field::Unset,
            end_datetime: Field::Unset,
            image: Field::Unset,
            presenter_slugs: Field::Unset,
            room: Field::Unset,
            show_video_urls: Field::Unset,
            slides_url: Field::Unset,
            datetime: Field::Unset,
            tags: Field::Unset,
            track: Field::Unset,
            video_url: Field::Unset,
        }
    }

    pub fn start(&self) -> Option<DateTime<Tz>> {
        self.datetime.value().map(|t| t.0)
    }

    pub fn end(&self) -> Option<DateTime<Tz>> {
        self.end_datetime.value().map(|t| t.0)
    }
}

// =============================================================================
// Declarative schemas
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    /// A string, or a translation mapping with an `en` entry.
    Localized,
    Flag,
    TextList,
    Timestamp,
    /// A mapping of social handles.
    Social,
    OneOf(&'static [&'static str]),
}

impl FieldType {
    fn expected(self) -> &'static str {
        match self {
            FieldType::Text | FieldType::OneOf(_) => "a string",
            FieldType::Localized => "a string or a translation mapping",
            FieldType::Flag => "a boolean",
            FieldType::TextList => "a list of strings",
            FieldType::Timestamp => "a timestamp string",
            FieldType::Social => "a mapping of handles",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Optional,
    Keyed,
    Required,
}

/// Value filled in for an absent optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Absent,
    Null,
    Text(&'static str),
    Flag(bool),
    EmptyList,
}

impl Fallback {
    fn to_value(self) -> Option<Value> {
        match self {
            Fallback::Absent => None,
            Fallback::Null => Some(Value::Null),
            Fallback::Text(s) => Some(Value::String(s.to_string())),
            Fallback::Flag(b) => Some(Value::Bool(b)),
            Fallback::EmptyList => Some(Value::Array(Vec::new())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub presence: Presence,
    pub fallback: Fallback,
}

const fn optional(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        presence: Presence::Optional,
        fallback: Fallback::Absent,
    }
}

const fn defaulted(name: &'static str, ty: FieldType, fallback: Fallback) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        presence: Presence::Optional,
        fallback,
    }
}

const fn keyed(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        presence: Presence::Keyed,
        fallback: Fallback::Absent,
    }
}

const fn required(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        presence: Presence::Required,
        fallback: Fallback::Absent,
    }
}

use FieldType::{Flag, Localized, Text, TextList};

pub const BASE_FIELDS: &[FieldSpec] = &[
    optional("permalink", Text),
    optional("redirect_from", TextList),
    optional("redirect_to", Text),
    optional("sitemap", Flag),
    optional("title", Text),
];

const ORGANIZER_FIELDS: &[FieldSpec] = &[
    defaulted("hidden", Flag, Fallback::Flag(false)),
    required("name", Text),
    optional("photo", Text),
    optional("slug", Text),
    optional("social", FieldType::Social),
];

const PAGE_FIELDS: &[FieldSpec] = &[
    optional("description", Text),
    optional("heading", Text),
    optional("hero_text_align", Text),
    optional("hero_theme", Text),
    optional("testimonial_img", Text),
    optional("testimonial_img_mobile", Text),
];

const JOB_FIELDS: &[FieldSpec] = &[
    required("company", Text),
    defaulted("hidden", Flag, Fallback::Flag(false)),
    optional("location", Text),
    optional("url", Text),
];

const POST_FIELDS: &[FieldSpec] = &[
    optional("author", Text),
    defaulted("category", Text, Fallback::Text("General")),
    optional("categories", TextList),
    required("date", FieldType::Timestamp),
    optional("image", Text),
    optional("slug", Text),
    defaulted("tags", TextList, Fallback::EmptyList),
];

const PRESENTER_FIELDS: &[FieldSpec] = &[
    optional("company", Text),
    defaulted("hidden", Flag, Fallback::Flag(false)),
    required("name", Text),
    optional("override_schedule_title", Text),
    optional("pronouns", Text),
    optional("photo", Text),
    optional("role", Text),
    optional("social", FieldType::Social),
];

const SCHEDULE_FIELDS: &[FieldSpec] = &[
    required("category", FieldType::OneOf(CATEGORY_NAMES)),
    defaulted("difficulty", Text, Fallback::Text("All")),
    optional("end_datetime", FieldType::Timestamp),
    defaulted("sitemap", Flag, Fallback::Flag(true)),
    optional("image", Text),
    optional("presenter_slugs", TextList),
    optional("room", Text),
    optional("show_video_urls", Flag),
    optional("slides_url", Text),
    keyed("datetime", FieldType::Timestamp),
    defaulted("tags", TextList, Fallback::Null),
    optional("track", Text),
    optional("video_url", Text),
];

const PRESENTER_EXPORT: &[FieldSpec] = &[
    optional(columns::NAME, Text),
    optional(columns::BIOGRAPHY, Text),
    optional(columns::PICTURE, Text),
    optional(columns::ORGANIZATION, Text),
    optional(columns::URL, Text),
    optional(columns::GITHUB, Text),
    optional(columns::MASTODON, Text),
    optional(columns::TWITTER, Text),
    optional(columns::INSTAGRAM, Text),
    optional(columns::BLUESKY, Text),
];

const SESSION_EXPORT: &[FieldSpec] = &[
    keyed(columns::PROPOSAL_STATE, Text),
    required(columns::PROPOSAL_TITLE, Text),
    required(columns::SESSION_TYPE, Localized),
    keyed(columns::TAGS, TextList),
    optional(columns::DESCRIPTION, Text),
    keyed(columns::SPEAKER_NAMES, TextList),
    keyed(columns::ROOM, Localized),
    optional(columns::START, FieldType::Timestamp),
    optional(columns::END, FieldType::Timestamp),
];

/// A set of field specs, optionally layered over a shared base.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    base: &'static [FieldSpec],
    fields: &'static [FieldSpec],
}

impl Schema {
    /// Effective specs: the schema's own fields, then base fields it does not shadow.
    pub fn specs(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        let fields = self.fields;
        self.fields.iter().chain(
            self.base
                .iter()
                .filter(move |b| !fields.iter().any(|f| f.name == b.name)),
        )
    }

    pub fn spec(&self, name: &str) -> Option<&'static FieldSpec> {
        self.specs().find(|s| s.name == name)
    }

    /// Check a mapping against the schema.
    ///
    /// Returns a copy with fallbacks filled in for absent optional fields.
    /// Keys the schema does not mention are passed through untouched.
    pub fn validate(&self, record: &Map<String, Value>) -> Result<Map<String, Value>, RecordError> {
        let mut validated = record.clone();
        for spec in self.specs() {
            match record.get(spec.name) {
                None => match spec.presence {
                    Presence::Optional => {
                        if let Some(value) = spec.fallback.to_value() {
                            validated.insert(spec.name.to_string(), value);
                        }
                    }
                    Presence::Keyed => {
                        return Err(ProcessingError::MissingKey(spec.name.to_string()).into());
                    }
                    Presence::Required => {
                        return Err(ValidationError::MissingField(spec.name.to_string()).into());
                    }
                },
                Some(Value::Null) => {
                    if spec.presence == Presence::Required {
                        return Err(ValidationError::MissingField(spec.name.to_string()).into());
                    }
                }
                Some(value) => {
                    check_type(spec, value)?;
                    if spec.presence == Presence::Required && is_blank(value) {
                        return Err(ValidationError::MissingField(spec.name.to_string()).into());
                    }
                }
            }
        }
        Ok(validated)
    }
}

fn is_blank(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.trim().is_empty())
}

fn check_type(spec: &FieldSpec, value: &Value) -> Result<(), RecordError> {
    let wrong = || ValidationError::wrong_type(spec.name, spec.ty.expected());
    match spec.ty {
        FieldType::Text => {
            value.as_str().ok_or_else(wrong)?;
        }
        FieldType::Flag => {
            value.as_bool().ok_or_else(wrong)?;
        }
        FieldType::TextList => {
            let items = value.as_array().ok_or_else(wrong)?;
            if !items.iter().all(Value::is_string) {
                return Err(wrong().into());
            }
        }
        FieldType::Timestamp => {
            let raw = value.as_str().ok_or_else(wrong)?;
            if parse_timestamp(raw, Tz::UTC).is_none() {
                return Err(ValidationError::InvalidTimestamp {
                    field: spec.name.to_string(),
                    value: raw.to_string(),
                }
                .into());
            }
        }
        FieldType::OneOf(allowed) => {
            let raw = value.as_str().ok_or_else(wrong)?;
            if !allowed.contains(&raw) {
                return Err(ValidationError::NotAllowed {
                    field: spec.name.to_string(),
                    value: raw.to_string(),
                    allowed: allowed.join(", "),
                }
                .into());
            }
        }
        FieldType::Localized => match value {
            Value::String(_) => {}
            Value::Object(map) => match map.get("en") {
                Some(Value::String(_)) => {}
                Some(_) => return Err(wrong().into()),
                None => {
                    return Err(ProcessingError::shape(spec.name, "translation mapping has no `en` entry").into());
                }
            },
            _ => return Err(ProcessingError::shape(spec.name, "expected a string or a mapping").into()),
        },
        FieldType::Social => {
            let map = value
                .as_object()
                .ok_or_else(|| ProcessingError::shape(spec.name, "expected a mapping"))?;
            for (key, handle) in map {
                if !(handle.is_null() || handle.is_string()) {
                    return Err(ValidationError::wrong_type(format!("{}.{key}", spec.name), "a string").into());
                }
            }
        }
    }
    Ok(())
}

/// The two export surfaces the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Presenters,
    Sessions,
}

impl Surface {
    pub fn schema(self) -> Schema {
        let fields = match self {
            Surface::Presenters => PRESENTER_EXPORT,
            Surface::Sessions => SESSION_EXPORT,
        };
        Schema { base: &[], fields }
    }
}

/// Kinds of generated site content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Organizer,
    Page,
    Job,
    Post,
    Presenter,
    Schedule,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::Organizer,
        DocumentKind::Page,
        DocumentKind::Job,
        DocumentKind::Post,
        DocumentKind::Presenter,
        DocumentKind::Schedule,
    ];

    /// Default directory of this kind under the content root.
    pub fn directory(self) -> &'static str {
        match self {
            DocumentKind::Organizer => "_organizers",
            DocumentKind::Page => "_pages",
            DocumentKind::Job => "_jobs",
            DocumentKind::Post => "_posts",
            DocumentKind::Presenter => "presenters",
            DocumentKind::Schedule => "schedule",
        }
    }

    pub fn schema(self) -> Schema {
        let fields = match self {
            DocumentKind::Organizer => ORGANIZER_FIELDS,
            DocumentKind::Page => PAGE_FIELDS,
            DocumentKind::Job => JOB_FIELDS,
            DocumentKind::Post => POST_FIELDS,
            DocumentKind::Presenter => PRESENTER_FIELDS,
            DocumentKind::Schedule => SCHEDULE_FIELDS,
        };
        Schema {
            base: BASE_FIELDS,
            fields,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Organizer => "organizer",
            DocumentKind::Page => "page",
            DocumentKind::Job => "job",
            DocumentKind::Post => "post",
            DocumentKind::Presenter => "presenter",
            DocumentKind::Schedule => "schedule",
        };
        f.write_str(name)
    }
}
