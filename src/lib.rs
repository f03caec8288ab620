//! # Conference Content
//!
//! Turns the exports of a conference-management system into front-matter
//! documents for a static site. Presenter rows become presenter pages;
//! accepted session rows become schedule entries.
//!
//! # Architecture: One Row, Five Steps
//!
//! Every row of an export goes through the same steps, independently of the
//! rows around it:
//!
//! ```text
//! 1. Validate   raw row      →  checked row       (schema: types, required keys)
//! 2. Derive     checked row  →  typed document    (slugs, permalinks, tracks, times)
//! 3. Photo      presenter    →  final photo       (local file, download, or URL)
//! 4. Assemble   free text    →  merged document   (bio/description front matter + derived fields)
//! 5. Route      document     →  file or stdout    (deterministic path per kind)
//! ```
//!
//! A row that fails any step is logged with its raw contents and the batch
//! moves on. Failures are classified as validation (bad input values),
//! resource (photo download problems), or processing (malformed structure,
//! unaddressable output).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Batch driver: runs every row through the steps, collects a report |
//! | [`schema`] | Document kinds, typed documents, declarative field schemas, timestamps |
//! | [`derive`] | Field derivation from export rows |
//! | [`photo`] | Presenter photo reconciliation and the HTTP fetcher |
//! | [`document`] | Front-matter parsing, merging, and rendering |
//! | [`route`] | Output paths and delivery to disk or a sink |
//! | [`check`] | Validation of existing site content |
//! | [`record`] | Export loading and typed access to raw rows |
//! | [`slug`] | URL slugs from names and titles |
//! | [`field`] | Three-state fields: unset, explicit null, value |
//! | [`config`] | `config.toml` loading, validation, and merging |
//! | [`error`] | Per-row error classification |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Derived Fields Win, Unset Fields Stay Out
//!
//! Speakers can put their own front matter at the top of a biography
//! (`pronouns`, `role`, ...). Derived fields overwrite same-named keys from
//! that block, but only fields the derivation actually assigned: a
//! [`field::Field::Unset`] never reaches the output, while
//! [`field::Field::Null`] is written as an explicit `null`.
//!
//! ## Deterministic Paths
//!
//! Output paths depend only on the row: presenters by name slug, schedule
//! entries by start time, track, and title slug. Re-running an export
//! overwrites the same files instead of accumulating new ones, and files
//! sort chronologically within each category.
//!
//! ## Local Photos Are Never Refreshed
//!
//! A photo already next to the presenter documents wins over the exported
//! URL. Organizers can drop in a cropped or replaced picture and it survives
//! every later run.

pub mod check;
pub mod config;
pub mod derive;
pub mod document;
pub mod error;
pub mod field;
pub mod output;
pub mod photo;
pub mod pipeline;
pub mod record;
pub mod route;
pub mod schema;
pub mod slug;

#[cfg(test)]
pub(crate) mod test_helpers;
