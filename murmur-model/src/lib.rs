//! The Murmur application data model.
//!
//! Everything the windows share sits in one mergeable store constrained by
//! [`app_schema`]: sessions and their transcripts, calendar events,
//! participants, tags, templates, and the global settings values. This
//! crate owns that schema, the [`AppStore`] bootstrap with its named
//! derived views, and the higher-level procedures built on the store's
//! transaction primitive: cascade delete, folder derivations, JSON import,
//! and the legacy table-shape migration.

mod app;
mod bootstrap;
mod cascade;
mod folders;
mod import;
mod migrate;
mod schema;

pub use app::{indexes, metrics, queries, relationships, AppStore};
pub use bootstrap::{bootstrap, WindowRole};
pub use cascade::{delete_session_cascade, AudioStore};
pub use folders::{child_folders, folder_ids, sessions_in_folder, top_level_folders};
pub use import::{import_from_json, ImportError, ImportSummary};
pub use migrate::embed_transcript_details;
pub use schema::{app_schema, tables, values};
