//! The concrete schema every window's store enforces.

use murmur_store::{Schema, TableSchema, ValueSchema};
use murmur_types::CellKind;

/// Table names, so call sites never carry string literals around.
pub mod tables {
    pub const SESSIONS: &str = "sessions";
    pub const EVENTS: &str = "events";
    pub const TRANSCRIPTS: &str = "transcripts";
    pub const ENHANCED_NOTES: &str = "enhanced_notes";
    pub const HUMANS: &str = "humans";
    pub const ORGANIZATIONS: &str = "organizations";
    pub const TEMPLATES: &str = "templates";
    pub const CALENDARS: &str = "calendars";
    pub const TAGS: &str = "tags";
    pub const SESSION_PARTICIPANTS: &str = "mapping_session_participant";
    pub const TAG_SESSIONS: &str = "mapping_tag_session";
    /// Legacy flat per-word table; emptied by the embed migration.
    pub const WORDS: &str = "words";
    /// Legacy flat speaker-hint table; emptied by the embed migration.
    pub const SPEAKER_HINTS: &str = "speaker_hints";
}

/// Global value names.
pub mod values {
    pub const USER_ID: &str = "user_id";
    pub const ONBOARDING_DONE: &str = "onboarding_done";
    pub const TELEMETRY_ENABLED: &str = "telemetry_enabled";
}

/// The full application schema: every table's columns and every global
/// value with its default.
///
/// The legacy `words` and `speaker_hints` tables stay declared so stores
/// persisted before the embed migration still load; the migration drains
/// them into the serialized collections on `transcripts`.
#[must_use]
pub fn app_schema() -> Schema {
    Schema::new()
        .table(
            tables::SESSIONS,
            TableSchema::new()
                .column("title", CellKind::Str)
                .column("folder_id", CellKind::Str)
                .column("event_id", CellKind::Str)
                .column("created_at", CellKind::Num)
                .column("duration_ms", CellKind::Num)
                .column("pinned", CellKind::Bool),
        )
        .table(
            tables::EVENTS,
            TableSchema::new()
                .column("title", CellKind::Str)
                .column("calendar_id", CellKind::Str)
                .column("starts_at", CellKind::Str)
                .column("ends_at", CellKind::Str),
        )
        .table(
            tables::TRANSCRIPTS,
            TableSchema::new()
                .column("session_id", CellKind::Str)
                .column("language", CellKind::Str)
                // Serialized JSON collections, embedded by the migration.
                .column("words", CellKind::Str)
                .column("speaker_hints", CellKind::Str),
        )
        .table(
            tables::ENHANCED_NOTES,
            TableSchema::new()
                .column("session_id", CellKind::Str)
                .column("content", CellKind::Str)
                .column("created_at", CellKind::Num),
        )
        .table(
            tables::HUMANS,
            TableSchema::new()
                .column("name", CellKind::Str)
                .column("email", CellKind::Str)
                .column("org_id", CellKind::Str)
                .column("hidden", CellKind::Bool),
        )
        .table(
            tables::ORGANIZATIONS,
            TableSchema::new().column("name", CellKind::Str),
        )
        .table(
            tables::TEMPLATES,
            TableSchema::new()
                .column("title", CellKind::Str)
                .column("content", CellKind::Str),
        )
        .table(
            tables::CALENDARS,
            TableSchema::new()
                .column("name", CellKind::Str)
                .column("enabled", CellKind::Bool),
        )
        .table(
            tables::TAGS,
            TableSchema::new()
                .column("name", CellKind::Str)
                .column("color", CellKind::Str),
        )
        .table(
            tables::SESSION_PARTICIPANTS,
            TableSchema::new()
                .column("session_id", CellKind::Str)
                .column("human_id", CellKind::Str),
        )
        .table(
            tables::TAG_SESSIONS,
            TableSchema::new()
                .column("session_id", CellKind::Str)
                .column("tag_id", CellKind::Str),
        )
        .table(
            tables::WORDS,
            TableSchema::new()
                .column("transcript_id", CellKind::Str)
                .column("text", CellKind::Str)
                .column("start_ms", CellKind::Num)
                .column("end_ms", CellKind::Num)
                .column("speaker", CellKind::Str),
        )
        .table(
            tables::SPEAKER_HINTS,
            TableSchema::new()
                .column("transcript_id", CellKind::Str)
                .column("label", CellKind::Str)
                .column("offset_ms", CellKind::Num),
        )
        .value(values::USER_ID, ValueSchema::new(CellKind::Str))
        .value(
            values::ONBOARDING_DONE,
            ValueSchema::with_default(CellKind::Bool, false),
        )
        .value(
            values::TELEMETRY_ENABLED,
            ValueSchema::with_default(CellKind::Bool, true),
        )
}
