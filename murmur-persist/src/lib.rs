//! Persistence layer for the Murmur store.
//!
//! A persister wraps one [`MergeableStore`](murmur_store::MergeableStore)
//! and one durable medium behind a common contract: `load`, `save`,
//! `start_auto_load`, `start_auto_persisting`, `destroy`. Concrete
//! persisters differ only in how load/save map to their medium:
//!
//! - [`SqlPersister`] — the whole store as one JSON blob upserted into an
//!   embedded SQL table, through an injected [`SqlExecutor`].
//! - [`SettingsPersister`] — global values only, exchanged as one JSON
//!   object with a [`SettingsMedium`].
//! - [`DocumentPersister`] — write-mostly mapping of one table's rows to
//!   front-matter documents applied by a [`DocumentSink`].
//!
//! Single-writer rule: exactly one window (the main window) calls
//! `start_auto_persisting`; every other window calls `start_auto_load`
//! only. Auto-persist debounces through [`SaveScheduler`]; `flush` forces a
//! pending save before operations that depend on durability.
//!
//! Durable-medium failures stop here: they are logged and surfaced as
//! [`PersistError`], never thrown into store mutators, so the application
//! stays interactive when persistence is degraded.

mod document;
mod error;
mod persister;
mod repair;
mod scheduler;
mod settings;
mod sql;

pub use document::{
    render_document, DocumentMapping, DocumentOp, DocumentPersister, DocumentSink, FsDocumentSink,
};
pub use error::{PersistError, PersistResult};
pub use persister::{Persister, SharedStore};
pub use repair::unwrap_stamp_leak;
pub use scheduler::SaveScheduler;
pub use settings::{SettingsMedium, SettingsPersister};
pub use sql::{SqlExecutor, SqlPersister, SqlPersisterConfig};
