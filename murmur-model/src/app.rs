//! The per-window store bootstrap: one mergeable store plus the named
//! derived views every consumer reads through.

use crate::schema::{app_schema, tables};
use murmur_store::{MergeableStore, Row, StoreDelta};
use murmur_types::{Cell, ReplicaId};
use murmur_views::{
    Aggregate, Checkpoints, Comparator, DerivedViews, IndexDef, MetricDef, QueryDef,
    RelationshipDef,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Names of the registered indexes.
pub mod indexes {
    pub const SESSIONS_BY_FOLDER: &str = "sessions_by_folder";
    pub const SESSIONS_BY_EVENT: &str = "sessions_by_event";
    pub const TRANSCRIPTS_BY_SESSION: &str = "transcripts_by_session";
    pub const NOTES_BY_SESSION: &str = "notes_by_session";
    pub const PARTICIPANTS_BY_SESSION: &str = "participants_by_session";
    pub const TAGS_BY_SESSION: &str = "tags_by_session";
    pub const EVENTS_BY_DATE: &str = "events_by_date";
    pub const HUMANS_BY_ORG: &str = "humans_by_org";
}

/// Names of the registered relationships.
pub mod relationships {
    pub const SESSION_EVENT: &str = "session_event";
    pub const TRANSCRIPT_SESSION: &str = "transcript_session";
    pub const HUMAN_ORG: &str = "human_org";
}

/// Names of the registered queries.
pub mod queries {
    pub const EVENTS_WITHOUT_SESSION: &str = "events_without_session";
    pub const SESSION_RECORDING_TIMES: &str = "session_recording_times";
    pub const VISIBLE_HUMANS: &str = "visible_humans";
}

/// Names of the registered metrics.
pub mod metrics {
    pub const SESSION_COUNT: &str = "session_count";
    pub const TOTAL_RECORDING_MS: &str = "total_recording_ms";
}

/// One window's store with its derived views and undo history.
///
/// All consumers go through this handle: reads through `read`/`views`,
/// writes through `transaction`, which refreshes the views after commit.
/// Persisters and the synchronizer attach to the shared store directly;
/// after a load lands outside a transaction, `refresh_views` brings the
/// views back in step, and the bootstrap wires the synchronizer's apply
/// hook to do the same for every remote delta. Cloning yields another
/// handle to the same store, views, and history.
#[derive(Clone)]
pub struct AppStore {
    store: Arc<RwLock<MergeableStore>>,
    views: Arc<RwLock<DerivedViews>>,
    checkpoints: Arc<RwLock<Checkpoints>>,
}

impl AppStore {
    /// Creates a window's store with a fresh replica id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_replica(ReplicaId::new())
    }

    /// Creates a window's store with an explicit replica id.
    #[must_use]
    pub fn with_replica(replica: ReplicaId) -> Self {
        let store = MergeableStore::with_replica(app_schema(), replica);
        let mut views = DerivedViews::new();
        define_views(&mut views);
        views.rebuild(&store);
        Self {
            store: Arc::new(RwLock::new(store)),
            views: Arc::new(RwLock::new(views)),
            checkpoints: Arc::new(RwLock::new(Checkpoints::new())),
        }
    }

    /// The shared store handle persisters and the synchronizer attach to.
    #[must_use]
    pub fn shared(&self) -> Arc<RwLock<MergeableStore>> {
        Arc::clone(&self.store)
    }

    /// Runs `f` against the store.
    pub async fn read<R>(&self, f: impl FnOnce(&MergeableStore) -> R) -> R {
        f(&*self.store.read().await)
    }

    /// Runs `f` against the current derived views.
    pub async fn views<R>(&self, f: impl FnOnce(&DerivedViews) -> R) -> R {
        f(&*self.views.read().await)
    }

    /// Runs `f` as one store transaction and refreshes the views.
    pub async fn transaction<R>(&self, f: impl FnOnce(&mut MergeableStore) -> R) -> R {
        let result = self.store.write().await.transaction(f);
        self.refresh_views().await;
        result
    }

    /// Applies a delta from a sibling window and refreshes the views.
    pub async fn apply_remote(&self, delta: &StoreDelta) {
        self.store.write().await.apply_delta(delta);
        self.refresh_views().await;
    }

    /// Drains commits made directly on the shared store (loads, synced
    /// deltas) into the views.
    pub async fn refresh_views(&self) {
        let changes = self.store.write().await.take_committed();
        if changes.is_empty() {
            return;
        }
        let store = self.store.read().await;
        self.views.write().await.apply(&store, &changes);
    }

    /// Snapshots the current state for undo.
    pub async fn checkpoint(&self, label: impl Into<String>) -> u64 {
        let store = self.store.read().await;
        self.checkpoints.write().await.add_checkpoint(&store, label)
    }

    /// Restores the most recent checkpoint, if any.
    pub async fn undo(&self) -> Option<u64> {
        let restored = {
            let mut store = self.store.write().await;
            self.checkpoints.write().await.go_backward(&mut store)
        };
        self.refresh_views().await;
        restored
    }

    /// Re-applies the most recently undone state, if any.
    pub async fn redo(&self) -> Option<u64> {
        let restored = {
            let mut store = self.store.write().await;
            self.checkpoints.write().await.go_forward(&mut store)
        };
        self.refresh_views().await;
        restored
    }
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new()
    }
}

/// The date bucket of an event row: the `YYYY-MM-DD` prefix of its ISO
/// `starts_at`, or the empty bucket when absent or too short.
fn event_date_bucket(row: &Row) -> String {
    row.get("starts_at")
        .and_then(Cell::as_str)
        .filter(|s| s.len() >= 10)
        .map(|s| s[..10].to_string())
        .unwrap_or_default()
}

fn define_views(views: &mut DerivedViews) {
    views
        .indexes
        .define(
            indexes::SESSIONS_BY_FOLDER,
            IndexDef::by_cell(tables::SESSIONS, "folder_id")
                .sorted_by("created_at", Comparator::Numeric),
        )
        .define(
            indexes::SESSIONS_BY_EVENT,
            IndexDef::by_cell(tables::SESSIONS, "event_id"),
        )
        .define(
            indexes::TRANSCRIPTS_BY_SESSION,
            IndexDef::by_cell(tables::TRANSCRIPTS, "session_id"),
        )
        .define(
            indexes::NOTES_BY_SESSION,
            IndexDef::by_cell(tables::ENHANCED_NOTES, "session_id")
                .sorted_by("created_at", Comparator::Numeric),
        )
        .define(
            indexes::PARTICIPANTS_BY_SESSION,
            IndexDef::by_cell(tables::SESSION_PARTICIPANTS, "session_id"),
        )
        .define(
            indexes::TAGS_BY_SESSION,
            IndexDef::by_cell(tables::TAG_SESSIONS, "session_id"),
        )
        .define(
            indexes::EVENTS_BY_DATE,
            IndexDef::derived(tables::EVENTS, event_date_bucket)
                .sorted_by("starts_at", Comparator::Lexical),
        )
        .define(
            indexes::HUMANS_BY_ORG,
            IndexDef::by_cell(tables::HUMANS, "org_id"),
        );

    views
        .relationships
        .define(
            relationships::SESSION_EVENT,
            RelationshipDef::new(tables::SESSIONS, tables::EVENTS, "event_id"),
        )
        .define(
            relationships::TRANSCRIPT_SESSION,
            RelationshipDef::new(tables::TRANSCRIPTS, tables::SESSIONS, "session_id"),
        )
        .define(
            relationships::HUMAN_ORG,
            RelationshipDef::new(tables::HUMANS, tables::ORGANIZATIONS, "org_id"),
        );

    views
        .queries
        .define(
            queries::EVENTS_WITHOUT_SESSION,
            QueryDef::new(tables::EVENTS)
                .select("title")
                .select("starts_at")
                // The foreign key lives on the session side, so the join
                // resolves by scanning sessions for one pointing back.
                .join_scan(tables::SESSIONS, "session", |store, event_id| {
                    store
                        .get_table(tables::SESSIONS)
                        .into_iter()
                        .find(|(_, row)| {
                            row.get("event_id").and_then(Cell::as_str) == Some(event_id)
                        })
                        .map(|(session_id, _)| session_id)
                })
                .where_row(|row| row.cell("session", "event_id").is_none()),
        )
        .define(
            queries::SESSION_RECORDING_TIMES,
            QueryDef::new(tables::SESSIONS)
                .select("folder_id")
                .select("duration_ms")
                .group("duration_ms", Aggregate::Sum, "total_ms"),
        )
        .define(
            queries::VISIBLE_HUMANS,
            QueryDef::new(tables::HUMANS)
                .select("name")
                .join(tables::ORGANIZATIONS, "org_id", "org")
                .select_from("org", "name", "org_name")
                .where_row(|row| {
                    row.root_cell("hidden").and_then(Cell::as_bool) != Some(true)
                }),
        );

    views
        .metrics
        .define(
            metrics::SESSION_COUNT,
            MetricDef::derived(tables::SESSIONS, Aggregate::Count, |_| 1.0),
        )
        .define(
            metrics::TOTAL_RECORDING_MS,
            MetricDef::of_cell(tables::SESSIONS, Aggregate::Sum, "duration_ms"),
        );
}
