//! Cascade delete: a session disappears together with everything that
//! references it, atomically for every in-window reader.
//!
//! The external side effect (the recording on disk) and the in-store
//! cascade have different consistency guarantees and are kept separate:
//! audio deletion is best-effort and advisory, the store cascade is one
//! transaction. Dependents are enumerated through the session indexes, so
//! the cascade is O(dependents), not O(all rows).

use crate::app::{indexes, AppStore};
use crate::schema::tables;
use async_trait::async_trait;
use tracing::{info, warn};

/// The external store holding a session's recorded audio.
#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Removes the recording for one session, if any.
    async fn delete_audio(&self, session_id: &str) -> anyhow::Result<()>;
}

/// Rows across all tables that reference one session.
#[derive(Debug, Default)]
struct Dependents {
    transcripts: Vec<String>,
    notes: Vec<String>,
    participants: Vec<String>,
    tag_mappings: Vec<String>,
}

impl Dependents {
    fn count(&self) -> usize {
        self.transcripts.len() + self.notes.len() + self.participants.len()
            + self.tag_mappings.len()
    }
}

/// Deletes a session, its dependent rows in every table, and (best-effort)
/// its audio. Returns the number of dependent rows removed.
pub async fn delete_session_cascade(
    app: &AppStore,
    audio: &dyn AudioStore,
    session_id: &str,
) -> usize {
    // Outside the transaction: failure is logged, never rolls back or
    // blocks the in-store cascade.
    if let Err(error) = audio.delete_audio(session_id).await {
        warn!(session_id, %error, "audio deletion failed; store cascade continues");
    }

    let dependents = app
        .views(|views| Dependents {
            transcripts: views
                .indexes
                .slice_row_ids(indexes::TRANSCRIPTS_BY_SESSION, session_id)
                .to_vec(),
            notes: views
                .indexes
                .slice_row_ids(indexes::NOTES_BY_SESSION, session_id)
                .to_vec(),
            participants: views
                .indexes
                .slice_row_ids(indexes::PARTICIPANTS_BY_SESSION, session_id)
                .to_vec(),
            tag_mappings: views
                .indexes
                .slice_row_ids(indexes::TAGS_BY_SESSION, session_id)
                .to_vec(),
        })
        .await;
    let removed = dependents.count();

    app.transaction(|store| {
        for row in &dependents.transcripts {
            store.del_row(tables::TRANSCRIPTS, row);
        }
        for row in &dependents.notes {
            store.del_row(tables::ENHANCED_NOTES, row);
        }
        for row in &dependents.participants {
            store.del_row(tables::SESSION_PARTICIPANTS, row);
        }
        for row in &dependents.tag_mappings {
            store.del_row(tables::TAG_SESSIONS, row);
        }
        store.del_row(tables::SESSIONS, session_id);
    })
    .await;

    info!(session_id, removed, "session cascade complete");
    removed
}
