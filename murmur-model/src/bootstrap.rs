//! Window startup: load, repair, migrate, then take the window's role.
//!
//! Exactly one window is Main: it owns the durable medium, runs the repair
//! and migration passes before any user-visible mutation, and is the only
//! caller of `start_auto_persisting`. Every other window loads the last
//! snapshot and relies on the synchronizer for everything after.

use crate::app::AppStore;
use crate::migrate::embed_transcript_details;
use murmur_persist::{Persister, PersistResult, SqlPersister};
use murmur_sync::{ApplyHook, SyncChannel, Synchronizer};
use std::sync::Arc;
use tracing::{info, warn};

/// Which role this window plays toward the durable medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRole {
    /// The single writer: persists, repairs, migrates.
    Main,
    /// A reader: loads once, then follows broadcasts.
    Secondary,
}

/// Brings one window's store up and attaches it to the instance channel.
/// Returns the running synchronizer; the caller keeps it alive for the
/// window's lifetime.
pub async fn bootstrap(
    app: &AppStore,
    persister: &mut SqlPersister,
    channel: SyncChannel,
    role: WindowRole,
) -> PersistResult<Synchronizer> {
    match role {
        WindowRole::Main => {
            let repaired = persister.load_repairing().await?;
            app.refresh_views().await;
            let migrated = app.transaction(embed_transcript_details).await;
            if repaired > 0 || migrated {
                info!(repaired, migrated, "persisting repaired dataset");
                persister.save().await?;
            }
            persister.start_auto_persisting().await?;
        }
        WindowRole::Secondary => {
            persister.load().await?;
            app.refresh_views().await;
            persister.start_auto_load().await?;
        }
    }

    // Every foreign delta drains into the views, so sibling windows never
    // read stale indexes between commits.
    let on_apply: ApplyHook = {
        let app = app.clone();
        Arc::new(move || {
            let app = app.clone();
            Box::pin(async move { app.refresh_views().await })
        })
    };
    let synchronizer = Synchronizer::start_with(app.shared(), channel, on_apply).await;
    if role == WindowRole::Main {
        // Siblings that opened before this load converge immediately.
        if let Err(error) = synchronizer.broadcast_state().await {
            warn!(%error, "initial state broadcast failed");
        }
    }
    Ok(synchronizer)
}
