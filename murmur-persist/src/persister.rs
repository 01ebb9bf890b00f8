//! The common persister contract and the auto-persist plumbing shared by
//! every concrete persister.

use crate::error::PersistResult;
use crate::scheduler::SaveScheduler;
use async_trait::async_trait;
use murmur_store::{ChangeSet, ListenerId, MergeableStore};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// The store handle persisters and the synchronizer share with the window.
pub type SharedStore = Arc<RwLock<MergeableStore>>;

/// One store bound to one durable medium.
///
/// `load` overwrites in-memory content with durable content; `save` writes
/// the current in-memory content out. `start_auto_load` subscribes to
/// out-of-band medium changes where the medium can push them (most media
/// here cannot and leave it inert). `start_auto_persisting` subscribes to
/// store commits and debounce-saves; only the main window does this.
#[async_trait]
pub trait Persister: Send + Sync {
    /// Overwrites in-memory content with the durable content, if any.
    async fn load(&self) -> PersistResult<()>;

    /// Writes the current in-memory content to the durable medium.
    async fn save(&self) -> PersistResult<()>;

    /// Re-loads when the durable medium changes out-of-band.
    async fn start_auto_load(&mut self) -> PersistResult<()>;

    /// Saves (debounced) after every relevant store commit.
    async fn start_auto_persisting(&mut self) -> PersistResult<()>;

    /// Runs any pending debounced save now. Idempotent when idle.
    async fn flush(&self);

    /// Unsubscribes everything and drops pending work.
    async fn destroy(&mut self);
}

/// Listener registration plus the task pumping commit notifications into a
/// save scheduler. Held by each persister while auto-persisting is active.
pub(crate) struct AutoPersist {
    listener: ListenerId,
    pump: JoinHandle<()>,
}

impl AutoPersist {
    /// Registers a commit listener on the store and spawns the pump task.
    /// Commits for which `relevant` returns false do not schedule a save.
    pub(crate) async fn start(
        store: &SharedStore,
        scheduler: Arc<SaveScheduler>,
        relevant: impl Fn(&ChangeSet) -> bool + Send + Sync + 'static,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = store.write().await.add_commit_listener(move |changes| {
            if relevant(changes) {
                let _ = tx.send(());
            }
        });
        let pump = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                scheduler.schedule().await;
            }
        });
        Self { listener, pump }
    }

    /// Removes the listener and stops the pump.
    pub(crate) async fn stop(self, store: &SharedStore) {
        store.write().await.del_listener(self.listener);
        self.pump.abort();
    }
}
