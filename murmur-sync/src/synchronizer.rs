//! The synchronizer: one store attached to one broadcast channel.

use crate::channel::{SyncChannel, SyncPayload};
use crate::error::{SyncError, SyncResult};
use futures::future::BoxFuture;
use murmur_store::{ChangeOrigin, ListenerId, MergeableStore, StoreDelta};
use murmur_types::ReplicaId;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type SharedStore = Arc<RwLock<MergeableStore>>;

/// Awaited after each foreign delta lands, with no store lock held, so the
/// embedder can drain the commit and refresh whatever it derives from the
/// store.
pub type ApplyHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Attaches a store to a [`SyncChannel`].
///
/// Every Local-origin commit is serialized and broadcast; foreign payloads
/// are applied via `apply_delta`, which commits them as Remote-origin so
/// they are never re-broadcast — that is what terminates echo loops.
pub struct Synchronizer {
    store: SharedStore,
    replica: ReplicaId,
    channel: SyncChannel,
    listener: Option<ListenerId>,
    receiver: Option<JoinHandle<()>>,
}

impl Synchronizer {
    /// Starts broadcasting the store's commits and applying foreign deltas.
    pub async fn start(store: SharedStore, channel: SyncChannel) -> Self {
        Self::start_inner(store, channel, None).await
    }

    /// Like [`start`](Self::start), but awaits `on_apply` after every
    /// foreign delta, so derived state downstream of the store never goes
    /// stale between commits.
    pub async fn start_with(store: SharedStore, channel: SyncChannel, on_apply: ApplyHook) -> Self {
        Self::start_inner(store, channel, Some(on_apply)).await
    }

    async fn start_inner(
        store: SharedStore,
        channel: SyncChannel,
        on_apply: Option<ApplyHook>,
    ) -> Self {
        let replica = store.read().await.replica();

        let tx = channel.sender();
        let listener = store.write().await.add_commit_listener(move |changes| {
            if changes.origin != ChangeOrigin::Local || changes.delta.is_empty() {
                return;
            }
            match serde_json::to_vec(&changes.delta) {
                Ok(bytes) => {
                    // No subscribers is fine; the payload is simply dropped.
                    let _ = tx.send(SyncPayload {
                        origin: replica,
                        bytes,
                    });
                }
                Err(error) => warn!(%error, "could not serialize commit delta"),
            }
        });

        let mut rx = channel.subscribe();
        let receiver_store = Arc::clone(&store);
        let receiver = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => {
                        if payload.origin == replica {
                            continue;
                        }
                        match serde_json::from_slice::<StoreDelta>(&payload.bytes) {
                            Ok(delta) => {
                                receiver_store.write().await.apply_delta(&delta);
                                debug!(origin = %payload.origin, "applied foreign delta");
                                if let Some(hook) = &on_apply {
                                    hook().await;
                                }
                            }
                            Err(error) => {
                                warn!(%error, origin = %payload.origin, "dropped undecodable payload");
                            }
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "fell behind the broadcast channel; relying on the persisted snapshot");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self {
            store,
            replica,
            channel,
            listener: Some(listener),
            receiver: Some(receiver),
        }
    }

    /// The replica this synchronizer speaks for.
    #[must_use]
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Broadcasts the store's full stamped state, tombstones included, so
    /// already-open siblings converge without waiting for the next commit.
    /// The main window calls this once after its initial load.
    pub async fn broadcast_state(&self) -> SyncResult<()> {
        let delta = self.store.read().await.full_delta();
        if delta.is_empty() {
            return Ok(());
        }
        let bytes = serde_json::to_vec(&delta)?;
        self.channel
            .sender()
            .send(SyncPayload {
                origin: self.replica,
                bytes,
            })
            .map_err(|_| SyncError::ChannelClosed)?;
        Ok(())
    }

    /// Detaches from the store and the channel.
    pub async fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.store.write().await.del_listener(listener);
        }
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        // The listener is removed in `stop`; at minimum the receive task
        // must not outlive the synchronizer.
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }
}
