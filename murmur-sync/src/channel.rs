//! The broadcast channel synchronizers attach to.

use murmur_types::ReplicaId;
use tokio::sync::broadcast;

/// One serialized delta on the wire. The byte payload is opaque to the
/// channel; only the synchronizer/store pair understands it.
#[derive(Debug, Clone)]
pub struct SyncPayload {
    /// The replica that produced the delta, so it can skip its own echoes.
    pub origin: ReplicaId,
    /// The serialized [`StoreDelta`](murmur_store::StoreDelta).
    pub bytes: Vec<u8>,
}

/// A broadcast channel scoped to one application instance. Cloned into
/// every window; each synchronizer publishes to it and subscribes from it.
#[derive(Debug, Clone)]
pub struct SyncChannel {
    tx: broadcast::Sender<SyncPayload>,
}

impl SyncChannel {
    /// Creates a channel buffering up to `capacity` undelivered payloads
    /// per subscriber. A subscriber that falls further behind sees a lagged
    /// receive and relies on the persisted snapshot to catch up.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub(crate) fn sender(&self) -> broadcast::Sender<SyncPayload> {
        self.tx.clone()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SyncPayload> {
        self.tx.subscribe()
    }
}

impl Default for SyncChannel {
    fn default() -> Self {
        Self::new(256)
    }
}
