//! Cross-window synchronizer for the Murmur store.
//!
//! Propagates raw stamped deltas between store instances living in
//! different windows of one application process, over a broadcast channel
//! scoped to that process. Purely in-process — nothing here touches the
//! network.
//!
//! Delivery order between windows is not guaranteed; convergence is, since
//! per-slot merge is commutative and idempotent (last-writer-wins by
//! stamp). A window that misses a broadcast catches up from the single
//! writer's persisted snapshot the next time it loads — there is no replay
//! log.

mod channel;
mod error;
mod synchronizer;

pub use channel::{SyncChannel, SyncPayload};
pub use error::{SyncError, SyncResult};
pub use synchronizer::{ApplyHook, Synchronizer};
