//! The mergeable store: an in-memory, schema-constrained table/value store
//! with last-writer-wins merge semantics.
//!
//! Every cell and global value carries a [`Stamp`](murmur_types::Stamp)
//! internally so that concurrent writes from several windows of the same
//! application resolve deterministically. The stamped representation never
//! leaves this crate's [`StoreDelta`] boundary — durable and consumer-facing
//! reads always see bare scalars ([`Content`], [`Cell`](murmur_types::Cell)).
//!
//! Merge satisfies the usual delta-CRDT properties:
//! - **Commutative**: merge(a, b) == merge(b, a)
//! - **Associative**: merge(merge(a, b), c) == merge(a, merge(b, c))
//! - **Idempotent**: merge(a, a) == a

mod changes;
mod content;
mod delta;
mod schema;
mod stamped;
mod store;

pub use changes::{CellChange, ChangeOrigin, ChangeSet, ValueChange};
pub use content::{Content, Row, Table};
pub use delta::{CellSlot, StoreDelta};
pub use schema::{Schema, TableSchema, ValueSchema};
pub use stamped::Stamped;
pub use store::{ListenerId, MergeableStore};
