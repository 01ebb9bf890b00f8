//! Derived read-models over a mergeable store.
//!
//! Each view is defined declaratively once and kept consistent with the
//! source tables by feeding it the change sets the store commits — consumers
//! never re-derive or invalidate anything by hand.
//!
//! A definition referencing a table the schema does not declare is inert: it
//! produces empty results rather than failing.

mod checkpoints;
mod indexes;
mod metrics;
mod queries;
mod relationships;

pub use checkpoints::Checkpoints;
pub use indexes::{Comparator, IndexDef, IndexKey, Indexes};
pub use metrics::{Aggregate, MetricDef, MetricValue, Metrics};
pub use queries::{JoinedRow, Queries, QueryDef};
pub use relationships::{RelationshipDef, Relationships};

use murmur_store::{ChangeSet, MergeableStore};

/// All incremental views of one store, updated together.
///
/// Checkpoints are kept separately by the owner because restoring one needs
/// mutable store access.
#[derive(Default)]
pub struct DerivedViews {
    pub indexes: Indexes,
    pub relationships: Relationships,
    pub queries: Queries,
    pub metrics: Metrics,
}

impl DerivedViews {
    /// Creates an empty view set; definitions are added on the parts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes every view from scratch (after load or definition changes).
    pub fn rebuild(&mut self, store: &MergeableStore) {
        self.indexes.rebuild(store);
        self.relationships.rebuild(store);
        self.queries.rebuild(store);
        self.metrics.rebuild(store);
    }

    /// Applies committed change sets to every view.
    pub fn apply(&mut self, store: &MergeableStore, changes: &[ChangeSet]) {
        for change_set in changes {
            self.indexes.apply(store, change_set);
            self.relationships.apply(store, change_set);
            self.queries.apply(store, change_set);
            self.metrics.apply(store, change_set);
        }
    }
}
