//! The stamped slot wrapping every stored cell and value.
//!
//! A last-writer-wins register: the write with the highest stamp wins, and
//! the higher replica id breaks ties (arbitrary but deterministic). The
//! store wraps cell slots as `Stamped<Option<Cell>>` so deletions are
//! tombstones that participate in merge like any other write.

use murmur_types::{ReplicaId, Stamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A value plus the merge metadata deciding whether an incoming write
/// replaces it.
///
/// `Stamped<T>` is internal to the store and its delta boundary. It must be
/// unwrapped to `T` before anything crosses into a persister or a consumer
/// read — persisting the wrapper itself is the "stamp leak" defect the
/// repair pass corrects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stamped<T> {
    value: T,
    stamp: Stamp,
    replica: ReplicaId,
}

impl<T> Stamped<T> {
    /// Wraps a value written at the given stamp by the given replica.
    #[must_use]
    pub fn new(value: T, stamp: Stamp, replica: ReplicaId) -> Self {
        Self {
            value,
            stamp,
            replica,
        }
    }

    /// Returns a reference to the wrapped value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Unwraps into the inner value, discarding merge metadata.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }

    /// Returns the stamp of the last write.
    #[must_use]
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    /// Returns the replica that performed the last write.
    #[must_use]
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Decides whether an incoming write wins over this one.
    #[must_use]
    pub fn should_accept(&self, stamp: Stamp, replica: ReplicaId) -> bool {
        match stamp.cmp(&self.stamp) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => replica > self.replica,
        }
    }
}

impl<T: Clone> Stamped<T> {
    /// Merges another slot into this one, keeping the winning write.
    pub fn merge(&mut self, other: &Self) {
        if self.should_accept(other.stamp, other.replica) {
            self.value = other.value.clone();
            self.stamp = other.stamp;
            self.replica = other.replica;
        }
    }

    /// Returns the merge of this slot and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl<T: PartialEq> PartialEq for Stamped<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.stamp == other.stamp && self.replica == other.replica
    }
}
