//! Checkpoints: labeled, immutable snapshots of store history for undo.
//!
//! Restoring a checkpoint applies the diff back to the store as ordinary
//! stamped writes; stamps are never rewound, so an undo in one window still
//! merges correctly into sibling windows.

use murmur_store::{Content, MergeableStore};
use tracing::debug;

#[derive(Debug, Clone)]
struct Checkpoint {
    id: u64,
    label: String,
    content: Content,
}

/// Undo/redo stacks of labeled content snapshots.
#[derive(Debug, Default)]
pub struct Checkpoints {
    backward: Vec<Checkpoint>,
    forward: Vec<Checkpoint>,
    next_id: u64,
}

impl Checkpoints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the store's current state under a label and returns the
    /// checkpoint id. Taking a checkpoint discards any redo history.
    pub fn add_checkpoint(&mut self, store: &MergeableStore, label: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let label = label.into();
        debug!(id, label, "checkpoint added");
        self.backward.push(Checkpoint {
            id,
            label,
            content: store.content(),
        });
        self.forward.clear();
        id
    }

    /// Restores the most recent checkpoint, moving the store's current state
    /// onto the redo stack. Returns the restored checkpoint id, or None when
    /// there is nothing to undo.
    pub fn go_backward(&mut self, store: &mut MergeableStore) -> Option<u64> {
        let checkpoint = self.backward.pop()?;
        let id = self.next_id;
        self.next_id += 1;
        self.forward.push(Checkpoint {
            id,
            label: checkpoint.label.clone(),
            content: store.content(),
        });
        store.set_content(checkpoint.content.clone());
        debug!(id = checkpoint.id, label = checkpoint.label, "checkpoint restored");
        Some(checkpoint.id)
    }

    /// Re-applies the most recently undone state. Returns the restored
    /// checkpoint id, or None when there is nothing to redo.
    pub fn go_forward(&mut self, store: &mut MergeableStore) -> Option<u64> {
        let checkpoint = self.forward.pop()?;
        let id = self.next_id;
        self.next_id += 1;
        self.backward.push(Checkpoint {
            id,
            label: checkpoint.label.clone(),
            content: store.content(),
        });
        store.set_content(checkpoint.content.clone());
        Some(checkpoint.id)
    }

    /// Labels of the undo stack, oldest first.
    #[must_use]
    pub fn backward_labels(&self) -> Vec<&str> {
        self.backward.iter().map(|cp| cp.label.as_str()).collect()
    }

    /// Whether an undo target exists.
    #[must_use]
    pub fn can_go_backward(&self) -> bool {
        !self.backward.is_empty()
    }

    /// Whether a redo target exists.
    #[must_use]
    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Drops all history (e.g. after a load that replaces the dataset).
    pub fn clear(&mut self) {
        self.backward.clear();
        self.forward.clear();
    }
}
