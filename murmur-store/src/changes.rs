//! Committed change descriptions handed to listeners and view engines.

use crate::delta::StoreDelta;
use murmur_types::Cell;

/// Where a committed transaction originated.
///
/// The synchronizer broadcasts `Local` commits and applies foreign deltas as
/// `Remote` commits; remote commits are never re-broadcast, which is what
/// terminates propagation between windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeOrigin {
    /// A write made by this window (including merges it initiated).
    #[default]
    Local,
    /// A delta received from a sibling window.
    Remote,
}

/// One visible cell change: `old == None` is a creation, `new == None` a
/// deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct CellChange {
    pub table: String,
    pub row: String,
    pub cell: String,
    pub old: Option<Cell>,
    pub new: Option<Cell>,
}

/// One visible global value change.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub name: String,
    pub old: Option<Cell>,
    pub new: Option<Cell>,
}

/// Everything one committed transaction changed.
///
/// `cells`/`values` describe the visible scalar transitions; `delta` is the
/// stamped form of the same commit for the synchronizer.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub origin: ChangeOrigin,
    pub cells: Vec<CellChange>,
    pub values: Vec<ValueChange>,
    pub delta: StoreDelta,
}

impl ChangeSet {
    /// Returns true if the transaction changed nothing visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.values.is_empty()
    }

    /// Distinct `(table, row)` pairs touched by this commit, in first-touch
    /// order.
    #[must_use]
    pub fn touched_rows(&self) -> Vec<(String, String)> {
        let mut seen = Vec::new();
        for change in &self.cells {
            let key = (change.table.clone(), change.row.clone());
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        seen
    }

    /// Distinct table names touched by this commit.
    #[must_use]
    pub fn touched_tables(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for change in &self.cells {
            if !seen.contains(&change.table) {
                seen.push(change.table.clone());
            }
        }
        seen
    }
}
