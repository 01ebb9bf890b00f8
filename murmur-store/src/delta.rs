//! Stamped change deltas exchanged between store instances.
//!
//! A `StoreDelta` is the unit the synchronizer broadcasts between windows.
//! Unlike [`Content`](crate::Content) it carries the full stamped slots,
//! including tombstones, so the receiving store can resolve each cell with
//! last-writer-wins semantics.

use crate::stamped::Stamped;
use murmur_types::{Cell, Stamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stamped cell or value slot. `None` is a deletion tombstone.
pub type CellSlot = Stamped<Option<Cell>>;

/// A set of stamped slot writes, keyed like the store itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDelta {
    /// Table → row → cell → stamped slot.
    #[serde(default)]
    pub tables: BTreeMap<String, BTreeMap<String, BTreeMap<String, CellSlot>>>,
    /// Value name → stamped slot.
    #[serde(default)]
    pub values: BTreeMap<String, CellSlot>,
}

impl StoreDelta {
    /// Creates an empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the delta carries no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self
                .tables
                .values()
                .all(|rows| rows.values().all(BTreeMap::is_empty))
    }

    /// Records a cell slot, replacing any earlier write for the same cell.
    pub fn push_cell(&mut self, table: &str, row: &str, cell: &str, slot: CellSlot) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .entry(row.to_string())
            .or_default()
            .insert(cell.to_string(), slot);
    }

    /// Records a value slot.
    pub fn push_value(&mut self, name: &str, slot: CellSlot) {
        self.values.insert(name.to_string(), slot);
    }

    /// The highest stamp carried by any slot, used to advance the receiving
    /// store's clock.
    #[must_use]
    pub fn max_stamp(&self) -> Option<Stamp> {
        let table_stamps = self
            .tables
            .values()
            .flat_map(|rows| rows.values())
            .flat_map(|cells| cells.values())
            .map(Stamped::stamp);
        let value_stamps = self.values.values().map(Stamped::stamp);
        table_stamps.chain(value_stamps).max()
    }

    /// Iterates all cell slots as `(table, row, cell, slot)`.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str, &str, &CellSlot)> {
        self.tables.iter().flat_map(|(table, rows)| {
            rows.iter().flat_map(move |(row, cells)| {
                cells
                    .iter()
                    .map(move |(cell, slot)| (table.as_str(), row.as_str(), cell.as_str(), slot))
            })
        })
    }
}
