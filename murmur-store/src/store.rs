//! The mergeable store: tables, values, transactions, listeners, merge.

use crate::changes::{CellChange, ChangeOrigin, ChangeSet, ValueChange};
use crate::content::{Content, Row, Table};
use crate::delta::{CellSlot, StoreDelta};
use crate::schema::Schema;
use crate::stamped::Stamped;
use murmur_types::{Cell, ReplicaId, Stamp};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type CellListenerFn = Arc<dyn Fn(&CellChange) + Send + Sync>;
type RowListenerFn = Arc<dyn Fn(&str, &str) + Send + Sync>;
type ValueListenerFn = Arc<dyn Fn(&ValueChange) + Send + Sync>;
type CommitListenerFn = Arc<dyn Fn(&ChangeSet) + Send + Sync>;

enum ListenerKind {
    Cell {
        table: Option<String>,
        row: Option<String>,
        cell: Option<String>,
        cb: CellListenerFn,
    },
    Row {
        table: Option<String>,
        cb: RowListenerFn,
    },
    Value {
        name: Option<String>,
        cb: ValueListenerFn,
    },
    Commit {
        cb: CommitListenerFn,
    },
}

struct ListenerEntry {
    id: ListenerId,
    kind: ListenerKind,
}

/// In-memory, schema-constrained table/value store with last-writer-wins
/// merge.
///
/// One instance per window. All mutation is synchronous; concurrency arises
/// between windows, each merging the others' deltas. Writes violating the
/// schema are rejected as logged no-ops so a single bad write can never take
/// the store down.
pub struct MergeableStore {
    schema: Schema,
    replica: ReplicaId,
    clock: Stamp,
    tables: BTreeMap<String, BTreeMap<String, BTreeMap<String, CellSlot>>>,
    values: BTreeMap<String, CellSlot>,
    txn_depth: usize,
    pending: ChangeSet,
    committed: Vec<ChangeSet>,
    listeners: Vec<ListenerEntry>,
    next_listener: u64,
}

impl MergeableStore {
    /// Creates an empty store for the given schema, materializing declared
    /// value defaults.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self::with_replica(schema, ReplicaId::new())
    }

    /// Creates a store with an explicit replica id (tests and replay).
    #[must_use]
    pub fn with_replica(schema: Schema, replica: ReplicaId) -> Self {
        let mut clock = Stamp::now();
        let mut values = BTreeMap::new();
        for (name, value_schema) in schema.values() {
            if let Some(default) = value_schema.default_value() {
                clock = clock.tick();
                values.insert(
                    name.to_string(),
                    Stamped::new(Some(default.clone()), clock, replica),
                );
            }
        }
        Self {
            schema,
            replica,
            clock,
            tables: BTreeMap::new(),
            values,
            txn_depth: 0,
            pending: ChangeSet::default(),
            committed: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// The schema this store enforces.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// This store instance's replica id.
    #[must_use]
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    // ── Transactions ─────────────────────────────────────────────

    /// Runs `f` as one transaction: listeners fire once, at the outermost
    /// commit. Nested calls coalesce into the enclosing transaction.
    pub fn transaction<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.txn_depth += 1;
        let result = f(self);
        self.txn_depth -= 1;
        if self.txn_depth == 0 {
            self.commit();
        }
        result
    }

    fn commit(&mut self) {
        let changes = std::mem::take(&mut self.pending);
        if changes.is_empty() && changes.delta.is_empty() {
            return;
        }
        self.notify(&changes);
        self.committed.push(changes);
    }

    /// Drains the change sets committed since the last call.
    ///
    /// Derived view engines call this after mutating to stay consistent with
    /// the source tables.
    pub fn take_committed(&mut self) -> Vec<ChangeSet> {
        std::mem::take(&mut self.committed)
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Sets one cell. Returns false (and logs) when the write violates the
    /// schema.
    pub fn set_cell(
        &mut self,
        table: &str,
        row: &str,
        cell: &str,
        value: impl Into<Cell>,
    ) -> bool {
        let value = value.into();
        if !self.schema.check_cell(table, cell, &value) {
            warn!(table, row, cell, "rejected cell write: schema violation");
            return false;
        }
        self.transaction(|s| s.write_cell(table, row, cell, Some(value)));
        true
    }

    /// Replaces an entire row: declared cells absent from `row_data` are
    /// deleted. Schema-violating cells are skipped with a warning.
    pub fn set_row(&mut self, table: &str, row: &str, row_data: Row) {
        self.transaction(|s| {
            let stale: Vec<String> = s
                .live_row(table, row)
                .map(|cells| {
                    cells
                        .keys()
                        .filter(|cell| !row_data.contains_key(*cell))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            for cell in stale {
                s.write_cell(table, row, &cell, None);
            }
            s.set_partial_row(table, row, row_data);
        });
    }

    /// Sets the given cells of a row, leaving others untouched.
    pub fn set_partial_row(&mut self, table: &str, row: &str, row_data: Row) {
        self.transaction(|s| {
            for (cell, value) in row_data {
                if !s.schema.check_cell(table, &cell, &value) {
                    warn!(table, row, cell, "rejected cell write: schema violation");
                    continue;
                }
                s.write_cell(table, row, &cell, Some(value));
            }
        });
    }

    /// Deletes a row by tombstoning all its live cells.
    pub fn del_row(&mut self, table: &str, row: &str) {
        self.transaction(|s| {
            let cells: Vec<String> = s
                .live_row(table, row)
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default();
            for cell in cells {
                s.write_cell(table, row, &cell, None);
            }
        });
    }

    /// Deletes one cell.
    pub fn del_cell(&mut self, table: &str, row: &str, cell: &str) {
        self.transaction(|s| s.write_cell(table, row, cell, None));
    }

    /// Sets one global value. Returns false (and logs) on schema violation.
    pub fn set_value(&mut self, name: &str, value: impl Into<Cell>) -> bool {
        let value = value.into();
        if !self.schema.check_value(name, &value) {
            warn!(name, "rejected value write: schema violation");
            return false;
        }
        self.transaction(|s| s.write_value(name, Some(value)));
        true
    }

    /// Deletes one global value.
    pub fn del_value(&mut self, name: &str) {
        self.transaction(|s| s.write_value(name, None));
    }

    fn next_stamp(&mut self) -> Stamp {
        self.clock = self.clock.tick();
        self.clock
    }

    fn write_cell(&mut self, table: &str, row: &str, cell: &str, value: Option<Cell>) {
        let old = self.get_cell(table, row, cell);
        if old == value {
            return;
        }
        let stamp = self.next_stamp();
        let slot = Stamped::new(value.clone(), stamp, self.replica);
        self.tables
            .entry(table.to_string())
            .or_default()
            .entry(row.to_string())
            .or_default()
            .insert(cell.to_string(), slot.clone());
        self.pending.delta.push_cell(table, row, cell, slot);
        self.pending.cells.push(CellChange {
            table: table.to_string(),
            row: row.to_string(),
            cell: cell.to_string(),
            old,
            new: value,
        });
    }

    fn write_value(&mut self, name: &str, value: Option<Cell>) {
        let old = self.get_value(name);
        if old == value {
            return;
        }
        let stamp = self.next_stamp();
        let slot = Stamped::new(value.clone(), stamp, self.replica);
        self.values.insert(name.to_string(), slot.clone());
        self.pending.delta.push_value(name, slot);
        self.pending.values.push(ValueChange {
            name: name.to_string(),
            old,
            new: value,
        });
    }

    // ── Reads ────────────────────────────────────────────────────

    fn live_row(&self, table: &str, row: &str) -> Option<Row> {
        let cells = self.tables.get(table)?.get(row)?;
        let live: Row = cells
            .iter()
            .filter_map(|(cell, slot)| {
                slot.value()
                    .as_ref()
                    .map(|value| (cell.clone(), value.clone()))
            })
            .collect();
        if live.is_empty() { None } else { Some(live) }
    }

    /// Returns one cell's scalar, if set.
    #[must_use]
    pub fn get_cell(&self, table: &str, row: &str, cell: &str) -> Option<Cell> {
        self.tables
            .get(table)?
            .get(row)?
            .get(cell)?
            .value()
            .clone()
    }

    /// Returns a row's live cells, or None if the row does not exist.
    #[must_use]
    pub fn get_row(&self, table: &str, row: &str) -> Option<Row> {
        self.live_row(table, row)
    }

    /// Returns true if the row has at least one live cell.
    #[must_use]
    pub fn has_row(&self, table: &str, row: &str) -> bool {
        self.live_row(table, row).is_some()
    }

    /// Returns all live rows of a table.
    #[must_use]
    pub fn get_table(&self, table: &str) -> Table {
        self.tables
            .get(table)
            .map(|rows| {
                rows.keys()
                    .filter_map(|row| Some((row.clone(), self.live_row(table, row)?)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of all live rows of a table.
    #[must_use]
    pub fn row_ids(&self, table: &str) -> Vec<String> {
        self.tables
            .get(table)
            .map(|rows| {
                rows.keys()
                    .filter(|row| self.live_row(table, row).is_some())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of all tables currently holding at least one live row.
    #[must_use]
    pub fn table_ids(&self) -> Vec<String> {
        self.tables
            .keys()
            .filter(|table| !self.row_ids(table).is_empty())
            .cloned()
            .collect()
    }

    /// Calls `f` for every live row of a table.
    pub fn for_each_row(&self, table: &str, mut f: impl FnMut(&str, &Row)) {
        for (row, cells) in self.get_table(table) {
            f(&row, &cells);
        }
    }

    /// Returns one global value's scalar, if set.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<Cell> {
        self.values.get(name)?.value().clone()
    }

    /// Names of all set global values.
    #[must_use]
    pub fn value_ids(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|(_, slot)| slot.value().is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    // ── Merge ────────────────────────────────────────────────────

    /// Exports every slot of this store, tombstones included.
    #[must_use]
    pub fn full_delta(&self) -> StoreDelta {
        let mut delta = StoreDelta::new();
        for (table, rows) in &self.tables {
            for (row, cells) in rows {
                for (cell, slot) in cells {
                    delta.push_cell(table, row, cell, slot.clone());
                }
            }
        }
        for (name, slot) in &self.values {
            delta.push_value(name, slot.clone());
        }
        delta
    }

    /// Folds another store's state into this one, cell by cell, last writer
    /// wins. The resulting commit is Local-origin, so it propagates to
    /// sibling windows like any other local write.
    pub fn merge(&mut self, other: &MergeableStore) {
        let delta = other.full_delta();
        self.apply_slots(&delta, ChangeOrigin::Local);
    }

    /// Applies a delta received from a sibling window. Remote-origin: the
    /// resulting commit is not re-broadcast.
    pub fn apply_delta(&mut self, delta: &StoreDelta) {
        self.apply_slots(delta, ChangeOrigin::Remote);
    }

    fn apply_slots(&mut self, delta: &StoreDelta, origin: ChangeOrigin) {
        self.transaction(|s| {
            s.pending.origin = origin;

            for (table, row, cell, slot) in delta.cells() {
                match slot.value() {
                    Some(value) => {
                        if !s.schema.check_cell(table, cell, value) {
                            warn!(table, row, cell, "skipped merged cell: schema violation");
                            continue;
                        }
                    }
                    None => {
                        if !s.schema.has_table(table) {
                            continue;
                        }
                    }
                }
                s.merge_cell_slot(table, row, cell, slot);
            }

            for (name, slot) in &delta.values {
                if let Some(value) = slot.value() {
                    if !s.schema.check_value(name, value) {
                        warn!(name, "skipped merged value: schema violation");
                        continue;
                    }
                }
                s.merge_value_slot(name, slot);
            }

            if let Some(max) = delta.max_stamp() {
                s.clock = s.clock.receive(&max);
            }
        });
    }

    fn merge_cell_slot(&mut self, table: &str, row: &str, cell: &str, slot: &CellSlot) {
        let current = self
            .tables
            .get(table)
            .and_then(|rows| rows.get(row))
            .and_then(|cells| cells.get(cell));
        let accept = match current {
            Some(cur) => cur.should_accept(slot.stamp(), slot.replica()),
            None => true,
        };
        if !accept {
            return;
        }
        let old = current.and_then(|cur| cur.value().clone());
        let new = slot.value().clone();
        self.tables
            .entry(table.to_string())
            .or_default()
            .entry(row.to_string())
            .or_default()
            .insert(cell.to_string(), slot.clone());
        self.pending.delta.push_cell(table, row, cell, slot.clone());
        if old != new {
            self.pending.cells.push(CellChange {
                table: table.to_string(),
                row: row.to_string(),
                cell: cell.to_string(),
                old,
                new,
            });
        }
    }

    fn merge_value_slot(&mut self, name: &str, slot: &CellSlot) {
        let current = self.values.get(name);
        let accept = match current {
            Some(cur) => cur.should_accept(slot.stamp(), slot.replica()),
            None => true,
        };
        if !accept {
            return;
        }
        let old = current.and_then(|cur| cur.value().clone());
        let new = slot.value().clone();
        self.values.insert(name.to_string(), slot.clone());
        self.pending.delta.push_value(name, slot.clone());
        if old != new {
            self.pending.values.push(ValueChange {
                name: name.to_string(),
                old,
                new,
            });
        }
    }

    // ── Content snapshots (the stamp-leak boundary) ──────────────

    /// Produces the unstamped snapshot of this store. This is the only form
    /// persisters are given; stamps never cross this boundary.
    #[must_use]
    pub fn content(&self) -> Content {
        let mut content = Content::new();
        for table in self.tables.keys() {
            let rows = self.get_table(table);
            if !rows.is_empty() {
                content.tables.insert(table.clone(), rows);
            }
        }
        for name in self.value_ids() {
            if let Some(value) = self.get_value(&name) {
                content.values.insert(name, value);
            }
        }
        content
    }

    /// Overwrites in-memory state with durable content, in one transaction.
    /// Cells identical to the incoming content are left untouched.
    pub fn set_content(&mut self, content: Content) {
        self.transaction(|s| {
            // Drop live state absent from the incoming snapshot.
            for table in s.table_ids() {
                for row in s.row_ids(&table) {
                    let incoming = content.tables.get(&table).and_then(|rows| rows.get(&row));
                    let cells: Vec<String> = s
                        .live_row(&table, &row)
                        .map(|cells| cells.keys().cloned().collect())
                        .unwrap_or_default();
                    for cell in cells {
                        if incoming.is_none_or(|row| !row.contains_key(&cell)) {
                            s.write_cell(&table, &row, &cell, None);
                        }
                    }
                }
            }
            for name in s.value_ids() {
                if !content.values.contains_key(&name) {
                    s.write_value(&name, None);
                }
            }

            for (table, rows) in &content.tables {
                for (row, cells) in rows {
                    for (cell, value) in cells {
                        if !s.schema.check_cell(table, cell, value) {
                            warn!(table, row, cell, "skipped loaded cell: schema violation");
                            continue;
                        }
                        s.write_cell(table, row, cell, Some(value.clone()));
                    }
                }
            }
            for (name, value) in &content.values {
                if !s.schema.check_value(name, value) {
                    warn!(name, "skipped loaded value: schema violation");
                    continue;
                }
                s.write_value(name, Some(value.clone()));
            }
        });
    }

    /// Snapshot of global values only, for the settings persister.
    #[must_use]
    pub fn values_content(&self) -> BTreeMap<String, Cell> {
        self.value_ids()
            .into_iter()
            .filter_map(|name| Some((name.clone(), self.get_value(&name)?)))
            .collect()
    }

    /// Overwrites global values only, leaving tables untouched.
    pub fn set_values_content(&mut self, values: BTreeMap<String, Cell>) {
        self.transaction(|s| {
            for name in s.value_ids() {
                if !values.contains_key(&name) {
                    s.write_value(&name, None);
                }
            }
            for (name, value) in &values {
                if !s.schema.check_value(name, value) {
                    warn!(name, "skipped loaded value: schema violation");
                    continue;
                }
                s.write_value(name, Some(value.clone()));
            }
        });
    }

    // ── Listeners ────────────────────────────────────────────────

    fn register(&mut self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(ListenerEntry { id, kind });
        id
    }

    /// Listens for cell changes, optionally filtered by table/row/cell.
    /// Fires after transaction commit, once per changed cell.
    pub fn add_cell_listener(
        &mut self,
        table: Option<&str>,
        row: Option<&str>,
        cell: Option<&str>,
        cb: impl Fn(&CellChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.register(ListenerKind::Cell {
            table: table.map(str::to_string),
            row: row.map(str::to_string),
            cell: cell.map(str::to_string),
            cb: Arc::new(cb),
        })
    }

    /// Listens for row-level changes (any cell of the row), once per touched
    /// row per commit.
    pub fn add_row_listener(
        &mut self,
        table: Option<&str>,
        cb: impl Fn(&str, &str) + Send + Sync + 'static,
    ) -> ListenerId {
        self.register(ListenerKind::Row {
            table: table.map(str::to_string),
            cb: Arc::new(cb),
        })
    }

    /// Listens for global value changes.
    pub fn add_value_listener(
        &mut self,
        name: Option<&str>,
        cb: impl Fn(&ValueChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.register(ListenerKind::Value {
            name: name.map(str::to_string),
            cb: Arc::new(cb),
        })
    }

    /// Listens for whole committed transactions, origin and stamped delta
    /// included. The synchronizer and auto-persisting persisters attach here.
    pub fn add_commit_listener(
        &mut self,
        cb: impl Fn(&ChangeSet) + Send + Sync + 'static,
    ) -> ListenerId {
        self.register(ListenerKind::Commit { cb: Arc::new(cb) })
    }

    /// Removes a listener.
    pub fn del_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|entry| entry.id != id);
    }

    fn notify(&self, changes: &ChangeSet) {
        let touched = changes.touched_rows();
        for entry in &self.listeners {
            match &entry.kind {
                ListenerKind::Cell {
                    table,
                    row,
                    cell,
                    cb,
                } => {
                    for change in &changes.cells {
                        let matches = table.as_deref().is_none_or(|t| t == change.table)
                            && row.as_deref().is_none_or(|r| r == change.row)
                            && cell.as_deref().is_none_or(|c| c == change.cell);
                        if matches {
                            cb(change);
                        }
                    }
                }
                ListenerKind::Row { table, cb } => {
                    for (t, r) in &touched {
                        if table.as_deref().is_none_or(|filter| filter == t) {
                            cb(t, r);
                        }
                    }
                }
                ListenerKind::Value { name, cb } => {
                    for change in &changes.values {
                        if name.as_deref().is_none_or(|n| n == change.name) {
                            cb(change);
                        }
                    }
                }
                ListenerKind::Commit { cb } => cb(changes),
            }
        }
    }
}
