//! Relationships: derived single-valued foreign-key joins between tables.

use murmur_store::{ChangeSet, MergeableStore};
use std::collections::BTreeMap;

/// Declarative definition of one relationship: rows of `local_table` point
/// at rows of `remote_table` through the `fk_cell` string cell. Local and
/// remote table may be the same (self-referential).
#[derive(Debug, Clone)]
pub struct RelationshipDef {
    pub local_table: String,
    pub remote_table: String,
    pub fk_cell: String,
}

impl RelationshipDef {
    #[must_use]
    pub fn new(
        local_table: impl Into<String>,
        remote_table: impl Into<String>,
        fk_cell: impl Into<String>,
    ) -> Self {
        Self {
            local_table: local_table.into(),
            remote_table: remote_table.into(),
            fk_cell: fk_cell.into(),
        }
    }
}

/// The relationship engine: forward (local → remote) and reverse
/// (remote → locals) maps per definition.
#[derive(Default)]
pub struct Relationships {
    defs: BTreeMap<String, RelationshipDef>,
    forward: BTreeMap<String, BTreeMap<String, String>>,
    backward: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Relationships {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a relationship definition.
    pub fn define(&mut self, name: impl Into<String>, def: RelationshipDef) -> &mut Self {
        self.defs.insert(name.into(), def);
        self
    }

    /// The remote row a local row points at, if its foreign key is set.
    #[must_use]
    pub fn remote_row_id(&self, relationship: &str, local_row: &str) -> Option<&str> {
        self.forward
            .get(relationship)?
            .get(local_row)
            .map(String::as_str)
    }

    /// All local rows pointing at one remote row, in sorted order.
    #[must_use]
    pub fn local_row_ids(&self, relationship: &str, remote_row: &str) -> &[String] {
        self.backward
            .get(relationship)
            .and_then(|map| map.get(remote_row))
            .map_or(&[], Vec::as_slice)
    }

    /// Recomputes every relationship from the store.
    pub fn rebuild(&mut self, store: &MergeableStore) {
        self.forward.clear();
        self.backward.clear();
        let names: Vec<String> = self.defs.keys().cloned().collect();
        for name in names {
            let def = self.defs[&name].clone();
            for row_id in store.row_ids(&def.local_table) {
                self.link(&name, &def, store, &row_id);
            }
        }
    }

    /// Applies one committed change set incrementally.
    pub fn apply(&mut self, store: &MergeableStore, changes: &ChangeSet) {
        let touched = changes.touched_rows();
        let names: Vec<String> = self.defs.keys().cloned().collect();
        for name in names {
            let def = self.defs[&name].clone();
            for (table, row_id) in &touched {
                if *table == def.local_table {
                    self.link(&name, &def, store, row_id);
                }
            }
        }
    }

    fn link(&mut self, name: &str, def: &RelationshipDef, store: &MergeableStore, local: &str) {
        // Drop any existing link for this local row.
        if let Some(old_remote) = self
            .forward
            .entry(name.to_string())
            .or_default()
            .remove(local)
        {
            if let Some(map) = self.backward.get_mut(name) {
                if let Some(locals) = map.get_mut(&old_remote) {
                    locals.retain(|id| id != local);
                    if locals.is_empty() {
                        map.remove(&old_remote);
                    }
                }
            }
        }

        let remote = store
            .get_cell(&def.local_table, local, &def.fk_cell)
            .and_then(|cell| cell.as_str().map(str::to_string));
        let Some(remote) = remote else {
            return;
        };

        self.forward
            .entry(name.to_string())
            .or_default()
            .insert(local.to_string(), remote.clone());
        let locals = self
            .backward
            .entry(name.to_string())
            .or_default()
            .entry(remote)
            .or_default();
        locals.push(local.to_string());
        locals.sort();
    }
}
