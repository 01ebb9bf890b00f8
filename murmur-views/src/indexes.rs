//! Indexes: derived groupings of row ids by a computed key.
//!
//! Rows whose key is missing or invalid land in the empty-string bucket, so
//! every live row of an indexed table is always discoverable through the
//! index — exactly one bucket holds it at any time.

use murmur_store::{ChangeSet, MergeableStore, Row};
use murmur_types::Cell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How the bucket key is derived from a row.
#[derive(Clone)]
pub enum IndexKey {
    /// Use one cell's value, stringified. Missing cell → `""` bucket.
    Cell(String),
    /// Compute the key from the whole row.
    Derived(Arc<dyn Fn(&Row) -> String + Send + Sync>),
}

/// Ordering of rows inside one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparator {
    /// Compare sort-cell values as strings.
    #[default]
    Lexical,
    /// Compare sort-cell values numerically (for timestamp-like cells).
    Numeric,
}

/// Declarative definition of one index.
#[derive(Clone)]
pub struct IndexDef {
    table: String,
    key: IndexKey,
    sort_cell: Option<String>,
    comparator: Comparator,
}

impl IndexDef {
    /// Index rows of `table` by the value of `cell`.
    #[must_use]
    pub fn by_cell(table: impl Into<String>, cell: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: IndexKey::Cell(cell.into()),
            sort_cell: None,
            comparator: Comparator::Lexical,
        }
    }

    /// Index rows of `table` by a derived key.
    #[must_use]
    pub fn derived(
        table: impl Into<String>,
        key: impl Fn(&Row) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            table: table.into(),
            key: IndexKey::Derived(Arc::new(key)),
            sort_cell: None,
            comparator: Comparator::Lexical,
        }
    }

    /// Orders rows within each bucket by a cell.
    #[must_use]
    pub fn sorted_by(mut self, cell: impl Into<String>, comparator: Comparator) -> Self {
        self.sort_cell = Some(cell.into());
        self.comparator = comparator;
        self
    }

    fn bucket_for(&self, row: &Row) -> String {
        match &self.key {
            IndexKey::Cell(cell) => row.get(cell).map(Cell::to_string).unwrap_or_default(),
            IndexKey::Derived(f) => f(row),
        }
    }
}

/// The index engine: named definitions plus their current buckets.
#[derive(Default)]
pub struct Indexes {
    defs: BTreeMap<String, IndexDef>,
    // index → bucket key → ordered row ids
    buckets: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    // index → row id → bucket key currently holding it
    row_bucket: BTreeMap<String, BTreeMap<String, String>>,
}

impl Indexes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an index definition. Takes effect at the next
    /// `rebuild`/`apply`.
    pub fn define(&mut self, name: impl Into<String>, def: IndexDef) -> &mut Self {
        self.defs.insert(name.into(), def);
        self
    }

    /// Row ids in one bucket, in sorted order. Empty for unknown
    /// index/bucket.
    #[must_use]
    pub fn slice_row_ids(&self, index: &str, key: &str) -> &[String] {
        self.buckets
            .get(index)
            .and_then(|buckets| buckets.get(key))
            .map_or(&[], Vec::as_slice)
    }

    /// All non-empty bucket keys of one index.
    #[must_use]
    pub fn slice_ids(&self, index: &str) -> Vec<&str> {
        self.buckets
            .get(index)
            .map(|buckets| buckets.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Recomputes every index from the store.
    pub fn rebuild(&mut self, store: &MergeableStore) {
        self.buckets.clear();
        self.row_bucket.clear();
        let names: Vec<String> = self.defs.keys().cloned().collect();
        for name in names {
            let def = self.defs[&name].clone();
            for (row_id, row) in store.get_table(&def.table) {
                self.place(&name, &def, store, &row_id, Some(&row));
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
                if *table != def.table {
                    continue;
                }
                let row = store.get_row(&def.table, row_id);
                self.place(&name, &def, store, row_id, row.as_ref());
            }
        }
    }

    fn place(
        &mut self,
        name: &str,
        def: &IndexDef,
        store: &MergeableStore,
        row_id: &str,
        row: Option<&Row>,
    ) {
        // Remove from the bucket currently holding the row, if any.
        if let Some(old_bucket) = self
            .row_bucket
            .entry(name.to_string())
            .or_default()
            .remove(row_id)
        {
            if let Some(buckets) = self.buckets.get_mut(name) {
                if let Some(ids) = buckets.get_mut(&old_bucket) {
                    ids.retain(|id| id != row_id);
                    if ids.is_empty() {
                        buckets.remove(&old_bucket);
                    }
                }
            }
        }

        let Some(row) = row else {
            return; // row deleted
        };

        let bucket = def.bucket_for(row);
        let ids = self
            .buckets
            .entry(name.to_string())
            .or_default()
            .entry(bucket.clone())
            .or_default();
        ids.push(row_id.to_string());
        sort_bucket(ids, def, store);
        self.row_bucket
            .entry(name.to_string())
            .or_default()
            .insert(row_id.to_string(), bucket);
    }
}

fn sort_bucket(ids: &mut [String], def: &IndexDef, store: &MergeableStore) {
    let Some(sort_cell) = &def.sort_cell else {
        ids.sort();
        return;
    };
    let comparator = def.comparator;
    let table = def.table.clone();
    let sort_key = |id: &String| store.get_cell(&table, id, sort_cell);
    ids.sort_by(|a, b| {
        let ka = sort_key(a);
        let kb = sort_key(b);
        compare_cells(ka.as_ref(), kb.as_ref(), comparator).then_with(|| a.cmp(b))
    });
}

fn compare_cells(a: Option<&Cell>, b: Option<&Cell>, comparator: Comparator) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match comparator {
            Comparator::Numeric => {
                let na = a.as_num().unwrap_or(f64::NAN);
                let nb = b.as_num().unwrap_or(f64::NAN);
                na.partial_cmp(&nb).unwrap_or(Ordering::Equal)
            }
            Comparator::Lexical => a.to_string().cmp(&b.to_string()),
        },
    }
}
