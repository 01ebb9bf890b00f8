//! Queries: derived virtual tables over select/join/where/group.
//!
//! Queries recompute whenever a relevant table (root or joined) changes.
//! A query over an undeclared table is inert and produces an empty result.

use crate::metrics::Aggregate;
use murmur_store::{ChangeSet, MergeableStore, Row, Table};
use murmur_types::Cell;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The assembled row a `where` predicate sees: the root row plus every
/// joined row keyed by its alias.
#[derive(Debug, Default)]
pub struct JoinedRow {
    sources: BTreeMap<String, Row>,
}

impl JoinedRow {
    /// A cell of the root row.
    #[must_use]
    pub fn root_cell(&self, cell: &str) -> Option<&Cell> {
        self.cell("", cell)
    }

    /// A cell of the root (`""`) or a joined alias.
    #[must_use]
    pub fn cell(&self, source: &str, cell: &str) -> Option<&Cell> {
        self.sources.get(source)?.get(cell)
    }
}

#[derive(Clone)]
struct Select {
    source: String, // "" = root
    cell: String,
    alias: String,
}

#[derive(Clone)]
enum JoinOn {
    /// Foreign key cell on the root row.
    RootCell(String),
    /// Foreign key cell on a previously joined alias.
    AliasCell { alias: String, cell: String },
    /// Resolve the remote row id by scanning (e.g. reverse joins).
    Scan(Arc<dyn Fn(&MergeableStore, &str) -> Option<String> + Send + Sync>),
}

#[derive(Clone)]
struct Join {
    alias: String,
    remote_table: String,
    on: JoinOn,
}

type WherePred = Arc<dyn Fn(&JoinedRow) -> bool + Send + Sync>;

#[derive(Clone)]
struct Group {
    alias_of_cell: String, // the select alias being aggregated
    aggregate: Aggregate,
    alias: String,
}

/// Declarative definition of one query.
#[derive(Clone)]
pub struct QueryDef {
    table: String,
    selects: Vec<Select>,
    joins: Vec<Join>,
    wheres: Vec<WherePred>,
    groups: Vec<Group>,
}

impl QueryDef {
    /// A query rooted at `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            selects: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Selects a root-table cell under its own name.
    #[must_use]
    pub fn select(self, cell: &str) -> Self {
        self.select_from("", cell, cell)
    }

    /// Selects a cell from the root (`""`) or a joined alias, under `alias`.
    #[must_use]
    pub fn select_from(mut self, source: &str, cell: &str, alias: &str) -> Self {
        self.selects.push(Select {
            source: source.to_string(),
            cell: cell.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    /// Joins `remote_table` through a foreign-key cell on the root row.
    #[must_use]
    pub fn join(mut self, remote_table: &str, fk_cell: &str, alias: &str) -> Self {
        self.joins.push(Join {
            alias: alias.to_string(),
            remote_table: remote_table.to_string(),
            on: JoinOn::RootCell(fk_cell.to_string()),
        });
        self
    }

    /// Joins `remote_table` through a foreign-key cell on an earlier alias.
    #[must_use]
    pub fn join_via(mut self, remote_table: &str, via: &str, fk_cell: &str, alias: &str) -> Self {
        self.joins.push(Join {
            alias: alias.to_string(),
            remote_table: remote_table.to_string(),
            on: JoinOn::AliasCell {
                alias: via.to_string(),
                cell: fk_cell.to_string(),
            },
        });
        self
    }

    /// Joins `remote_table` by a scan function mapping a root row id to the
    /// remote row id. Needed when the foreign key lives on the remote side.
    #[must_use]
    pub fn join_scan(
        mut self,
        remote_table: &str,
        alias: &str,
        resolve: impl Fn(&MergeableStore, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.joins.push(Join {
            alias: alias.to_string(),
            remote_table: remote_table.to_string(),
            on: JoinOn::Scan(Arc::new(resolve)),
        });
        self
    }

    /// Filters result rows by a predicate over the joined row.
    #[must_use]
    pub fn where_row(mut self, pred: impl Fn(&JoinedRow) -> bool + Send + Sync + 'static) -> Self {
        self.wheres.push(Arc::new(pred));
        self
    }

    /// Aggregates one selected cell; remaining selected cells become the
    /// group-by key.
    #[must_use]
    pub fn group(mut self, select_alias: &str, aggregate: Aggregate, alias: &str) -> Self {
        self.groups.push(Group {
            alias_of_cell: select_alias.to_string(),
            aggregate,
            alias: alias.to_string(),
        });
        self
    }

    fn relevant_tables(&self) -> Vec<&str> {
        let mut tables = vec![self.table.as_str()];
        for join in &self.joins {
            tables.push(join.remote_table.as_str());
        }
        tables
    }
}

/// The query engine: named definitions plus their current result tables.
#[derive(Default)]
pub struct Queries {
    defs: BTreeMap<String, QueryDef>,
    results: BTreeMap<String, Table>,
}

impl Queries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a query definition.
    pub fn define(&mut self, name: impl Into<String>, def: QueryDef) -> &mut Self {
        self.defs.insert(name.into(), def);
        self
    }

    /// The full result table of one query.
    #[must_use]
    pub fn result_table(&self, query: &str) -> Table {
        self.results.get(query).cloned().unwrap_or_default()
    }

    /// Result row ids of one query, sorted.
    #[must_use]
    pub fn result_row_ids(&self, query: &str) -> Vec<String> {
        self.results
            .get(query)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// One result row.
    #[must_use]
    pub fn result_row(&self, query: &str, row: &str) -> Option<Row> {
        self.results.get(query)?.get(row).cloned()
    }

    /// One result cell.
    #[must_use]
    pub fn result_cell(&self, query: &str, row: &str, cell: &str) -> Option<Cell> {
        self.results.get(query)?.get(row)?.get(cell).cloned()
    }

    /// Recomputes every query.
    pub fn rebuild(&mut self, store: &MergeableStore) {
        let names: Vec<String> = self.defs.keys().cloned().collect();
        for name in names {
            let result = compute(&self.defs[&name], store);
            self.results.insert(name, result);
        }
    }

    /// Recomputes the queries whose root or joined tables were touched.
    pub fn apply(&mut self, store: &MergeableStore, changes: &ChangeSet) {
        let touched = changes.touched_tables();
        let names: Vec<String> = self.defs.keys().cloned().collect();
        for name in names {
            let def = &self.defs[&name];
            if def
                .relevant_tables()
                .iter()
                .any(|table| touched.iter().any(|t| t == table))
            {
                let result = compute(def, store);
                self.results.insert(name, result);
            }
        }
    }
}

fn compute(def: &QueryDef, store: &MergeableStore) -> Table {
    if !store.schema().has_table(&def.table) {
        return Table::default();
    }

    let mut projected: Vec<(String, Row)> = Vec::new();
    for (row_id, root_row) in store.get_table(&def.table) {
        let mut joined = JoinedRow::default();
        joined.sources.insert(String::new(), root_row);

        for join in &def.joins {
            let remote_id = match &join.on {
                JoinOn::RootCell(cell) => joined
                    .root_cell(cell)
                    .and_then(|c| c.as_str().map(str::to_string)),
                JoinOn::AliasCell { alias, cell } => joined
                    .cell(alias, cell)
                    .and_then(|c| c.as_str().map(str::to_string)),
                JoinOn::Scan(resolve) => resolve(store, &row_id),
            };
            if let Some(remote_id) = remote_id {
                if let Some(remote_row) = store.get_row(&join.remote_table, &remote_id) {
                    joined.sources.insert(join.alias.clone(), remote_row);
                }
            }
        }

        if !def.wheres.iter().all(|pred| pred(&joined)) {
            continue;
        }

        let mut result_row = Row::new();
        for select in &def.selects {
            if let Some(cell) = joined.cell(&select.source, &select.cell) {
                result_row.insert(select.alias.clone(), cell.clone());
            }
        }
        projected.push((row_id, result_row));
    }

    if def.groups.is_empty() {
        return projected.into_iter().collect();
    }
    group_rows(def, projected)
}

fn group_rows(def: &QueryDef, projected: Vec<(String, Row)>) -> Table {
    let aggregated: Vec<&str> = def
        .groups
        .iter()
        .map(|group| group.alias_of_cell.as_str())
        .collect();
    let key_aliases: Vec<&str> = def
        .selects
        .iter()
        .map(|select| select.alias.as_str())
        .filter(|alias| !aggregated.contains(alias))
        .collect();

    let mut partitions: BTreeMap<String, (Row, Vec<Row>)> = BTreeMap::new();
    for (_, row) in projected {
        let key = key_aliases
            .iter()
            .map(|alias| row.get(*alias).map(Cell::to_string).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        let entry = partitions.entry(key).or_insert_with(|| {
            let mut key_row = Row::new();
            for alias in &key_aliases {
                if let Some(cell) = row.get(*alias) {
                    key_row.insert((*alias).to_string(), cell.clone());
                }
            }
            (key_row, Vec::new())
        });
        entry.1.push(row);
    }

    let mut result = Table::default();
    for (key, (mut key_row, rows)) in partitions {
        for group in &def.groups {
            let cells: Vec<Cell> = rows
                .iter()
                .filter_map(|row| row.get(&group.alias_of_cell).cloned())
                .collect();
            if let Some(aggregate) = group.aggregate.over(&cells) {
                key_row.insert(group.alias.clone(), aggregate);
            }
        }
        result.insert(key, key_row);
    }
    result
}
