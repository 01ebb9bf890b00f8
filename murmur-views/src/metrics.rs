//! Metrics: scalar aggregates over one table, and the shared aggregate
//! operations queries reuse for `group`.

use murmur_store::{ChangeSet, MergeableStore, Row};
use murmur_types::Cell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An aggregate operation over a collection of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
    Avg,
    Count,
}

impl Aggregate {
    /// Aggregates a set of cells; None when the input is empty.
    ///
    /// Min/Max order numerically when every cell is numeric, lexically
    /// otherwise (timestamp-like ISO strings order correctly either way).
    #[must_use]
    pub fn over(&self, cells: &[Cell]) -> Option<Cell> {
        if cells.is_empty() {
            return None;
        }
        match self {
            Aggregate::Count => Some(Cell::Num(cells.len() as f64)),
            Aggregate::Sum => Some(Cell::Num(numeric_sum(cells))),
            Aggregate::Avg => Some(Cell::Num(numeric_sum(cells) / cells.len() as f64)),
            Aggregate::Min => extremum(cells, Ordering::Less),
            Aggregate::Max => extremum(cells, Ordering::Greater),
        }
    }
}

fn numeric_sum(cells: &[Cell]) -> f64 {
    cells.iter().filter_map(Cell::as_num).sum()
}

fn extremum(cells: &[Cell], keep: Ordering) -> Option<Cell> {
    let all_numeric = cells.iter().all(|cell| cell.as_num().is_some());
    cells
        .iter()
        .cloned()
        .reduce(|best, candidate| {
            let ordering = if all_numeric {
                candidate
                    .as_num()
                    .partial_cmp(&best.as_num())
                    .unwrap_or(Ordering::Equal)
            } else {
                candidate.to_string().cmp(&best.to_string())
            };
            if ordering == keep { candidate } else { best }
        })
}

/// Where a metric's per-row number comes from.
#[derive(Clone)]
pub enum MetricValue {
    /// A numeric cell of the row.
    Cell(String),
    /// A value computed from the row (e.g. `|_| 1.0` for row counts).
    Derived(Arc<dyn Fn(&Row) -> f64 + Send + Sync>),
}

/// Declarative definition of one metric.
#[derive(Clone)]
pub struct MetricDef {
    table: String,
    aggregate: Aggregate,
    value: MetricValue,
}

impl MetricDef {
    /// Aggregates a numeric cell over all rows of `table`.
    #[must_use]
    pub fn of_cell(table: impl Into<String>, aggregate: Aggregate, cell: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            aggregate,
            value: MetricValue::Cell(cell.into()),
        }
    }

    /// Aggregates a derived per-row number over all rows of `table`.
    #[must_use]
    pub fn derived(
        table: impl Into<String>,
        aggregate: Aggregate,
        value: impl Fn(&Row) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            table: table.into(),
            aggregate,
            value: MetricValue::Derived(Arc::new(value)),
        }
    }
}

/// The metric engine: named definitions plus their current values.
#[derive(Default)]
pub struct Metrics {
    defs: BTreeMap<String, MetricDef>,
    current: BTreeMap<String, Option<f64>>,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a metric definition.
    pub fn define(&mut self, name: impl Into<String>, def: MetricDef) -> &mut Self {
        self.defs.insert(name.into(), def);
        self
    }

    /// The current value of one metric; None when the source table is empty
    /// or the metric is unknown.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.current.get(name).copied().flatten()
    }

    /// Recomputes every metric.
    pub fn rebuild(&mut self, store: &MergeableStore) {
        let names: Vec<String> = self.defs.keys().cloned().collect();
        for name in names {
            let value = compute(&self.defs[&name], store);
            self.current.insert(name, value);
        }
    }

    /// Recomputes metrics whose source table was touched.
    pub fn apply(&mut self, store: &MergeableStore, changes: &ChangeSet) {
        let touched = changes.touched_tables();
        let names: Vec<String> = self.defs.keys().cloned().collect();
        for name in names {
            if touched.iter().any(|t| *t == self.defs[&name].table) {
                let value = compute(&self.defs[&name], store);
                self.current.insert(name, value);
            }
        }
    }
}

fn compute(def: &MetricDef, store: &MergeableStore) -> Option<f64> {
    let mut numbers = Vec::new();
    store.for_each_row(&def.table, |_, row| {
        let number = match &def.value {
            MetricValue::Cell(cell) => row.get(cell).and_then(Cell::as_num),
            MetricValue::Derived(f) => Some(f(row)),
        };
        if let Some(number) = number {
            numbers.push(Cell::Num(number));
        }
    });
    def.aggregate.over(&numbers).and_then(|cell| cell.as_num())
}
