//! Static schema describing every table's columns and every global value.
//!
//! Pure data with validation helpers. The store consults the schema at the
//! mutation boundary and rejects non-conforming writes as logged no-ops.

use murmur_types::{Cell, CellKind};
use std::collections::BTreeMap;

/// Column declarations for one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    columns: BTreeMap<String, CellKind>,
}

impl TableSchema {
    /// Creates an empty table schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a column, consuming and returning the schema for chaining.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, kind: CellKind) -> Self {
        self.columns.insert(name.into(), kind);
        self
    }

    /// Returns the declared kind of a column, if any.
    #[must_use]
    pub fn column_kind(&self, name: &str) -> Option<CellKind> {
        self.columns.get(name).copied()
    }

    /// Iterates over declared columns.
    pub fn columns(&self) -> impl Iterator<Item = (&str, CellKind)> {
        self.columns.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}

/// Declaration of one global value: its kind and optional default.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSchema {
    kind: CellKind,
    default: Option<Cell>,
}

impl ValueSchema {
    /// Declares a value with no default.
    #[must_use]
    pub fn new(kind: CellKind) -> Self {
        Self {
            kind,
            default: None,
        }
    }

    /// Declares a value with a default materialized at store creation.
    #[must_use]
    pub fn with_default(kind: CellKind, default: impl Into<Cell>) -> Self {
        Self {
            kind,
            default: Some(default.into()),
        }
    }

    /// Returns the declared kind.
    #[must_use]
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Returns the default value, if declared.
    #[must_use]
    pub fn default_value(&self) -> Option<&Cell> {
        self.default.as_ref()
    }
}

/// Static description of every table and global value in one store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    tables: BTreeMap<String, TableSchema>,
    values: BTreeMap<String, ValueSchema>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a table.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>, table: TableSchema) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// Declares a global value.
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: ValueSchema) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Returns whether a table is declared.
    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Returns the declared kind of a table column, if any.
    #[must_use]
    pub fn column_kind(&self, table: &str, column: &str) -> Option<CellKind> {
        self.tables.get(table)?.column_kind(column)
    }

    /// Returns the declaration of a global value, if any.
    #[must_use]
    pub fn value_schema(&self, name: &str) -> Option<&ValueSchema> {
        self.values.get(name)
    }

    /// Iterates over declared table names.
    pub fn table_ids(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Iterates over declared global values.
    pub fn values(&self) -> impl Iterator<Item = (&str, &ValueSchema)> {
        self.values.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// Checks a cell write against the schema.
    ///
    /// Accepts only declared columns of declared tables, with a matching
    /// scalar kind.
    #[must_use]
    pub fn check_cell(&self, table: &str, column: &str, cell: &Cell) -> bool {
        self.column_kind(table, column) == Some(cell.kind())
    }

    /// Checks a global value write against the schema.
    #[must_use]
    pub fn check_value(&self, name: &str, cell: &Cell) -> bool {
        self.value_schema(name).map(ValueSchema::kind) == Some(cell.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .table(
                "sessions",
                TableSchema::new()
                    .column("title", CellKind::Str)
                    .column("pinned", CellKind::Bool),
            )
            .value("user_id", ValueSchema::new(CellKind::Str))
    }

    #[test]
    fn accepts_matching_kind() {
        let s = schema();
        assert!(s.check_cell("sessions", "title", &Cell::from("hello")));
        assert!(s.check_cell("sessions", "pinned", &Cell::from(true)));
        assert!(s.check_value("user_id", &Cell::from("u1")));
    }

    #[test]
    fn rejects_wrong_kind() {
        let s = schema();
        assert!(!s.check_cell("sessions", "title", &Cell::from(1.0)));
        assert!(!s.check_value("user_id", &Cell::from(false)));
    }

    #[test]
    fn rejects_undeclared_table_and_column() {
        let s = schema();
        assert!(!s.check_cell("nope", "title", &Cell::from("x")));
        assert!(!s.check_cell("sessions", "nope", &Cell::from("x")));
        assert!(!s.check_value("nope", &Cell::from("x")));
    }

    #[test]
    fn value_default_is_exposed() {
        let s = Schema::new().value(
            "telemetry_enabled",
            ValueSchema::with_default(CellKind::Bool, false),
        );
        let v = s.value_schema("telemetry_enabled").unwrap();
        assert_eq!(v.default_value(), Some(&Cell::Bool(false)));
    }
}
