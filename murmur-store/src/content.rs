//! The unstamped snapshot of a store.
//!
//! `Content` is the only representation allowed to cross a persister
//! boundary: bare scalars keyed by table/row/cell, serialized as the
//! two-element `[tables, values]` array the durable media exchange.

use murmur_types::Cell;
use serde::de::{Deserializer, Error as _};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row: cell name to bare scalar.
pub type Row = BTreeMap<String, Cell>;

/// One table: row id to row.
pub type Table = BTreeMap<String, Row>;

/// Unstamped snapshot of all tables and values in a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    /// Table name → row id → cells.
    pub tables: BTreeMap<String, Table>,
    /// Global value name → scalar.
    pub values: BTreeMap<String, Cell>,
}

impl Content {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the snapshot holds no rows and no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(BTreeMap::is_empty) && self.values.is_empty()
    }

    /// Total number of rows across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }
}

// Wire form is the two-element `[tables, values]` array.
impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.tables)?;
        tup.serialize_element(&self.values)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tables, values): (
            Option<BTreeMap<String, Table>>,
            Option<BTreeMap<String, Cell>>,
        ) = Deserialize::deserialize(deserializer)
            .map_err(|e| D::Error::custom(format!("expected [tables, values] array: {e}")))?;
        Ok(Self {
            tables: tables.unwrap_or_default(),
            values: values.unwrap_or_default(),
        })
    }
}
