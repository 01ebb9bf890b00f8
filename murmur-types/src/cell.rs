//! The scalar value type held in table cells and global values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a table column or global value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    /// UTF-8 string.
    Str,
    /// Double-precision number.
    Num,
    /// Boolean flag.
    Bool,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Str => write!(f, "string"),
            CellKind::Num => write!(f, "number"),
            CellKind::Bool => write!(f, "boolean"),
        }
    }
}

/// A scalar cell value: string, number, or boolean.
///
/// Serialized untagged, so the durable and wire form of a cell is always the
/// bare JSON scalar. Merge metadata lives in the store's `Stamped` wrapper
/// and never in the cell itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Boolean flag.
    Bool(bool),
    /// Double-precision number.
    Num(f64),
    /// UTF-8 string.
    Str(String),
}

impl Cell {
    /// Returns the kind of this cell.
    #[must_use]
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::Str(_) => CellKind::Str,
            Cell::Num(_) => CellKind::Num,
            Cell::Bool(_) => CellKind::Bool,
        }
    }

    /// Returns the string content, if this is a string cell.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric content, if this is a number cell.
    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Cell::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a boolean cell.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Str(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Str(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Num(n)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Num(n as f64)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Str(s) => write!(f, "{s}"),
            Cell::Num(n) => write!(f, "{n}"),
            Cell::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_scalar() {
        assert_eq!(serde_json::to_string(&Cell::from("hi")).unwrap(), "\"hi\"");
        assert_eq!(serde_json::to_string(&Cell::from(3.5)).unwrap(), "3.5");
        assert_eq!(serde_json::to_string(&Cell::from(true)).unwrap(), "true");
    }

    #[test]
    fn deserializes_from_bare_scalar() {
        let cell: Cell = serde_json::from_str("\"x\"").unwrap();
        assert_eq!(cell, Cell::from("x"));
        let cell: Cell = serde_json::from_str("42").unwrap();
        assert_eq!(cell.as_num(), Some(42.0));
        let cell: Cell = serde_json::from_str("false").unwrap();
        assert_eq!(cell.as_bool(), Some(false));
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Cell::from("s").kind(), CellKind::Str);
        assert_eq!(Cell::from(1.0).kind(), CellKind::Num);
        assert_eq!(Cell::from(false).kind(), CellKind::Bool);
    }
}
