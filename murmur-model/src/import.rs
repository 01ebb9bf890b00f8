//! JSON import: merge an exported `[tables, values]` file into the store.
//!
//! Consumption is at-most-once: the source file is removed only after the
//! persist-completion future resolves, so a crash before durability leaves
//! the file in place for retry, and a crash after leaves nothing to
//! re-import. Malformed payloads are rejected with a descriptive error
//! before any merge is attempted; the store is guaranteed untouched on
//! every error path.

use crate::app::AppStore;
use murmur_store::{Content, Row, Table};
use murmur_types::Cell;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Why an import was rejected. The store is untouched in every case.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read import file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("import file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("import payload must be a two-element [tables, values] array, found {found}")]
    Shape { found: String },

    #[error("tables element must map table name to rows, found {found} at {at}")]
    BadTables { at: String, found: String },

    #[error("values element must map value name to scalar, found {found} at {at}")]
    BadValues { at: String, found: String },
}

/// What a successful import merged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows: usize,
    pub values: usize,
}

fn kind_of(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

fn scalar(value: &Value) -> Option<Cell> {
    serde_json::from_value(value.clone()).ok()
}

/// Validates the `[tables-or-null, values-or-null]` shape and builds the
/// content to merge. Pure; no store access.
fn parse_payload(payload: &Value) -> Result<Content, ImportError> {
    let Some(parts) = payload.as_array().filter(|parts| parts.len() == 2) else {
        return Err(ImportError::Shape {
            found: kind_of(payload),
        });
    };

    let mut content = Content::new();

    match &parts[0] {
        Value::Null => {}
        Value::Object(tables) => {
            for (table_name, rows) in tables {
                let Value::Object(rows) = rows else {
                    return Err(ImportError::BadTables {
                        at: table_name.clone(),
                        found: kind_of(rows),
                    });
                };
                let mut table = Table::default();
                for (row_id, cells) in rows {
                    let Value::Object(cells) = cells else {
                        return Err(ImportError::BadTables {
                            at: format!("{table_name}/{row_id}"),
                            found: kind_of(cells),
                        });
                    };
                    let mut row = Row::new();
                    for (cell_name, cell) in cells {
                        let Some(cell) = scalar(cell) else {
                            return Err(ImportError::BadTables {
                                at: format!("{table_name}/{row_id}/{cell_name}"),
                                found: kind_of(cell),
                            });
                        };
                        row.insert(cell_name.clone(), cell);
                    }
                    table.insert(row_id.clone(), row);
                }
                content.tables.insert(table_name.clone(), table);
            }
        }
        other => {
            return Err(ImportError::Shape {
                found: format!("tables element of type {}", kind_of(other)),
            });
        }
    }

    match &parts[1] {
        Value::Null => {}
        Value::Object(values) => {
            for (name, value) in values {
                let Some(cell) = scalar(value) else {
                    return Err(ImportError::BadValues {
                        at: name.clone(),
                        found: kind_of(value),
                    });
                };
                content.values.insert(name.clone(), cell);
            }
        }
        other => {
            return Err(ImportError::Shape {
                found: format!("values element of type {}", kind_of(other)),
            });
        }
    }

    Ok(content)
}

/// Imports one exported file into the store.
///
/// On success the merged counts are returned, `persist` has been awaited
/// exactly once (the caller passes its persister flush there), and the
/// source file has been removed after it resolved. Removal failure is a
/// warning only; the next import attempt merges idempotently.
pub async fn import_from_json<F>(
    app: &AppStore,
    path: &Path,
    persist: F,
) -> Result<ImportSummary, ImportError>
where
    F: Future<Output = ()>,
{
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let payload: Value = serde_json::from_str(&text)?;
    let content = parse_payload(&payload)?;
    let summary = ImportSummary {
        rows: content.row_count(),
        values: content.values.len(),
    };

    // One transaction of ordinary stamped writes: imported cells merge
    // over existing ones, everything else (including value defaults) is
    // left alone.
    app.transaction(|store| {
        for (table, rows) in &content.tables {
            for (row_id, row) in rows {
                store.set_partial_row(table, row_id, row.clone());
            }
        }
        for (name, value) in &content.values {
            store.set_value(name, value.clone());
        }
    })
    .await;

    persist.await;

    if let Err(error) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), %error, "import source not removed; it may be re-imported");
    }
    info!(rows = summary.rows, values = summary.values, "import complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_wrong_arity() {
        let err = parse_payload(&json!([{}])).unwrap_err();
        assert!(matches!(err, ImportError::Shape { .. }));
        let err = parse_payload(&json!([{}, {}, {}])).unwrap_err();
        assert!(matches!(err, ImportError::Shape { .. }));
        let err = parse_payload(&json!({"tables": {}})).unwrap_err();
        assert!(matches!(err, ImportError::Shape { .. }));
    }

    #[test]
    fn rejects_wrong_element_types() {
        assert!(matches!(
            parse_payload(&json!(["tables", null])).unwrap_err(),
            ImportError::Shape { .. }
        ));
        assert!(matches!(
            parse_payload(&json!([{"sessions": []}, null])).unwrap_err(),
            ImportError::BadTables { .. }
        ));
        assert!(matches!(
            parse_payload(&json!([{"sessions": {"s1": {"title": {}}}}, null])).unwrap_err(),
            ImportError::BadTables { .. }
        ));
        assert!(matches!(
            parse_payload(&json!([null, {"user_id": [1]}])).unwrap_err(),
            ImportError::BadValues { .. }
        ));
    }

    #[test]
    fn accepts_null_elements() {
        let content = parse_payload(&json!([null, null])).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn counts_rows_and_values() {
        let content = parse_payload(&json!([
            {"sessions": {"s1": {"title": "a"}, "s2": {"title": "b"}}},
            {"user_id": "u1"}
        ]))
        .unwrap();
        assert_eq!(content.row_count(), 2);
        assert_eq!(content.values.len(), 1);
    }
}
