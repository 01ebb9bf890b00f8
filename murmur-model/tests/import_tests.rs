//! At-most-once import semantics, driven through real temp files.

use murmur_model::{import_from_json, tables, AppStore, ImportError};
use murmur_types::Cell;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn write_import(dir: &tempfile::TempDir, name: &str, payload: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, payload).unwrap();
    path
}

#[tokio::test]
async fn well_formed_import_merges_persists_then_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_import(
        &dir,
        "export.json",
        r#"[
            {"sessions": {"s1": {"title": "imported", "pinned": true}},
             "tags": {"g1": {"name": "work"}}},
            {"user_id": "u1"}
        ]"#,
    );

    let app = AppStore::new();
    let persisted = Arc::new(AtomicUsize::new(0));
    let persist = {
        let persisted = Arc::clone(&persisted);
        let path = path.clone();
        async move {
            // The source must still exist while durability is pending.
            assert!(path.exists());
            persisted.fetch_add(1, Ordering::SeqCst);
        }
    };

    let summary = import_from_json(&app, &path, persist).await.unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.values, 1);
    assert_eq!(persisted.load(Ordering::SeqCst), 1);
    assert!(!path.exists(), "source removed only after persist resolved");

    app.read(|store| {
        assert_eq!(
            store.get_cell(tables::SESSIONS, "s1", "title"),
            Some(Cell::from("imported"))
        );
        assert_eq!(store.get_cell(tables::TAGS, "g1", "name"), Some(Cell::from("work")));
        assert_eq!(store.get_value("user_id"), Some(Cell::from("u1")));
    })
    .await;
}

#[tokio::test]
async fn malformed_import_touches_neither_store_nor_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_import(&dir, "bad.json", r#"[{"sessions": "not-rows"}, null]"#);

    let app = AppStore::new();
    let persisted = Arc::new(AtomicUsize::new(0));
    let persist = {
        let persisted = Arc::clone(&persisted);
        async move {
            persisted.fetch_add(1, Ordering::SeqCst);
        }
    };

    let err = import_from_json(&app, &path, persist).await.unwrap_err();
    assert!(matches!(err, ImportError::BadTables { .. }));
    assert_eq!(persisted.load(Ordering::SeqCst), 0);
    assert!(path.exists(), "rejected files stay in place");
    app.read(|store| assert!(store.row_ids(tables::SESSIONS).is_empty())).await;
}

#[tokio::test]
async fn wrong_arity_is_rejected_with_a_shape_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_import(&dir, "arity.json", r#"[{}, {}, {}]"#);

    let app = AppStore::new();
    let err = import_from_json(&app, &path, async {}).await.unwrap_err();
    assert!(matches!(err, ImportError::Shape { .. }));
}

#[tokio::test]
async fn unreadable_file_means_no_merge_and_no_delete() {
    let app = AppStore::new();
    let missing = PathBuf::from("/nonexistent/export.json");

    let err = import_from_json(&app, &missing, async {
        panic!("persist must not run when the read fails");
    })
    .await
    .unwrap_err();
    assert!(matches!(err, ImportError::Read { .. }));
    app.read(|store| assert!(store.row_ids(tables::SESSIONS).is_empty())).await;
}

#[tokio::test]
async fn import_into_populated_store_merges_rather_than_replaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_import(
        &dir,
        "more.json",
        r#"[{"sessions": {"s2": {"title": "new"}}}, null]"#,
    );

    let app = AppStore::new();
    app.transaction(|store| {
        store.set_cell(tables::SESSIONS, "s1", "title", "existing");
    })
    .await;

    import_from_json(&app, &path, async {}).await.unwrap();
    app.read(|store| {
        assert_eq!(store.row_ids(tables::SESSIONS), vec!["s1", "s2"]);
    })
    .await;
}
