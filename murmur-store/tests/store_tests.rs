use murmur_store::{MergeableStore, Schema, TableSchema, ValueSchema};
use murmur_types::{Cell, CellKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn schema() -> Schema {
    Schema::new()
        .table(
            "sessions",
            TableSchema::new()
                .column("title", CellKind::Str)
                .column("folder_id", CellKind::Str)
                .column("created_at", CellKind::Str)
                .column("pinned", CellKind::Bool),
        )
        .table(
            "transcripts",
            TableSchema::new()
                .column("session_id", CellKind::Str)
                .column("text", CellKind::Str),
        )
        .value("user_id", ValueSchema::new(CellKind::Str))
        .value(
            "telemetry_enabled",
            ValueSchema::with_default(CellKind::Bool, true),
        )
}

fn row(cells: &[(&str, Cell)]) -> BTreeMap<String, Cell> {
    cells
        .iter()
        .map(|(name, cell)| (name.to_string(), cell.clone()))
        .collect()
}

#[test]
fn set_and_get_cell() {
    let mut store = MergeableStore::new(schema());
    assert!(store.set_cell("sessions", "s1", "title", "standup"));
    assert_eq!(
        store.get_cell("sessions", "s1", "title"),
        Some(Cell::from("standup"))
    );
}

#[test]
fn schema_violation_is_a_no_op_not_an_error() {
    let mut store = MergeableStore::new(schema());
    assert!(!store.set_cell("sessions", "s1", "title", 42.0));
    assert!(!store.set_cell("sessions", "s1", "unknown_column", "x"));
    assert!(!store.set_cell("unknown_table", "s1", "title", "x"));
    assert!(!store.set_value("user_id", false));
    assert!(store.get_row("sessions", "s1").is_none());

    // The store stays fully usable after rejected writes.
    assert!(store.set_cell("sessions", "s1", "title", "ok"));
    assert!(store.has_row("sessions", "s1"));
}

#[test]
fn set_row_replaces_absent_cells() {
    let mut store = MergeableStore::new(schema());
    store.set_row(
        "sessions",
        "s1",
        row(&[
            ("title", Cell::from("a")),
            ("folder_id", Cell::from("inbox")),
        ]),
    );
    store.set_row("sessions", "s1", row(&[("title", Cell::from("b"))]));

    let current = store.get_row("sessions", "s1").unwrap();
    assert_eq!(current.get("title"), Some(&Cell::from("b")));
    assert!(!current.contains_key("folder_id"));
}

#[test]
fn set_partial_row_keeps_other_cells() {
    let mut store = MergeableStore::new(schema());
    store.set_row(
        "sessions",
        "s1",
        row(&[
            ("title", Cell::from("a")),
            ("folder_id", Cell::from("inbox")),
        ]),
    );
    store.set_partial_row("sessions", "s1", row(&[("title", Cell::from("b"))]));

    let current = store.get_row("sessions", "s1").unwrap();
    assert_eq!(current.get("title"), Some(&Cell::from("b")));
    assert_eq!(current.get("folder_id"), Some(&Cell::from("inbox")));
}

#[test]
fn del_row_removes_the_row() {
    let mut store = MergeableStore::new(schema());
    store.set_cell("sessions", "s1", "title", "a");
    store.del_row("sessions", "s1");
    assert!(!store.has_row("sessions", "s1"));
    assert!(store.row_ids("sessions").is_empty());
}

#[test]
fn value_default_is_materialized() {
    let store = MergeableStore::new(schema());
    assert_eq!(store.get_value("telemetry_enabled"), Some(Cell::from(true)));
    assert_eq!(store.get_value("user_id"), None);
}

#[test]
fn del_value() {
    let mut store = MergeableStore::new(schema());
    store.set_value("user_id", "u1");
    store.del_value("user_id");
    assert_eq!(store.get_value("user_id"), None);
    assert!(!store.value_ids().contains(&"user_id".to_string()));
}

#[test]
fn listeners_fire_once_per_transaction() {
    let mut store = MergeableStore::new(schema());
    let row_events = Arc::new(AtomicUsize::new(0));
    let commits = Arc::new(AtomicUsize::new(0));

    let row_events_cb = Arc::clone(&row_events);
    store.add_row_listener(Some("sessions"), move |_table, _row| {
        row_events_cb.fetch_add(1, Ordering::SeqCst);
    });
    let commits_cb = Arc::clone(&commits);
    store.add_commit_listener(move |_changes| {
        commits_cb.fetch_add(1, Ordering::SeqCst);
    });

    store.transaction(|s| {
        s.set_cell("sessions", "s1", "title", "a");
        s.set_cell("sessions", "s1", "folder_id", "inbox");
        s.set_cell("sessions", "s2", "title", "b");
    });

    // One commit; two touched rows; not one event per cell.
    assert_eq!(commits.load(Ordering::SeqCst), 1);
    assert_eq!(row_events.load(Ordering::SeqCst), 2);
}

#[test]
fn cell_listener_filters_by_coordinates() {
    let mut store = MergeableStore::new(schema());
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_cb = Arc::clone(&hits);
    store.add_cell_listener(Some("sessions"), Some("s1"), Some("title"), move |_| {
        hits_cb.fetch_add(1, Ordering::SeqCst);
    });

    store.set_cell("sessions", "s1", "title", "a");
    store.set_cell("sessions", "s1", "folder_id", "x");
    store.set_cell("sessions", "s2", "title", "b");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn removed_listener_stops_firing() {
    let mut store = MergeableStore::new(schema());
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_cb = Arc::clone(&hits);
    let id = store.add_value_listener(None, move |_| {
        hits_cb.fetch_add(1, Ordering::SeqCst);
    });

    store.set_value("user_id", "u1");
    store.del_listener(id);
    store.set_value("user_id", "u2");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn nested_transactions_commit_once() {
    let mut store = MergeableStore::new(schema());
    let commits = Arc::new(AtomicUsize::new(0));
    let commits_cb = Arc::clone(&commits);
    store.add_commit_listener(move |_| {
        commits_cb.fetch_add(1, Ordering::SeqCst);
    });

    store.transaction(|s| {
        s.set_cell("sessions", "s1", "title", "a");
        s.transaction(|s| {
            s.set_cell("sessions", "s2", "title", "b");
        });
    });

    assert_eq!(commits.load(Ordering::SeqCst), 1);
}

#[test]
fn content_holds_bare_scalars_only() {
    let mut store = MergeableStore::new(schema());
    store.set_cell("sessions", "s1", "title", "standup");
    store.set_value("user_id", "u1");

    let json = serde_json::to_value(store.content()).unwrap();
    let cell = &json[0]["sessions"]["s1"]["title"];
    assert!(cell.is_string(), "cell must persist as a bare scalar");
    assert!(json[1]["user_id"].is_string());
}

#[test]
fn content_roundtrip_through_set_content() {
    let mut source = MergeableStore::new(schema());
    source.set_cell("sessions", "s1", "title", "a");
    source.set_cell("transcripts", "t1", "session_id", "s1");
    source.set_value("user_id", "u1");

    let mut target = MergeableStore::new(schema());
    target.set_cell("sessions", "stale", "title", "gone");
    target.set_content(source.content());

    assert_eq!(target.content(), source.content());
    assert!(!target.has_row("sessions", "stale"));
}

#[test]
fn merge_folds_both_stores_rows() {
    let mut a = MergeableStore::new(schema());
    let mut b = MergeableStore::new(schema());
    a.set_cell("sessions", "s1", "title", "from a");
    b.set_cell("sessions", "s2", "title", "from b");

    a.merge(&b);

    assert!(a.has_row("sessions", "s1"));
    assert!(a.has_row("sessions", "s2"));
}

#[test]
fn merge_last_writer_wins_on_conflict() {
    let mut a = MergeableStore::new(schema());
    let mut b = MergeableStore::new(schema());
    a.set_cell("sessions", "s1", "title", "first");
    std::thread::sleep(std::time::Duration::from_millis(2));
    b.set_cell("sessions", "s1", "title", "second");

    a.merge(&b);
    assert_eq!(
        a.get_cell("sessions", "s1", "title"),
        Some(Cell::from("second"))
    );
}

#[test]
fn merge_propagates_deletes() {
    let mut a = MergeableStore::new(schema());
    a.set_cell("sessions", "s1", "title", "x");
    let mut b = MergeableStore::new(schema());
    b.apply_delta(&a.full_delta());
    assert!(b.has_row("sessions", "s1"));

    std::thread::sleep(std::time::Duration::from_millis(2));
    a.del_row("sessions", "s1");
    b.apply_delta(&a.full_delta());
    assert!(!b.has_row("sessions", "s1"));
}

#[test]
fn apply_delta_is_idempotent() {
    let mut a = MergeableStore::new(schema());
    a.set_cell("sessions", "s1", "title", "x");
    let delta = a.full_delta();

    let mut b = MergeableStore::new(schema());
    b.apply_delta(&delta);
    let once = b.content();
    b.apply_delta(&delta);
    assert_eq!(b.content(), once);
}

#[test]
fn writes_after_merge_win_over_merged_state() {
    let mut a = MergeableStore::new(schema());
    let mut b = MergeableStore::new(schema());
    b.set_cell("sessions", "s1", "title", "remote");
    a.apply_delta(&b.full_delta());

    // The receive step advanced a's clock past the incoming stamps.
    a.set_cell("sessions", "s1", "title", "local update");
    b.apply_delta(&a.full_delta());
    assert_eq!(
        b.get_cell("sessions", "s1", "title"),
        Some(Cell::from("local update"))
    );
}
