//! Integration tests for the persister framework, driven through in-memory
//! media plus a tempdir-backed document sink.

use async_trait::async_trait;
use murmur_persist::{
    DocumentMapping, DocumentOp, DocumentPersister, DocumentSink, FsDocumentSink, PersistResult,
    Persister, SettingsMedium, SettingsPersister, SqlExecutor, SqlPersister, SqlPersisterConfig,
    SharedStore,
};
use murmur_store::{MergeableStore, Schema, TableSchema, ValueSchema};
use murmur_types::{Cell, CellKind};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

fn schema() -> Schema {
    Schema::new()
        .table(
            "sessions",
            TableSchema::new()
                .column("title", CellKind::Str)
                .column("notes", CellKind::Str)
                .column("pinned", CellKind::Bool)
                .column("duration_ms", CellKind::Num),
        )
        .value("user_id", ValueSchema::new(CellKind::Str))
        .value("onboarding_done", ValueSchema::new(CellKind::Bool))
}

fn shared_store() -> SharedStore {
    Arc::new(RwLock::new(MergeableStore::new(schema())))
}

/// An embedded-SQL stand-in: one blob table keyed by id. Understands
/// exactly the statements the persister issues.
#[derive(Default)]
struct MemoryExecutor {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryExecutor {
    fn blob(&self, id: &str) -> Option<String> {
        self.blobs.lock().unwrap().get(id).cloned()
    }

    fn seed(&self, id: &str, content: &str) {
        self.blobs
            .lock()
            .unwrap()
            .insert(id.to_string(), content.to_string());
    }
}

#[async_trait]
impl SqlExecutor for MemoryExecutor {
    async fn execute(&self, sql: &str, args: Vec<Value>) -> Vec<serde_json::Map<String, Value>> {
        if sql.starts_with("SELECT") {
            let id = args[0].as_str().unwrap();
            return self
                .blobs
                .lock()
                .unwrap()
                .get(id)
                .map(|content| {
                    let mut row = serde_json::Map::new();
                    row.insert("content".to_string(), Value::from(content.clone()));
                    vec![row]
                })
                .unwrap_or_default();
        }
        if sql.starts_with("INSERT") {
            let id = args[0].as_str().unwrap().to_string();
            let content = args[1].as_str().unwrap().to_string();
            self.blobs.lock().unwrap().insert(id, content);
        }
        Vec::new()
    }
}

fn sql_persister(store: SharedStore, executor: Arc<MemoryExecutor>) -> SqlPersister {
    SqlPersister::new(store, executor, SqlPersisterConfig::default())
}

#[tokio::test]
async fn sql_save_then_load_roundtrips_content() {
    let executor = Arc::new(MemoryExecutor::default());
    let store = shared_store();
    store.write().await.set_cell("sessions", "s1", "title", "standup");
    store.write().await.set_value("user_id", "u1");

    let persister = sql_persister(Arc::clone(&store), Arc::clone(&executor));
    persister.save().await.unwrap();

    let other = shared_store();
    let loader = sql_persister(Arc::clone(&other), executor);
    loader.load().await.unwrap();

    let loaded = other.read().await.content();
    assert_eq!(loaded, store.read().await.content());
    assert_eq!(
        other.read().await.get_cell("sessions", "s1", "title"),
        Some(Cell::from("standup"))
    );
}

#[tokio::test]
async fn sql_load_without_snapshot_is_a_noop() {
    let store = shared_store();
    let persister = sql_persister(Arc::clone(&store), Arc::new(MemoryExecutor::default()));
    assert_eq!(persister.load_repairing().await.unwrap(), 0);
    assert!(store.read().await.content().is_empty());
}

#[tokio::test]
async fn sql_load_repairs_leaked_stamps_and_reports_count() {
    let executor = Arc::new(MemoryExecutor::default());
    let leaked = json!([
        {"sessions": {"s1": {
            "title": ["standup", "1724500000000:3"],
            "pinned": true
        }}},
        {"user_id": ["u1", {"wall_time": 1724500000000u64, "logical": 0}]}
    ]);
    executor.seed("main", &leaked.to_string());

    let store = shared_store();
    let persister = sql_persister(Arc::clone(&store), Arc::clone(&executor));
    assert_eq!(persister.load_repairing().await.unwrap(), 2);

    let guard = store.read().await;
    assert_eq!(guard.get_cell("sessions", "s1", "title"), Some(Cell::from("standup")));
    assert_eq!(guard.get_value("user_id"), Some(Cell::from("u1")));
    drop(guard);

    // Re-saving writes a clean document; a second load repairs nothing.
    persister.save().await.unwrap();
    assert_eq!(persister.load_repairing().await.unwrap(), 0);
}

#[tokio::test]
async fn sql_load_rejects_undecodable_blob_and_leaves_store_untouched() {
    let executor = Arc::new(MemoryExecutor::default());
    executor.seed("main", "[[1,2,3]]");

    let store = shared_store();
    store.write().await.set_value("user_id", "keep");
    let persister = sql_persister(Arc::clone(&store), executor);

    assert!(persister.load().await.is_err());
    assert_eq!(store.read().await.get_value("user_id"), Some(Cell::from("keep")));
}

#[tokio::test(start_paused = true)]
async fn auto_persist_debounces_bursts_into_one_save() {
    let executor = Arc::new(MemoryExecutor::default());
    let store = shared_store();
    let mut persister = sql_persister(Arc::clone(&store), Arc::clone(&executor));
    persister.start_auto_persisting().await.unwrap();

    {
        let mut guard = store.write().await;
        guard.set_cell("sessions", "s1", "title", "a");
        guard.set_cell("sessions", "s1", "notes", "b");
        guard.set_cell("sessions", "s2", "title", "c");
    }
    // Let the commit pump and the debounce timer run.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let blob = executor.blob("main").expect("debounced save ran");
    assert!(blob.contains("\"s1\""));
    assert!(blob.contains("\"s2\""));
    persister.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn flush_forces_pending_save_before_debounce_elapses() {
    let executor = Arc::new(MemoryExecutor::default());
    let store = shared_store();
    let mut persister = SqlPersister::new(
        Arc::clone(&store),
        Arc::clone(&executor) as Arc<dyn SqlExecutor>,
        SqlPersisterConfig {
            debounce: Duration::from_secs(60),
            ..SqlPersisterConfig::default()
        },
    );
    persister.start_auto_persisting().await.unwrap();

    store.write().await.set_cell("sessions", "s1", "title", "now");
    // Let the commit pump arm the scheduler, then force the save.
    tokio::time::sleep(Duration::from_millis(1)).await;
    persister.flush().await;

    assert!(executor.blob("main").expect("flushed").contains("now"));
    persister.destroy().await;
}

// ── Settings persister ───────────────────────────────────────────

#[derive(Default)]
struct MemorySettings {
    blob: Mutex<Option<Value>>,
}

#[async_trait]
impl SettingsMedium for MemorySettings {
    async fn get(&self) -> PersistResult<Option<Value>> {
        Ok(self.blob.lock().unwrap().clone())
    }

    async fn set(&self, blob: Value) -> PersistResult<()> {
        *self.blob.lock().unwrap() = Some(blob);
        Ok(())
    }
}

#[tokio::test]
async fn settings_persister_carries_values_but_not_tables() {
    let medium = Arc::new(MemorySettings::default());
    let store = shared_store();
    {
        let mut guard = store.write().await;
        guard.set_cell("sessions", "s1", "title", "ignored");
        guard.set_value("user_id", "u1");
        guard.set_value("onboarding_done", true);
    }

    let persister =
        SettingsPersister::new(Arc::clone(&store), Arc::clone(&medium) as Arc<dyn SettingsMedium>);
    persister.save().await.unwrap();
    assert_eq!(
        medium.blob.lock().unwrap().clone().unwrap(),
        json!({"onboarding_done": true, "user_id": "u1"})
    );

    let other = shared_store();
    let loader = SettingsPersister::new(Arc::clone(&other), medium);
    loader.load().await.unwrap();
    let guard = other.read().await;
    assert_eq!(guard.get_value("user_id"), Some(Cell::from("u1")));
    assert_eq!(guard.get_value("onboarding_done"), Some(Cell::from(true)));
    assert!(guard.get_row("sessions", "s1").is_none());
}

#[tokio::test]
async fn settings_load_rejects_non_object_blob() {
    let medium = Arc::new(MemorySettings::default());
    medium.set(json!([1, 2])).await.unwrap();
    let store = shared_store();
    let persister = SettingsPersister::new(store, medium);
    assert!(persister.load().await.is_err());
}

// ── Document persister ───────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<DocumentOp>>>,
}

#[async_trait]
impl DocumentSink for RecordingSink {
    async fn apply(&self, ops: Vec<DocumentOp>) -> PersistResult<()> {
        self.batches.lock().unwrap().push(ops);
        Ok(())
    }
}

fn notes_mapping() -> DocumentMapping {
    DocumentMapping {
        table: "sessions".to_string(),
        body_cell: "notes".to_string(),
        path_for: Arc::new(|row_id, _| PathBuf::from(format!("{row_id}.md"))),
    }
}

#[tokio::test]
async fn document_save_writes_rows_and_deletes_vanished_ones() {
    let sink = Arc::new(RecordingSink::default());
    let store = shared_store();
    {
        let mut guard = store.write().await;
        guard.set_cell("sessions", "s1", "title", "standup");
        guard.set_cell("sessions", "s1", "notes", "agenda");
        guard.set_cell("sessions", "s2", "notes", "retro");
    }

    let persister = DocumentPersister::new(
        Arc::clone(&store),
        Arc::clone(&sink) as Arc<dyn DocumentSink>,
        notes_mapping(),
    );
    persister.save().await.unwrap();
    assert_eq!(
        persister.written_paths().await.keys().collect::<Vec<_>>(),
        vec!["s1", "s2"]
    );

    store.write().await.del_row("sessions", "s2");
    persister.save().await.unwrap();

    let batches = sink.batches.lock().unwrap();
    let second = &batches[1];
    assert!(second.contains(&DocumentOp::Delete {
        paths: vec![PathBuf::from("s2.md")]
    }));
    assert!(second.iter().any(|op| matches!(
        op,
        DocumentOp::Write { path, content }
            if path == &PathBuf::from("s1.md") && content.contains("agenda")
    )));
}

#[tokio::test]
async fn document_render_puts_metadata_in_front_matter() {
    let store = shared_store();
    {
        let mut guard = store.write().await;
        guard.set_cell("sessions", "s1", "title", "standup");
        guard.set_cell("sessions", "s1", "pinned", true);
        guard.set_cell("sessions", "s1", "notes", "agenda item");
    }
    let row = store.read().await.get_row("sessions", "s1").unwrap();
    let doc = murmur_persist::render_document(&row, "notes");

    assert!(doc.starts_with("---\n"));
    assert!(doc.contains("\"title\": \"standup\""));
    assert!(doc.contains("\"pinned\": true"));
    assert!(!doc.contains("\"notes\""));
    assert!(doc.ends_with("agenda item\n"));
}

#[tokio::test]
async fn fs_sink_writes_and_removes_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(FsDocumentSink::new(dir.path()));
    let store = shared_store();
    store.write().await.set_cell("sessions", "s1", "notes", "hello");

    let persister = DocumentPersister::new(Arc::clone(&store), sink, notes_mapping());
    persister.save().await.unwrap();
    assert!(dir.path().join("s1.md").exists());

    store.write().await.del_row("sessions", "s1");
    persister.save().await.unwrap();
    assert!(!dir.path().join("s1.md").exists());
}
