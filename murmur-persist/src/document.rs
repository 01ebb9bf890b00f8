//! Document persister: one table's rows as front-matter documents on disk.
//!
//! Write-mostly: `save` maps every live row of the mapped table to a
//! document and removes documents for rows that are gone; `load` does not
//! reconcile disk content back into the store. Documents are batched as
//! write/delete operations per save cycle and applied by a [`DocumentSink`].

use crate::error::PersistResult;
use crate::persister::{AutoPersist, Persister, SharedStore};
use crate::scheduler::SaveScheduler;
use async_trait::async_trait;
use murmur_store::Row;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One batched filesystem operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOp {
    /// Write (or overwrite) one whole-file document.
    Write { path: PathBuf, content: String },
    /// Remove documents whose rows no longer exist.
    Delete { paths: Vec<PathBuf> },
}

/// Applies one save cycle's batch of document operations.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn apply(&self, ops: Vec<DocumentOp>) -> PersistResult<()>;
}

/// A sink writing documents under one root directory with `tokio::fs`.
/// Relative op paths are resolved against the root; parent directories are
/// created as needed; deleting a missing file is not an error.
pub struct FsDocumentSink {
    root: PathBuf,
}

impl FsDocumentSink {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentSink for FsDocumentSink {
    async fn apply(&self, ops: Vec<DocumentOp>) -> PersistResult<()> {
        for op in ops {
            match op {
                DocumentOp::Write { path, content } => {
                    let path = self.root.join(path);
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&path, content).await?;
                }
                DocumentOp::Delete { paths } => {
                    for path in paths {
                        let path = self.root.join(path);
                        match tokio::fs::remove_file(&path).await {
                            Ok(()) => {}
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Which table becomes documents and how each row maps to a path.
#[derive(Clone)]
pub struct DocumentMapping {
    /// The mapped table.
    pub table: String,
    /// The cell holding the document body; remaining cells become front
    /// matter.
    pub body_cell: String,
    /// Computes a row's document path.
    pub path_for: Arc<dyn Fn(&str, &Row) -> PathBuf + Send + Sync>,
}

/// Renders one row as a document: front matter (every cell except the body
/// cell, as a pretty JSON object between `---` delimiters) followed by the
/// body cell's text.
#[must_use]
pub fn render_document(row: &Row, body_cell: &str) -> String {
    let meta: BTreeMap<&str, &murmur_types::Cell> = row
        .iter()
        .filter(|(name, _)| name.as_str() != body_cell)
        .map(|(name, cell)| (name.as_str(), cell))
        .collect();
    let front = serde_json::to_string_pretty(&meta).unwrap_or_else(|_| "{}".to_string());
    let body = row
        .get(body_cell)
        .map(ToString::to_string)
        .unwrap_or_default();
    format!("---\n{front}\n---\n\n{body}\n")
}

/// Persists one table's rows as documents through a [`DocumentSink`].
pub struct DocumentPersister {
    store: SharedStore,
    sink: Arc<dyn DocumentSink>,
    mapping: DocumentMapping,
    scheduler: Arc<SaveScheduler>,
    auto_persist: Option<AutoPersist>,
    // Row id → path written by the previous save, for deletion batches.
    written: Arc<Mutex<BTreeMap<String, PathBuf>>>,
}

impl DocumentPersister {
    /// Binds one table of a store to a document sink.
    #[must_use]
    pub fn new(store: SharedStore, sink: Arc<dyn DocumentSink>, mapping: DocumentMapping) -> Self {
        Self::with_debounce(store, sink, mapping, Duration::from_millis(300))
    }

    /// Same, with an explicit auto-persist quiet period.
    #[must_use]
    pub fn with_debounce(
        store: SharedStore,
        sink: Arc<dyn DocumentSink>,
        mapping: DocumentMapping,
        debounce: Duration,
    ) -> Self {
        let written = Arc::new(Mutex::new(BTreeMap::new()));
        let scheduler = {
            let store = Arc::clone(&store);
            let sink = Arc::clone(&sink);
            let mapping = mapping.clone();
            let written = Arc::clone(&written);
            Arc::new(SaveScheduler::new(debounce, move || {
                let store = Arc::clone(&store);
                let sink = Arc::clone(&sink);
                let mapping = mapping.clone();
                let written = Arc::clone(&written);
                Box::pin(async move {
                    if let Err(error) = save_documents(&store, &sink, &mapping, &written).await {
                        warn!(%error, "debounced document save failed");
                    }
                })
            }))
        };
        Self {
            store,
            sink,
            mapping,
            scheduler,
            auto_persist: None,
            written,
        }
    }

    /// Paths written by the last completed save, keyed by row id.
    pub async fn written_paths(&self) -> BTreeMap<String, PathBuf> {
        self.written.lock().await.clone()
    }
}

async fn save_documents(
    store: &SharedStore,
    sink: &Arc<dyn DocumentSink>,
    mapping: &DocumentMapping,
    written: &Arc<Mutex<BTreeMap<String, PathBuf>>>,
) -> PersistResult<()> {
    let table = store.read().await.get_table(&mapping.table);

    let mut current: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut ops: Vec<DocumentOp> = Vec::new();
    for (row_id, row) in &table {
        let path = (mapping.path_for)(row_id, row);
        ops.push(DocumentOp::Write {
            path: path.clone(),
            content: render_document(row, &mapping.body_cell),
        });
        current.insert(row_id.clone(), path);
    }

    let mut previous = written.lock().await;
    let stale: Vec<PathBuf> = previous
        .iter()
        .filter(|(row_id, path)| current.get(*row_id) != Some(path))
        .map(|(_, path)| path.clone())
        .collect();
    if !stale.is_empty() {
        ops.push(DocumentOp::Delete { paths: stale });
    }

    sink.apply(ops).await?;
    debug!(table = mapping.table, documents = current.len(), "saved documents");
    *previous = current;
    Ok(())
}

#[async_trait]
impl Persister for DocumentPersister {
    async fn load(&self) -> PersistResult<()> {
        // Write-mostly medium: documents are derived from the store, never
        // reconciled back into it.
        debug!(table = self.mapping.table, "document medium is write-only; load is a no-op");
        Ok(())
    }

    async fn save(&self) -> PersistResult<()> {
        save_documents(&self.store, &self.sink, &self.mapping, &self.written).await
    }

    async fn start_auto_load(&mut self) -> PersistResult<()> {
        debug!("document medium has no load path; auto-load stays inert");
        Ok(())
    }

    async fn start_auto_persisting(&mut self) -> PersistResult<()> {
        if self.auto_persist.is_some() {
            return Ok(());
        }
        let table = self.mapping.table.clone();
        let auto = AutoPersist::start(&self.store, Arc::clone(&self.scheduler), move |changes| {
            changes.touched_tables().iter().any(|t| *t == table)
        })
        .await;
        self.auto_persist = Some(auto);
        Ok(())
    }

    async fn flush(&self) {
        self.scheduler.flush().await;
    }

    async fn destroy(&mut self) {
        if let Some(auto) = self.auto_persist.take() {
            auto.stop(&self.store).await;
        }
        self.scheduler.stop().await;
    }
}
