//! SQL-backed persister: the whole store as one JSON blob in one row.
//!
//! The physical engine is injected as a [`SqlExecutor`]; the persister only
//! issues parameterized statements. The blob is the unstamped
//! `[tables, values]` content document — stamps never reach this boundary.
//! `load` runs the stamp-leak repair on the raw document before decoding,
//! so data written by earlier buggy versions is corrected in memory and can
//! be re-saved clean by the caller.
//!
//! This medium cannot push change notifications, so `start_auto_load` is
//! intentionally inert: sibling windows observe changes through the
//! synchronizer, not through this persister.

use crate::error::{PersistError, PersistResult};
use crate::persister::{AutoPersist, Persister, SharedStore};
use crate::repair::unwrap_stamp_leak;
use crate::scheduler::SaveScheduler;
use async_trait::async_trait;
use murmur_store::Content;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One parameterized statement against the injected medium.
///
/// Implementations log their own failures and return an empty row set;
/// errors never propagate through this boundary into the store.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Runs `sql` with positional `args`; each returned row maps column
    /// name to JSON value.
    async fn execute(
        &self,
        sql: &str,
        args: Vec<Value>,
    ) -> Vec<serde_json::Map<String, Value>>;
}

/// Where the blob lives and how saves are debounced.
#[derive(Debug, Clone)]
pub struct SqlPersisterConfig {
    /// Table holding `(id TEXT PRIMARY KEY, content TEXT)`.
    pub table: String,
    /// Row id of this store's blob.
    pub store_id: String,
    /// Auto-persist quiet period.
    pub debounce: Duration,
}

impl Default for SqlPersisterConfig {
    fn default() -> Self {
        Self {
            table: "murmur_store".to_string(),
            store_id: "main".to_string(),
            debounce: Duration::from_millis(200),
        }
    }
}

/// Persists one store as a JSON blob through an injected SQL executor.
pub struct SqlPersister {
    store: SharedStore,
    executor: Arc<dyn SqlExecutor>,
    config: Arc<SqlPersisterConfig>,
    scheduler: Arc<SaveScheduler>,
    auto_persist: Option<AutoPersist>,
}

impl SqlPersister {
    /// Binds a store to a SQL medium.
    #[must_use]
    pub fn new(
        store: SharedStore,
        executor: Arc<dyn SqlExecutor>,
        config: SqlPersisterConfig,
    ) -> Self {
        let config = Arc::new(config);
        let scheduler = {
            let store = Arc::clone(&store);
            let executor = Arc::clone(&executor);
            let config = Arc::clone(&config);
            Arc::new(SaveScheduler::new(config.debounce, move || {
                let store = Arc::clone(&store);
                let executor = Arc::clone(&executor);
                let config = Arc::clone(&config);
                Box::pin(async move {
                    if let Err(error) = save_blob(&store, &executor, &config).await {
                        warn!(%error, "debounced save failed; store stays usable in memory");
                    }
                })
            }))
        };
        Self {
            store,
            executor,
            config,
            scheduler,
            auto_persist: None,
        }
    }

    /// Loads the durable blob, repairing stamp leaks in the raw document
    /// before decoding. Returns the number of repaired slots so the main
    /// window can decide to re-save a clean document.
    pub async fn load_repairing(&self) -> PersistResult<usize> {
        let sql = format!(
            "SELECT content FROM {} WHERE id = ?1",
            self.config.table
        );
        let rows = self
            .executor
            .execute(&sql, vec![Value::from(self.config.store_id.clone())])
            .await;
        let Some(blob) = rows
            .first()
            .and_then(|row| row.get("content"))
            .and_then(Value::as_str)
        else {
            debug!(store_id = %self.config.store_id, "no durable snapshot yet");
            return Ok(0);
        };
        let mut document: Value = serde_json::from_str(blob)?;
        let repaired = unwrap_stamp_leak(&mut document);
        if repaired > 0 {
            warn!(repaired, "repaired stamp leaks in durable document");
        }
        let content: Content = serde_json::from_value(document)
            .map_err(|e| PersistError::InvalidData(format!("durable document: {e}")))?;
        self.store.write().await.set_content(content);
        Ok(repaired)
    }
}

async fn save_blob(
    store: &SharedStore,
    executor: &Arc<dyn SqlExecutor>,
    config: &SqlPersisterConfig,
) -> PersistResult<()> {
    let content = store.read().await.content();
    let blob = serde_json::to_string(&content)?;
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, content TEXT)",
        config.table
    );
    executor.execute(&create, Vec::new()).await;
    let upsert = format!(
        "INSERT INTO {} (id, content) VALUES (?1, ?2) \
         ON CONFLICT(id) DO UPDATE SET content = excluded.content",
        config.table
    );
    executor
        .execute(
            &upsert,
            vec![Value::from(config.store_id.clone()), Value::from(blob)],
        )
        .await;
    debug!(rows = content.row_count(), "saved store blob");
    Ok(())
}

#[async_trait]
impl Persister for SqlPersister {
    async fn load(&self) -> PersistResult<()> {
        self.load_repairing().await.map(|_| ())
    }

    async fn save(&self) -> PersistResult<()> {
        save_blob(&self.store, &self.executor, &self.config).await
    }

    async fn start_auto_load(&mut self) -> PersistResult<()> {
        // The SQL medium has no change notifications; sibling windows learn
        // about changes from the synchronizer instead.
        debug!("SQL medium cannot push changes; auto-load stays inert");
        Ok(())
    }

    async fn start_auto_persisting(&mut self) -> PersistResult<()> {
        if self.auto_persist.is_some() {
            return Ok(());
        }
        let auto = AutoPersist::start(&self.store, Arc::clone(&self.scheduler), |changes| {
            !changes.is_empty()
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
