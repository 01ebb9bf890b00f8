//! Settings persister: global values only, exchanged as one JSON object.

use crate::error::{PersistError, PersistResult};
use crate::persister::{AutoPersist, Persister, SharedStore};
use crate::scheduler::SaveScheduler;
use async_trait::async_trait;
use murmur_types::Cell;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The settings command surface: a get/set pair exchanging one
/// JSON-serialized object of value name to scalar.
#[async_trait]
pub trait SettingsMedium: Send + Sync {
    /// Reads the current settings blob, `None` when nothing is stored yet.
    async fn get(&self) -> PersistResult<Option<Value>>;

    /// Replaces the settings blob.
    async fn set(&self, blob: Value) -> PersistResult<()>;

    /// Change notifications, for media that can push them. One message per
    /// out-of-band change. The default has none.
    fn subscribe(&self) -> Option<UnboundedReceiver<()>> {
        None
    }
}

/// Persists a store's global values through a [`SettingsMedium`]. Tables
/// are out of this persister's scope.
pub struct SettingsPersister {
    store: SharedStore,
    medium: Arc<dyn SettingsMedium>,
    scheduler: Arc<SaveScheduler>,
    auto_persist: Option<AutoPersist>,
    auto_load: Option<JoinHandle<()>>,
}

impl SettingsPersister {
    /// Binds a store's values to a settings medium.
    #[must_use]
    pub fn new(store: SharedStore, medium: Arc<dyn SettingsMedium>) -> Self {
        Self::with_debounce(store, medium, Duration::from_millis(200))
    }

    /// Same, with an explicit auto-persist quiet period.
    #[must_use]
    pub fn with_debounce(
        store: SharedStore,
        medium: Arc<dyn SettingsMedium>,
        debounce: Duration,
    ) -> Self {
        let scheduler = {
            let store = Arc::clone(&store);
            let medium = Arc::clone(&medium);
            Arc::new(SaveScheduler::new(debounce, move || {
                let store = Arc::clone(&store);
                let medium = Arc::clone(&medium);
                Box::pin(async move {
                    if let Err(error) = save_values(&store, &medium).await {
                        warn!(%error, "debounced settings save failed");
                    }
                })
            }))
        };
        Self {
            store,
            medium,
            scheduler,
            auto_persist: None,
            auto_load: None,
        }
    }
}

async fn load_values(store: &SharedStore, medium: &Arc<dyn SettingsMedium>) -> PersistResult<()> {
    let Some(blob) = medium.get().await? else {
        debug!("no settings blob yet");
        return Ok(());
    };
    let Value::Object(fields) = blob else {
        return Err(PersistError::InvalidData(
            "settings blob is not a JSON object".to_string(),
        ));
    };
    let mut values: BTreeMap<String, Cell> = BTreeMap::new();
    for (name, field) in fields {
        match serde_json::from_value::<Cell>(field) {
            Ok(cell) => {
                values.insert(name, cell);
            }
            Err(_) => warn!(name, "skipped non-scalar settings entry"),
        }
    }
    store.write().await.set_values_content(values);
    Ok(())
}

async fn save_values(store: &SharedStore, medium: &Arc<dyn SettingsMedium>) -> PersistResult<()> {
    let values = store.read().await.values_content();
    let blob = serde_json::to_value(&values)?;
    medium.set(blob).await
}

#[async_trait]
impl Persister for SettingsPersister {
    async fn load(&self) -> PersistResult<()> {
        load_values(&self.store, &self.medium).await
    }

    async fn save(&self) -> PersistResult<()> {
        save_values(&self.store, &self.medium).await
    }

    async fn start_auto_load(&mut self) -> PersistResult<()> {
        if self.auto_load.is_some() {
            return Ok(());
        }
        let Some(mut rx) = self.medium.subscribe() else {
            debug!("settings medium cannot push changes; auto-load stays inert");
            return Ok(());
        };
        let store = Arc::clone(&self.store);
        let medium = Arc::clone(&self.medium);
        self.auto_load = Some(tokio::spawn(async move {
            while rx.recv().await.is_some() {
                if let Err(error) = load_values(&store, &medium).await {
                    warn!(%error, "settings auto-load failed");
                }
            }
        }));
        Ok(())
    }

    async fn start_auto_persisting(&mut self) -> PersistResult<()> {
        if self.auto_persist.is_some() {
            return Ok(());
        }
        // Only value changes matter to this medium.
        let auto = AutoPersist::start(&self.store, Arc::clone(&self.scheduler), |changes| {
            !changes.values.is_empty()
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
        if let Some(task) = self.auto_load.take() {
            task.abort();
        }
        self.scheduler.stop().await;
    }
}
