//! Debounced save scheduling.
//!
//! Every store commit marks the scheduler dirty; the save action runs once
//! after a quiet period instead of once per commit. `flush` forces the
//! pending save to run immediately and is a no-op when nothing is pending,
//! so callers can await durability before a dependent operation.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

type SaveAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct Inner {
    dirty: bool,
    timer: Option<JoinHandle<()>>,
}

/// Coalesces bursts of save requests into one debounced save.
pub struct SaveScheduler {
    delay: Duration,
    action: SaveAction,
    inner: Arc<Mutex<Inner>>,
}

impl SaveScheduler {
    /// A scheduler that runs `action` once per quiet period of `delay`.
    pub fn new(delay: Duration, action: impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static) -> Self {
        Self {
            delay,
            action: Arc::new(action),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Marks the state dirty and arms the timer if it is not already armed.
    pub async fn schedule(&self) {
        let mut inner = self.inner.lock().await;
        inner.dirty = true;
        if inner.timer.is_some() {
            return;
        }
        let delay = self.delay;
        let action = Arc::clone(&self.action);
        let shared = Arc::clone(&self.inner);
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let run = {
                let mut inner = shared.lock().await;
                inner.timer = None;
                std::mem::take(&mut inner.dirty)
            };
            if run {
                action().await;
            }
        }));
    }

    /// Runs the pending save now, if any. Idempotent when idle.
    pub async fn flush(&self) {
        let (run, timer) = {
            let mut inner = self.inner.lock().await;
            (std::mem::take(&mut inner.dirty), inner.timer.take())
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        if run {
            debug!("flushing pending save");
            (self.action)().await;
        }
    }

    /// Disarms the timer and discards any pending save.
    pub async fn stop(&self) {
        let timer = {
            let mut inner = self.inner.lock().await;
            inner.dirty = false;
            inner.timer.take()
        };
        if let Some(timer) = timer {
            timer.abort();
        }
    }
}
