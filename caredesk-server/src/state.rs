//! Application state shared across handlers

use std::sync::Arc;
use std::time::Instant;

use crate::store::EntityStore;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    store: EntityStore,
    started: Instant,
}

impl AppState {
    pub fn new(store: EntityStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                started: Instant::now(),
            }),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.inner.store
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.inner.started.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(EntityStore::new())
    }
}
