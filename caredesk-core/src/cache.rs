//! Time-bounded cache of fetched collections
//!
//! One entry per entity key holds the last fetched snapshot, when it was
//! fetched, whether a fetch is in flight and the last fetch error. A failed
//! fetch keeps the previous snapshot so callers can keep showing stale data
//! next to a warning.
//!
//! Concurrent callers coalesce through [`TtlCache::acquire`]: the first
//! holder of a key's guard fetches, later holders re-check the cache when the
//! guard is released instead of issuing duplicate requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::GatewayError;

/// Default freshness window
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: Option<T>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub loading: bool,
    pub error: Option<GatewayError>,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            fetched_at: None,
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    inflight: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
            inflight: AsyncMutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>) -> bool {
        let age = self.clock.now() - fetched_at;
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => age < ttl,
            Err(_) => true,
        }
    }

    /// Cached data while fresh and no error is pending; `None` is a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries();
        let hit = entries.get(key).and_then(|entry| match (&entry.data, entry.fetched_at) {
            (Some(data), Some(at)) if entry.error.is_none() && self.is_fresh(at) => {
                Some(data.clone())
            }
            _ => None,
        });
        debug!(key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Last stored data regardless of age or pending error.
    pub fn stale(&self, key: &str) -> Option<T> {
        self.entries().get(key).and_then(|entry| entry.data.clone())
    }

    /// Store a fresh snapshot, stamp it with the current time and clear the
    /// in-flight flag.
    pub fn set(&self, key: &str, data: T, error: Option<GatewayError>) {
        let now = self.clock.now();
        let mut entries = self.entries();
        let entry = entries.entry(key.to_owned()).or_default();
        entry.data = Some(data);
        entry.fetched_at = Some(now);
        entry.loading = false;
        entry.error = error;
    }

    /// Record a failed fetch, keeping whatever data was there before.
    pub fn record_error(&self, key: &str, error: GatewayError) {
        let mut entries = self.entries();
        let entry = entries.entry(key.to_owned()).or_default();
        entry.loading = false;
        entry.error = Some(error);
    }

    pub fn error(&self, key: &str) -> Option<GatewayError> {
        self.entries().get(key).and_then(|entry| entry.error.clone())
    }

    pub fn fetched_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries().get(key).and_then(|entry| entry.fetched_at)
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.entries().get(key).is_some_and(|entry| entry.loading)
    }

    pub fn set_loading(&self, key: &str, loading: bool) {
        self.entries().entry(key.to_owned()).or_default().loading = loading;
    }

    /// Force the next `get` to miss. Data stays available through `stale`.
    pub fn invalidate(&self, key: &str) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.fetched_at = None;
        }
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Per-key fetch guard.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_owned())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
