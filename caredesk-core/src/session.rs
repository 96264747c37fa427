//! Shared state for one front end instance
//!
//! A [`Session`] owns the per-entity caches, the clock, the view-state
//! store and the foreign-key label index. List managers built from the same
//! session share caches; separate sessions never see each other's data.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::cache::{TtlCache, DEFAULT_TTL};
use crate::clock::{Clock, SystemClock};
use crate::config::CaredeskConfig;
use crate::entity::Entity;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::lookup::LabelIndex;
use crate::persist::{MemoryStateStore, ViewStateStore};
use crate::query::DEFAULT_PER_PAGE;
use crate::retry::RetryPolicy;

type AnyCache = Arc<dyn Any + Send + Sync>;

#[derive(Debug)]
pub struct Session {
    clock: Arc<dyn Clock>,
    store: Arc<dyn ViewStateStore>,
    caches: Mutex<HashMap<&'static str, AnyCache>>,
    labels: RwLock<LabelIndex>,
    default_ttl: Duration,
    ttl_overrides: HashMap<String, Duration>,
    retry: RetryPolicy,
    page_size: u32,
    bulk_concurrency: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStateStore::new()))
    }
}

impl Session {
    pub fn new(store: Arc<dyn ViewStateStore>) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            store,
            caches: Mutex::new(HashMap::new()),
            labels: RwLock::new(LabelIndex::new()),
            default_ttl: DEFAULT_TTL,
            ttl_overrides: HashMap::new(),
            retry: RetryPolicy::default(),
            page_size: DEFAULT_PER_PAGE,
            bulk_concurrency: 4,
        }
    }

    pub fn from_config(config: &CaredeskConfig, store: Arc<dyn ViewStateStore>) -> Self {
        let mut session = Self::new(store)
            .with_default_ttl(config.default_ttl())
            .with_page_size(config.list.page_size)
            .with_bulk_concurrency(config.list.bulk_concurrency);
        for (key, secs) in &config.cache.ttl_overrides {
            session
                .ttl_overrides
                .insert(key.clone(), Duration::from_secs(*secs));
        }
        session
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_ttl(mut self, entity_key: &str, ttl: Duration) -> Self {
        self.ttl_overrides.insert(entity_key.to_owned(), ttl);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_bulk_concurrency(mut self, concurrency: usize) -> Self {
        self.bulk_concurrency = concurrency.max(1);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &dyn ViewStateStore {
        self.store.as_ref()
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn bulk_concurrency(&self) -> usize {
        self.bulk_concurrency
    }

    pub fn ttl_for(&self, entity_key: &str) -> Duration {
        self.ttl_overrides
            .get(entity_key)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// The collection cache for `E`, created on first use.
    pub fn cache<E: Entity>(&self) -> Arc<TtlCache<Vec<E>>> {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = caches.get(E::KEY) {
            if let Ok(cache) = Arc::clone(existing).downcast::<TtlCache<Vec<E>>>() {
                return cache;
            }
        }
        let cache = Arc::new(TtlCache::<Vec<E>>::with_clock(
            self.ttl_for(E::KEY),
            Arc::clone(&self.clock),
        ));
        debug!(entity = E::KEY, ttl = ?cache.ttl(), "created cache");
        caches.insert(E::KEY, cache.clone() as AnyCache);
        cache
    }

    /// Snapshot of the label index.
    pub fn labels(&self) -> LabelIndex {
        self.labels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_labels<E: Entity>(&self, items: &[E]) {
        self.labels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .load(items);
    }

    /// Load labels for a referenced entity (e.g. insured persons for the
    /// policy view), through the cache.
    pub async fn side_load<R: Entity>(&self, gateway: &dyn Gateway<R>) -> Result<(), GatewayError> {
        let cache = self.cache::<R>();
        let items = match cache.get(R::KEY) {
            Some(items) => items,
            None => {
                let _guard = cache.acquire(R::KEY).await;
                match cache.get(R::KEY) {
                    Some(items) => items,
                    None => {
                        let items = gateway.list(None).await?;
                        cache.set(R::KEY, items.clone(), None);
                        items
                    }
                }
            }
        };
        self.update_labels(&items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{City, InsuredPerson, RecordMeta, Street};
    use crate::gateway::MemoryGateway;

    #[test]
    fn caches_are_shared_per_entity() {
        let session = Session::default().with_ttl("street", Duration::from_secs(60));
        let a = session.cache::<City>();
        let b = session.cache::<City>();
        assert!(Arc::ptr_eq(&a, &b));

        let streets = session.cache::<Street>();
        assert_eq!(streets.ttl(), Duration::from_secs(60));
        assert_eq!(a.ttl(), DEFAULT_TTL);
    }

    #[test]
    fn separate_sessions_do_not_share() {
        let one = Session::default();
        let two = Session::default();
        one.cache::<City>().set("city", vec![City::default_draft()], None);
        assert!(two.cache::<City>().get("city").is_none());
    }

    #[tokio::test]
    async fn side_load_fills_labels_once() {
        let person = InsuredPerson {
            meta: RecordMeta {
                id: Some("p1".into()),
                ..Default::default()
            },
            full_name: Some("Dana Levi".into()),
            ..InsuredPerson::default()
        };
        let gateway = MemoryGateway::with_records([person]);
        let session = Session::default();

        session.side_load(&gateway).await.unwrap();
        session.side_load(&gateway).await.unwrap();

        assert_eq!(session.labels().label("insured_person", "p1"), Some("Dana Levi"));
        assert_eq!(gateway.calls().list, 1);
    }
}
