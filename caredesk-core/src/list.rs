//! Generic entity list manager
//!
//! One manager drives one entity view: fetch through the session cache with
//! retry, client-side filter → sort → paginate, the selection set and CRUD
//! passthrough that always ends in a forced refresh.
//!
//! Fetches are split into three steps so stale results can be dropped:
//! [`EntityListManager::prepare_fetch`] stamps a [`FetchJob`] with the
//! current generation, [`FetchJob::run`] talks to the cache and gateway
//! without touching the manager, and [`EntityListManager::apply_fetch`]
//! discards the outcome if a newer fetch was prepared, the sort changed or
//! the manager was detached in the meantime. [`EntityListManager::fetch`]
//! chains the three and sleeps through scheduled retries.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::entity::Entity;
use crate::error::{GatewayError, SubmitError};
use crate::form::DialogForm;
use crate::gateway::Gateway;
use crate::import::{map_rows, ImportSummary, RawRow, RowIssue};
use crate::persist::{self, ViewPreference};
use crate::query::{
    apply_filters, apply_sort, clamp_page, paginate, FilterState, FilterValue, Page, Pagination,
    SortDirection, SortState, MAX_PER_PAGE,
};
use crate::selection::Selection;
use crate::session::Session;

/// Per-fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Loading,
    Success,
    /// Retry number `attempt` will start after `delay`
    RetryScheduled { attempt: u32, delay: Duration },
    /// Terminal until the next manual fetch
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Toast-style message for the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Tally of a partially tolerant bulk action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(String, GatewayError)>,
}

impl fmt::Display for BulkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} succeeded, {} failed", self.succeeded, self.failed)
    }
}

/// Result of importing a batch of rows.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub summary: ImportSummary,
    pub issues: Vec<RowIssue>,
}

/// What a front end renders for the current state.
#[derive(Debug, Clone)]
pub struct ListView<E> {
    pub page: Page<E>,
    pub state: FetchState,
    /// Terminal error with nothing cached to show
    pub error: Option<String>,
    /// Stale-data warning shown above retained data
    pub warning: Option<String>,
    pub selected: usize,
}

impl<E> ListView<E> {
    pub fn is_empty(&self) -> bool {
        self.page.items.is_empty()
    }
}

/// A prepared fetch, detached from the manager while it runs.
pub struct FetchJob<E: Entity> {
    generation: u64,
    force: bool,
    sort: SortState,
    cache: Arc<TtlCache<Vec<E>>>,
    gateway: Arc<dyn Gateway<E>>,
}

/// Outcome of a [`FetchJob`], to be applied by the manager.
#[derive(Debug)]
pub struct FetchOutcome<E> {
    generation: u64,
    from_cache: bool,
    result: Result<Vec<E>, GatewayError>,
}

impl<E> FetchOutcome<E> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<E: Entity> fmt::Debug for FetchJob<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchJob")
            .field("entity", &E::KEY)
            .field("generation", &self.generation)
            .field("force", &self.force)
            .field("sort", &self.sort)
            .finish()
    }
}

impl<E: Entity> FetchJob<E> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Serve from cache when fresh, otherwise fetch once per key while
    /// concurrent callers wait and re-check the cache.
    pub async fn run(self) -> FetchOutcome<E> {
        let key = E::KEY;
        if !self.force {
            if let Some(items) = self.cache.get(key) {
                return self.outcome(true, Ok(items));
            }
        }

        let _guard = self.cache.acquire(key).await;
        if !self.force {
            if let Some(items) = self.cache.get(key) {
                debug!(entity = key, "served by a coalesced fetch");
                return self.outcome(true, Ok(items));
            }
        }

        self.cache.set_loading(key, true);
        info!(entity = key, sort = %self.sort.to_spec(), force = self.force, "fetching list");
        match self.gateway.list(Some(&self.sort)).await {
            Ok(items) => {
                self.cache.set(key, items.clone(), None);
                self.outcome(false, Ok(items))
            }
            Err(e) => {
                self.cache.record_error(key, e.clone());
                self.outcome(false, Err(e))
            }
        }
    }

    fn outcome(&self, from_cache: bool, result: Result<Vec<E>, GatewayError>) -> FetchOutcome<E> {
        FetchOutcome {
            generation: self.generation,
            from_cache,
            result,
        }
    }
}

/// What `apply_fetch` did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStep {
    Applied,
    /// A newer generation exists; the outcome was dropped
    Discarded,
    /// Retry after the delay
    Retry(Duration),
}

pub struct EntityListManager<E: Entity> {
    session: Arc<Session>,
    gateway: Arc<dyn Gateway<E>>,
    cache: Arc<TtlCache<Vec<E>>>,
    view_key: String,
    raw: Vec<E>,
    filters: FilterState,
    sort: SortState,
    page: u32,
    page_size: u32,
    view_preference: ViewPreference,
    selection: Selection,
    state: FetchState,
    retries: u32,
    generation: u64,
    detached: bool,
    error: Option<String>,
    warning: Option<String>,
    notices: Vec<Notice>,
}

impl<E: Entity> fmt::Debug for EntityListManager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityListManager")
            .field("entity", &E::KEY)
            .field("view_key", &self.view_key)
            .field("items", &self.raw.len())
            .field("filters", &self.filters)
            .field("sort", &self.sort)
            .field("page", &self.page)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<E: Entity> EntityListManager<E> {
    /// Build a manager, restoring persisted filters, sort, page size and
    /// view preference. The view key defaults to the entity key.
    pub fn new(session: Arc<Session>, gateway: Arc<dyn Gateway<E>>) -> Self {
        Self::with_view_key(session, gateway, E::KEY)
    }

    pub fn with_view_key(
        session: Arc<Session>,
        gateway: Arc<dyn Gateway<E>>,
        view_key: impl Into<String>,
    ) -> Self {
        let view_key = view_key.into();
        let store = session.store();
        let filters = persist::load(store, &persist::filters_key(E::KEY)).unwrap_or_default();
        let sort = persist::load(store, &persist::sort_key(E::KEY)).unwrap_or_else(E::default_sort);
        let page_size = persist::load::<u32>(store, &persist::page_size_key(E::KEY))
            .unwrap_or_else(|| session.page_size())
            .clamp(1, MAX_PER_PAGE);
        let view_preference =
            persist::load(store, &persist::view_preference_key(&view_key)).unwrap_or_default();
        let cache = session.cache::<E>();

        Self {
            session,
            gateway,
            cache,
            view_key,
            raw: Vec::new(),
            filters,
            sort,
            page: 1,
            page_size,
            view_preference,
            selection: Selection::new(),
            state: FetchState::Idle,
            retries: 0,
            generation: 0,
            detached: false,
            error: None,
            warning: None,
            notices: Vec::new(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway<E>> {
        &self.gateway
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn view_key(&self) -> &str {
        &self.view_key
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn raw(&self) -> &[E] {
        &self.raw
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn view_preference(&self) -> ViewPreference {
        self.view_preference
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn dismiss_warning(&mut self) {
        self.warning = None;
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // -- fetching ---------------------------------------------------------

    /// Fetch (or serve from cache), sleeping through scheduled retries.
    pub async fn fetch(&mut self, force: bool) -> FetchState {
        self.retries = 0;
        let mut force = force;
        loop {
            let job = self.prepare_fetch(force);
            let outcome = job.run().await;
            match self.apply_fetch(outcome) {
                FetchStep::Retry(delay) => {
                    tokio::time::sleep(delay).await;
                    force = true;
                }
                FetchStep::Applied | FetchStep::Discarded => return self.state,
            }
        }
    }

    /// Stamp a new fetch job. Any job prepared earlier becomes stale.
    pub fn prepare_fetch(&mut self, force: bool) -> FetchJob<E> {
        self.generation += 1;
        self.state = FetchState::Loading;
        FetchJob {
            generation: self.generation,
            force,
            sort: self.sort.clone(),
            cache: Arc::clone(&self.cache),
            gateway: Arc::clone(&self.gateway),
        }
    }

    pub fn apply_fetch(&mut self, outcome: FetchOutcome<E>) -> FetchStep {
        if self.detached || outcome.generation != self.generation {
            debug!(
                entity = E::KEY,
                outcome = outcome.generation,
                current = self.generation,
                "discarding stale fetch result"
            );
            return FetchStep::Discarded;
        }

        match outcome.result {
            Ok(items) => {
                debug!(entity = E::KEY, items = items.len(), from_cache = outcome.from_cache, "list loaded");
                self.raw = items;
                self.state = FetchState::Success;
                self.retries = 0;
                self.error = None;
                self.warning = None;
                self.session.update_labels(&self.raw);
                self.prune_selection();
                self.clamp_page();
                FetchStep::Applied
            }
            Err(e) => {
                if let Some(delay) = self.session.retry().next_delay(self.retries, &e) {
                    self.retries += 1;
                    warn!(
                        entity = E::KEY,
                        error = %e,
                        attempt = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        "fetch failed, retrying"
                    );
                    self.state = FetchState::RetryScheduled {
                        attempt: self.retries,
                        delay,
                    };
                    return FetchStep::Retry(delay);
                }

                self.state = FetchState::Failed;
                match self.cache.stale(E::KEY) {
                    Some(stale) => {
                        warn!(entity = E::KEY, error = %e, "showing stale data");
                        self.raw = stale;
                        self.error = None;
                        self.warning = Some(format!("Showing cached data. {}", e.user_message()));
                        self.prune_selection();
                        self.clamp_page();
                    }
                    None => {
                        warn!(entity = E::KEY, error = %e, "fetch failed");
                        self.error = Some(e.user_message());
                    }
                }
                FetchStep::Applied
            }
        }
    }

    /// Stop applying results; in-flight fetches are discarded on arrival.
    pub fn detach(&mut self) {
        self.detached = true;
        self.generation += 1;
    }

    /// Load labels for a referenced entity so its column sorts and
    /// searches by name.
    pub async fn side_load<R: Entity>(&self, gateway: &dyn Gateway<R>) -> Result<(), GatewayError> {
        self.session.side_load(gateway).await
    }

    // -- view state -------------------------------------------------------

    /// Filtered, sorted, paginated view of the raw collection.
    pub fn view(&self) -> ListView<E> {
        let labels = self.session.labels();
        let filtered = apply_filters(&self.raw, &self.filters, &labels);
        let sorted = apply_sort(filtered, &self.sort, &labels);
        ListView {
            page: paginate(&sorted, Pagination::new(self.page, self.page_size)),
            state: self.state,
            error: self.error.clone(),
            warning: self.warning.clone(),
            selected: self.selection.len(),
        }
    }

    pub fn filtered_count(&self) -> usize {
        apply_filters(&self.raw, &self.filters, &self.session.labels()).len()
    }

    /// Ids on the current page.
    pub fn visible_ids(&self) -> Vec<String> {
        self.view()
            .page
            .items
            .iter()
            .filter_map(|item| item.id().map(str::to_owned))
            .collect()
    }

    fn clamp_page(&mut self) {
        self.page = clamp_page(self.page, self.filtered_count(), self.page_size);
    }

    fn persist<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = persist::save(self.session.store(), key, value) {
            warn!(key, error = %e, "failed to persist view state");
        }
    }

    pub fn set_filter(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.filters.set(key, value);
        self.filters_changed();
    }

    pub fn clear_filter(&mut self, key: &str) {
        self.filters.remove(key);
        self.filters_changed();
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.filters_changed();
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.set_filter(crate::query::SEARCH_KEY, term.into());
    }

    fn filters_changed(&mut self) {
        self.persist(&persist::filters_key(E::KEY), &self.filters);
        self.clamp_page();
    }

    /// Change the sort. An in-flight fetch prepared under the old sort is
    /// invalidated.
    pub fn set_sort(&mut self, sort: SortState) {
        if sort == self.sort {
            return;
        }
        self.sort = sort;
        self.generation += 1;
        if self.state == FetchState::Loading {
            self.state = FetchState::Idle;
        }
        self.persist(&persist::sort_key(E::KEY), &self.sort);
        self.clamp_page();
    }

    /// Column-header behaviour: same field flips direction, new field
    /// starts ascending.
    pub fn toggle_sort(&mut self, field: &str) {
        let next = if self.sort.field == field {
            SortState {
                field: field.to_owned(),
                direction: self.sort.direction.reversed(),
            }
        } else {
            SortState {
                field: field.to_owned(),
                direction: SortDirection::Asc,
            }
        };
        self.set_sort(next);
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page;
        self.clamp_page();
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.clamp(1, MAX_PER_PAGE);
        self.persist(&persist::page_size_key(E::KEY), &self.page_size);
        self.clamp_page();
    }

    pub fn set_view_preference(&mut self, preference: ViewPreference) {
        self.view_preference = preference;
        self.persist(&persist::view_preference_key(&self.view_key), &preference);
    }

    /// View change: back to page one with nothing selected.
    pub fn reset(&mut self) {
        self.selection.clear();
        self.page = 1;
    }

    /// Forget persisted filters, sort, page size and view mode.
    pub fn reset_state(&mut self) -> crate::error::Result<()> {
        let store = self.session.store();
        persist::clear_prefix(store, E::KEY)?;
        if self.view_key != E::KEY {
            persist::clear_prefix(store, &self.view_key)?;
        }
        self.filters = FilterState::new();
        self.sort = E::default_sort();
        self.page_size = self.session.page_size().clamp(1, MAX_PER_PAGE);
        self.view_preference = ViewPreference::default();
        self.reset();
        Ok(())
    }

    // -- selection --------------------------------------------------------

    /// Toggle one record. Ids absent from the fetched collection are
    /// never selected.
    pub fn toggle(&mut self, id: &str) -> bool {
        if !self.selection.contains(id) && !self.raw.iter().any(|item| item.id() == Some(id)) {
            debug!(entity = E::KEY, id, "ignoring toggle of unknown id");
            return false;
        }
        self.selection.toggle(id)
    }

    /// Select the visible page, or deselect it when it is fully selected.
    pub fn select_all_visible(&mut self) {
        let visible = self.visible_ids();
        self.selection.toggle_all(visible.iter().map(String::as_str));
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn prune_selection(&mut self) {
        let present: HashSet<&str> = self.raw.iter().filter_map(|item| item.id()).collect();
        let dropped = self.selection.retain_present(&present);
        if dropped > 0 {
            debug!(entity = E::KEY, dropped, "pruned selection");
        }
    }

    // -- notices ----------------------------------------------------------

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // -- mutations --------------------------------------------------------

    pub async fn create(&mut self, record: &E) -> Result<E, GatewayError> {
        let result = self.gateway.create(record).await;
        self.after_mutation(&result, "created").await;
        result
    }

    pub async fn update(&mut self, id: &str, record: &E) -> Result<E, GatewayError> {
        let result = self.gateway.update(id, record).await;
        self.after_mutation(&result, "updated").await;
        result
    }

    pub async fn remove(&mut self, id: &str) -> Result<(), GatewayError> {
        let result = self.gateway.delete(id).await;
        self.after_mutation(&result, "deleted").await;
        result
    }

    /// Notify, and refresh once when the mutation went through.
    async fn after_mutation<T>(&mut self, result: &Result<T, GatewayError>, verb: &str) {
        match result {
            Ok(_) => {
                info!(entity = E::KEY, verb, "mutation succeeded");
                self.notify(NoticeLevel::Success, format!("{} {verb}", E::LABEL));
                self.fetch(true).await;
            }
            Err(e) => {
                warn!(entity = E::KEY, verb, error = %e, "mutation failed");
                self.notify(NoticeLevel::Error, e.to_string());
            }
        }
    }

    /// Delete each id on a bounded pool. Partial failures are tallied, not
    /// rolled back; one refresh follows if anything was deleted.
    pub async fn bulk_remove(&mut self, ids: &[String]) -> BulkOutcome {
        let concurrency = self.session.bulk_concurrency();
        let gateway = Arc::clone(&self.gateway);
        let results: Vec<(String, Result<(), GatewayError>)> = stream::iter(ids.iter().cloned())
            .map(|id| {
                let gateway = Arc::clone(&gateway);
                async move {
                    let result = gateway.delete(&id).await;
                    (id, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut outcome = BulkOutcome::default();
        for (id, result) in results {
            match result {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    outcome.failed += 1;
                    outcome.failures.push((id, e));
                }
            }
        }
        info!(entity = E::KEY, %outcome, "bulk delete finished");

        if outcome.failed == 0 {
            self.selection.clear();
            self.notify(
                NoticeLevel::Success,
                format!("Deleted {} {} record(s)", outcome.succeeded, E::LABEL),
            );
        } else if outcome.succeeded == 0 {
            self.notify(NoticeLevel::Error, outcome.to_string());
        } else {
            self.notify(NoticeLevel::Warning, outcome.to_string());
        }

        if outcome.succeeded > 0 {
            self.fetch(true).await;
        }
        outcome
    }

    pub async fn bulk_remove_selected(&mut self) -> BulkOutcome {
        let ids = self.selection.ids();
        self.bulk_remove(&ids).await
    }

    /// Create many records in one gateway call, then refresh once.
    pub async fn bulk_create(&mut self, records: &[E]) -> Result<usize, GatewayError> {
        if records.is_empty() {
            return Ok(0);
        }
        let result = self.gateway.bulk_create(records).await;
        match &result {
            Ok(()) => {
                info!(entity = E::KEY, count = records.len(), "bulk create succeeded");
                self.notify(
                    NoticeLevel::Success,
                    format!("Created {} {} record(s)", records.len(), E::LABEL),
                );
                self.fetch(true).await;
            }
            Err(e) => {
                warn!(entity = E::KEY, error = %e, "bulk create failed");
                self.notify(NoticeLevel::Error, e.to_string());
            }
        }
        result.map(|()| records.len())
    }

    /// Map rows onto drafts and create the accepted ones.
    pub async fn import_rows(&mut self, rows: &[RawRow]) -> Result<ImportReport, GatewayError> {
        let batch = map_rows::<E>(rows);
        if batch.summary.dropped() > 0 {
            self.notify(
                NoticeLevel::Warning,
                format!("{} row(s) skipped", batch.summary.dropped()),
            );
        }
        self.bulk_create(&batch.records).await?;
        Ok(ImportReport {
            summary: batch.summary,
            issues: batch.issues,
        })
    }

    /// Submit the dialog; success refreshes the list.
    pub async fn submit_form(&mut self, form: &mut DialogForm<E>) -> Result<E, SubmitError> {
        let result = form.submit(self.gateway.as_ref()).await;
        match &result {
            Ok(_) => {
                self.notify(NoticeLevel::Success, format!("{} saved", E::LABEL));
                self.fetch(true).await;
            }
            Err(SubmitError::Invalid { errors }) => {
                debug!(entity = E::KEY, fields = errors.len(), "form invalid");
            }
            Err(SubmitError::Gateway(e)) => {
                self.notify(NoticeLevel::Error, e.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::entity::{Address, City, RecordMeta};
    use crate::gateway::MemoryGateway;
    use crate::persist::MemoryStateStore;

    fn city(id: &str, name: &str) -> City {
        City {
            meta: RecordMeta {
                id: Some(id.into()),
                ..Default::default()
            },
            name_en: Some(name.into()),
            code: Some(id.to_uppercase()),
            ..City::default_draft()
        }
    }

    fn manager(gateway: Arc<MemoryGateway<City>>) -> EntityListManager<City> {
        EntityListManager::new(Arc::new(Session::default()), gateway)
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let gateway = Arc::new(MemoryGateway::with_records([city("c1", "Acre")]));
        let mut list = manager(gateway.clone());

        assert_eq!(list.fetch(false).await, FetchState::Success);
        assert_eq!(list.fetch(false).await, FetchState::Success);
        assert_eq!(gateway.calls().list, 1);

        list.fetch(true).await;
        assert_eq!(gateway.calls().list, 2);
    }

    #[tokio::test]
    async fn ttl_expiry_refetches() {
        let clock = Arc::new(ManualClock::default());
        let session = Arc::new(
            Session::default()
                .with_clock(clock.clone())
                .with_ttl("city", Duration::from_secs(120)),
        );
        let gateway = Arc::new(MemoryGateway::with_records([city("c1", "Acre")]));
        let mut list = EntityListManager::<City>::new(session, gateway.clone());

        list.fetch(false).await;
        clock.advance(chrono::Duration::seconds(119));
        list.fetch(false).await;
        assert_eq!(gateway.calls().list, 1);

        clock.advance(chrono::Duration::seconds(2));
        list.fetch(false).await;
        assert_eq!(gateway.calls().list, 2);
    }

    #[tokio::test]
    async fn stale_generation_is_discarded() {
        let gateway = Arc::new(MemoryGateway::with_records([city("c1", "Acre")]));
        let mut list = manager(gateway.clone());

        let old = list.prepare_fetch(true);
        let newer = list.prepare_fetch(true);
        let old_outcome = old.run().await;
        assert_eq!(list.apply_fetch(old_outcome), FetchStep::Discarded);
        assert_eq!(list.state(), FetchState::Loading);

        let outcome = newer.run().await;
        assert_eq!(list.apply_fetch(outcome), FetchStep::Applied);
        assert_eq!(list.raw().len(), 1);
    }

    #[tokio::test]
    async fn sort_change_invalidates_in_flight_fetch() {
        let gateway = Arc::new(MemoryGateway::with_records([city("c1", "Acre")]));
        let mut list = manager(gateway);

        let job = list.prepare_fetch(true);
        list.set_sort(SortState::desc("name_en"));
        let outcome = job.run().await;
        assert_eq!(list.apply_fetch(outcome), FetchStep::Discarded);
        assert!(list.raw().is_empty());
    }

    #[tokio::test]
    async fn detached_manager_ignores_results() {
        let gateway = Arc::new(MemoryGateway::with_records([city("c1", "Acre")]));
        let mut list = manager(gateway);
        let job = list.prepare_fetch(true);
        list.detach();
        let outcome = job.run().await;
        assert_eq!(list.apply_fetch(outcome), FetchStep::Discarded);
    }

    #[tokio::test]
    async fn other_errors_fail_without_retry() {
        let gateway = Arc::new(MemoryGateway::<City>::new());
        gateway.fail_always(GatewayError::Rejected {
            status: 500,
            message: "internal".into(),
        });
        let mut list = manager(gateway.clone());

        assert_eq!(list.fetch(false).await, FetchState::Failed);
        assert_eq!(gateway.calls().list, 1);
        assert!(list.error().unwrap().contains("internal"));
        assert!(list.warning().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_stale_data_with_warning() {
        let gateway = Arc::new(MemoryGateway::with_records([city("c1", "Acre")]));
        let mut list = manager(gateway.clone());
        list.fetch(false).await;

        gateway.fail_always(GatewayError::network("connection reset"));
        assert_eq!(list.fetch(true).await, FetchState::Failed);
        assert_eq!(list.raw().len(), 1);
        assert!(list.error().is_none());
        assert!(list.warning().unwrap().contains("Network error"));

        list.dismiss_warning();
        assert!(list.view().warning.is_none());
    }

    #[tokio::test]
    async fn refresh_prunes_vanished_selection() {
        let gateway = Arc::new(MemoryGateway::with_records([
            city("c1", "Acre"),
            city("c2", "Bnei Brak"),
        ]));
        let mut list = manager(gateway.clone());
        list.fetch(false).await;
        list.toggle("c1");
        list.toggle("c2");

        gateway.remove_silently("c2");
        list.fetch(true).await;
        assert_eq!(list.selection().ids(), vec!["c1".to_owned()]);
    }

    #[tokio::test]
    async fn toggle_ignores_ids_outside_collection() {
        let gateway = Arc::new(MemoryGateway::with_records([city("c1", "Acre")]));
        let mut list = manager(gateway);
        list.fetch(false).await;

        assert!(!list.toggle("ghost"));
        assert!(list.selection().is_empty());
        assert!(list.toggle("c1"));
        assert!(!list.toggle("c1"));
        assert!(list.selection().is_empty());
    }

    #[tokio::test]
    async fn failed_remove_skips_refresh() {
        let gateway = Arc::new(MemoryGateway::with_records([city("c1", "Acre")]));
        let mut list = manager(gateway.clone());
        list.fetch(false).await;
        assert_eq!(gateway.calls().list, 1);

        gateway.fail_delete("c1", GatewayError::other("locked"));
        assert!(list.remove("c1").await.is_err());
        assert_eq!(gateway.calls().list, 1);
        assert_eq!(list.take_notices()[0].level, NoticeLevel::Error);

        gateway.clear_faults();
        list.remove("c1").await.unwrap();
        assert_eq!(gateway.calls().list, 2);
        assert!(list.raw().is_empty());
    }

    #[tokio::test]
    async fn page_clamps_after_filter_change() {
        let cities: Vec<City> = (0..25).map(|n| city(&format!("c{n}"), &format!("City {n:02}"))).collect();
        let gateway = Arc::new(MemoryGateway::with_records(cities));
        let mut list = manager(gateway);
        list.set_page_size(10);
        list.fetch(false).await;

        list.set_page(3);
        assert_eq!(list.view().page.items.len(), 5);

        list.set_search("City 0");
        assert_eq!(list.page(), 1);
        assert_eq!(list.view().page.total, 10);
    }

    #[tokio::test]
    async fn view_state_persists_across_managers() {
        let session = Arc::new(Session::new(Arc::new(MemoryStateStore::new())));
        let gateway: Arc<MemoryGateway<Address>> = Arc::new(MemoryGateway::new());
        {
            let mut list = EntityListManager::<Address>::with_view_key(
                session.clone(),
                gateway.clone(),
                "addresses",
            );
            list.set_filter("city_id", "c1");
            list.set_sort(SortState::asc("zip_code"));
            list.set_page_size(50);
            list.set_view_preference(ViewPreference::Cards);
        }

        let mut list =
            EntityListManager::<Address>::with_view_key(session.clone(), gateway, "addresses");
        assert_eq!(list.filters().text("city_id"), Some("c1"));
        assert_eq!(list.sort(), &SortState::asc("zip_code"));
        assert_eq!(list.page_size(), 50);
        assert_eq!(list.view_preference(), ViewPreference::Cards);

        list.reset_state().unwrap();
        assert!(session.store().keys().is_empty());
        assert_eq!(list.sort(), &Address::default_sort());
    }

    #[tokio::test]
    async fn toggle_sort_flips_direction() {
        let gateway = Arc::new(MemoryGateway::<City>::new());
        let mut list = manager(gateway);
        list.toggle_sort("code");
        assert_eq!(list.sort(), &SortState::asc("code"));
        list.toggle_sort("code");
        assert_eq!(list.sort(), &SortState::desc("code"));
    }

    #[tokio::test]
    async fn create_refreshes_and_notifies() {
        let gateway = Arc::new(MemoryGateway::<City>::new());
        let mut list = manager(gateway.clone());
        list.fetch(false).await;

        let draft = City {
            name_en: Some("Tel Aviv".into()),
            code: Some("TLV".into()),
            ..City::default_draft()
        };
        list.create(&draft).await.unwrap();
        assert_eq!(list.raw().len(), 1);
        assert_eq!(gateway.calls().list, 2);

        let notices = list.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
        assert!(list.take_notices().is_empty());
    }
}
