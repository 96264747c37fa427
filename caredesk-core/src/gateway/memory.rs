//! In-process gateway
//!
//! Backs tests and offline use. Faults can be queued (fail the next call) or
//! made sustained (fail every call), and deletes can be failed per id to
//! exercise partial bulk failures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{query_matches, FilterQuery, Gateway, GatewayResult};
use crate::entity::Entity;
use crate::error::GatewayError;
use crate::lookup::LabelIndex;
use crate::query::{apply_sort, SortState};

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub filter: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub bulk_create: usize,
}

impl CallCounts {
    pub fn mutations(&self) -> usize {
        self.create + self.update + self.delete + self.bulk_create
    }
}

#[derive(Debug)]
struct State<E> {
    records: Vec<E>,
    next_id: u64,
    queued_faults: VecDeque<GatewayError>,
    sustained_fault: Option<GatewayError>,
    delete_faults: HashMap<String, GatewayError>,
    calls: CallCounts,
}

#[derive(Debug)]
pub struct MemoryGateway<E> {
    state: Mutex<State<E>>,
    latency: Option<Duration>,
}

impl<E: Entity> Default for MemoryGateway<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> MemoryGateway<E> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                records: Vec::new(),
                next_id: 1,
                queued_faults: VecDeque::new(),
                sustained_fault: None,
                delete_faults: HashMap::new(),
                calls: CallCounts::default(),
            }),
            latency: None,
        }
    }

    /// Seed with records; those without an id get one.
    pub fn with_records(records: impl IntoIterator<Item = E>) -> Self {
        let gateway = Self::new();
        {
            let mut state = gateway.state();
            for record in records {
                let record = assign_identity(&mut state, record);
                state.records.push(record);
            }
        }
        gateway
    }

    /// Delay every call by `latency` (tokio time, so paused clocks apply).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, State<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn records(&self) -> Vec<E> {
        self.state().records.clone()
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    /// Fail the next call with `error`.
    pub fn push_fault(&self, error: GatewayError) {
        self.state().queued_faults.push_back(error);
    }

    /// Fail every call with `error` until cleared.
    pub fn fail_always(&self, error: GatewayError) {
        self.state().sustained_fault = Some(error);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.queued_faults.clear();
        state.sustained_fault = None;
        state.delete_faults.clear();
    }

    /// Fail deletes of `id` with `error`.
    pub fn fail_delete(&self, id: impl Into<String>, error: GatewayError) {
        self.state().delete_faults.insert(id.into(), error);
    }

    /// Remove a record behind the caller's back (another actor's delete).
    pub fn remove_silently(&self, id: &str) {
        self.state().records.retain(|r| r.id() != Some(id));
    }

    async fn begin(&self, count: impl FnOnce(&mut CallCounts)) -> GatewayResult<()> {
        {
            let mut state = self.state();
            count(&mut state.calls);
            if let Some(fault) = state.queued_faults.pop_front() {
                return Err(fault);
            }
            if let Some(fault) = &state.sustained_fault {
                return Err(fault.clone());
            }
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

fn assign_identity<E: Entity>(state: &mut State<E>, mut record: E) -> E {
    let now = Utc::now().to_rfc3339();
    let meta = record.meta_mut();
    if meta.id.is_none() {
        meta.id = Some(format!("{}-{}", E::KEY, state.next_id));
        state.next_id += 1;
    }
    meta.created_date.get_or_insert_with(|| now.clone());
    meta.updated_date = Some(now);
    record
}

#[async_trait]
impl<E: Entity> Gateway<E> for MemoryGateway<E> {
    async fn list(&self, sort: Option<&SortState>) -> GatewayResult<Vec<E>> {
        self.begin(|c| c.list += 1).await?;
        let records = self.records();
        Ok(match sort {
            Some(sort) => apply_sort(records, sort, &LabelIndex::new()),
            None => records,
        })
    }

    async fn filter(&self, query: &FilterQuery) -> GatewayResult<Vec<E>> {
        self.begin(|c| c.filter += 1).await?;
        let records = self.records();
        let mut matched = Vec::new();
        for record in records {
            let value = serde_json::to_value(&record)
                .map_err(|e| GatewayError::other(format!("cannot encode record: {e}")))?;
            if query_matches(&value, query) {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    async fn create(&self, record: &E) -> GatewayResult<E> {
        self.begin(|c| c.create += 1).await?;
        let mut state = self.state();
        let mut record = record.clone();
        *record.meta_mut() = Default::default();
        let record = assign_identity(&mut state, record);
        state.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, record: &E) -> GatewayResult<E> {
        self.begin(|c| c.update += 1).await?;
        let mut state = self.state();
        let slot = state
            .records
            .iter_mut()
            .find(|r| r.id() == Some(id))
            .ok_or_else(|| GatewayError::not_found(E::KEY, id))?;

        let created = slot.meta().created_date.clone();
        let mut updated = record.clone();
        let meta = updated.meta_mut();
        meta.id = Some(id.to_owned());
        meta.created_date = created;
        meta.updated_date = Some(Utc::now().to_rfc3339());
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> GatewayResult<()> {
        self.begin(|c| c.delete += 1).await?;
        let mut state = self.state();
        if let Some(fault) = state.delete_faults.get(id) {
            return Err(fault.clone());
        }
        let before = state.records.len();
        state.records.retain(|r| r.id() != Some(id));
        if state.records.len() == before {
            return Err(GatewayError::not_found(E::KEY, id));
        }
        Ok(())
    }

    async fn bulk_create(&self, records: &[E]) -> GatewayResult<()> {
        self.begin(|c| c.bulk_create += 1).await?;
        let mut state = self.state();
        for record in records {
            let mut record = record.clone();
            *record.meta_mut() = Default::default();
            let record = assign_identity(&mut state, record);
            state.records.push(record);
        }
        Ok(())
    }
}
