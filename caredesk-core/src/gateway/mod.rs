//! Remote entity gateway
//!
//! The list manager and dialog controller only ever talk to a [`Gateway`].
//! Two adapters ship with the crate: [`MemoryGateway`] keeps records in
//! process (with fault injection for tests) and [`HttpGateway`] speaks the
//! REST contract served by `caredesk-server`.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::GatewayError;
use crate::query::SortState;

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpGateway;
pub use memory::{CallCounts, MemoryGateway};

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Exact-match query sent to `filter`: field (dotted for nested) → value.
pub type FilterQuery = Map<String, Value>;

/// CRUD over one entity collection.
#[async_trait]
pub trait Gateway<E: Entity>: Send + Sync {
    /// Whole collection, optionally sorted server side.
    async fn list(&self, sort: Option<&SortState>) -> GatewayResult<Vec<E>>;

    /// Records whose fields equal every entry of `query`.
    async fn filter(&self, query: &FilterQuery) -> GatewayResult<Vec<E>>;

    async fn create(&self, record: &E) -> GatewayResult<E>;

    async fn update(&self, id: &str, record: &E) -> GatewayResult<E>;

    async fn delete(&self, id: &str) -> GatewayResult<()>;

    async fn bulk_create(&self, records: &[E]) -> GatewayResult<()>;
}

/// Look up a dotted path inside a JSON record.
pub fn field_value<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, segment| current.get(segment))
}

/// True when every query entry equals the record's value at that path.
pub fn query_matches(record: &Value, query: &FilterQuery) -> bool {
    query
        .iter()
        .all(|(path, want)| field_value(record, path).unwrap_or(&Value::Null) == want)
}
