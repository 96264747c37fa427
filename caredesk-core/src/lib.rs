pub mod cache;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod form;
pub mod gateway;
pub mod import;
pub mod list;
pub mod lookup;
pub mod persist;
pub mod query;
pub mod retry;
pub mod selection;
pub mod session;
pub mod validation;

pub use cache::{TtlCache, DEFAULT_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CaredeskConfig;
pub use entity::{
    Address, City, Contract, Crosswalk, Entity, EntityKind, InsuredPerson, Policy,
    ProviderInternalCode, RecordMeta, Street,
};
pub use error::{CoreError, ErrorKind, GatewayError, Result, SubmitError};
pub use form::{DialogForm, FormMode};
pub use gateway::{Gateway, GatewayResult, MemoryGateway};
#[cfg(feature = "http")]
pub use gateway::HttpGateway;
pub use import::{ImportFormat, ImportSummary, RawRow};
pub use list::{BulkOutcome, EntityListManager, FetchState, ListView, Notice, NoticeLevel};
pub use persist::{FileStateStore, MemoryStateStore, ViewPreference, ViewStateStore};
pub use query::{FilterState, FilterValue, Page, SortDirection, SortState};
pub use retry::RetryPolicy;
pub use selection::Selection;
pub use session::Session;
