//! caredesk-server: local REST entity store
//!
//! Serves the `/api/entities/{entity}` contract that `HttpGateway` speaks,
//! backed by an in-memory store that validates writes with the same entity
//! rules the front end uses.

pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

pub use error::ApiError;
pub use server::{build_router, run_server, serve_with_shutdown, ServerConfig, ServerError};
pub use state::AppState;
pub use store::{EntityStore, StoreError};
