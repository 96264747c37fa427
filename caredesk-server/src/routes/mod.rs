//! Route handlers
//!
//! - health: liveness and per-entity record counts
//! - entities: the gateway CRUD contract under /api/entities/{entity}

pub mod entities;
pub mod health;
