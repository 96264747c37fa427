//! Entity CRUD endpoints
//!
//! - GET    /api/entities/{entity}?sort=[-]field
//! - POST   /api/entities/{entity}            (201)
//! - POST   /api/entities/{entity}/filter
//! - POST   /api/entities/{entity}/bulk       (201)
//! - GET    /api/entities/{entity}/{id}
//! - PUT    /api/entities/{entity}/{id}
//! - DELETE /api/entities/{entity}/{id}       (204)

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use caredesk_core::gateway::FilterQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::extractors::EntityPath;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// `field` ascending, `-field` descending
    pub sort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkResponse {
    pub created: usize,
}

/// GET /api/entities/{entity}
async fn list_records(
    State(state): State<AppState>,
    EntityPath(kind): EntityPath,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let records = state.store().list(kind, params.sort.as_deref()).await?;
    Ok(Json(records))
}

/// POST /api/entities/{entity}
async fn create_record(
    State(state): State<AppState>,
    EntityPath(kind): EntityPath,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record = state.store().create(kind, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/entities/{entity}/filter
async fn filter_records(
    State(state): State<AppState>,
    EntityPath(kind): EntityPath,
    Json(query): Json<FilterQuery>,
) -> Json<Vec<Value>> {
    Json(state.store().filter(kind, &query).await)
}

/// POST /api/entities/{entity}/bulk
async fn bulk_create(
    State(state): State<AppState>,
    EntityPath(kind): EntityPath,
    Json(bodies): Json<Vec<Value>>,
) -> Result<(StatusCode, Json<BulkResponse>), ApiError> {
    let created = state.store().bulk_create(kind, bodies).await?;
    Ok((StatusCode::CREATED, Json(BulkResponse { created })))
}

/// GET /api/entities/{entity}/{id}
async fn get_record(
    State(state): State<AppState>,
    EntityPath(kind): EntityPath,
    Path((_, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.store().get(kind, &id).await?))
}

/// PUT /api/entities/{entity}/{id}
async fn update_record(
    State(state): State<AppState>,
    EntityPath(kind): EntityPath,
    Path((_, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.store().update(kind, &id, body).await?))
}

/// DELETE /api/entities/{entity}/{id}
async fn delete_record(
    State(state): State<AppState>,
    EntityPath(kind): EntityPath,
    Path((_, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.store().delete(kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Entity routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/entities/{entity}",
            get(list_records).post(create_record),
        )
        .route("/api/entities/{entity}/filter", post(filter_records))
        .route("/api/entities/{entity}/bulk", post(bulk_create))
        .route(
            "/api/entities/{entity}/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
}
