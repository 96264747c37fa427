//! Custom Axum extractors

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use caredesk_core::entity::EntityKind;

use crate::error::ApiError;

/// Entity kind from the `{entity}` path segment (`city`, `insured-person`,
/// `cities` all resolve).
#[derive(Debug, Clone, Copy)]
pub struct EntityPath(pub EntityKind);

impl<S> FromRequestParts<S> for EntityPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params): Path<HashMap<String, String>> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest {
                message: e.to_string(),
            })?;

        let key = params.get("entity").ok_or_else(|| ApiError::BadRequest {
            message: "missing entity segment".into(),
        })?;
        Ok(Self(EntityKind::from_key(key)?))
    }
}
