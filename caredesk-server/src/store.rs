//! In-memory entity store
//!
//! Records are kept as JSON objects per entity kind. Every write goes through
//! the typed entity first, so malformed payloads and field validation
//! failures are rejected before anything is stored.

use std::collections::HashMap;

use caredesk_core::entity::{Entity, EntityKind};
use caredesk_core::gateway::{query_matches, FilterQuery};
use caredesk_core::lookup::LabelIndex;
use caredesk_core::query::{apply_sort, SortState};
use caredesk_core::with_entity;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{field}: {message}")]
    Invalid { field: String, message: String },

    #[error("malformed {entity} payload: {reason}")]
    Malformed { entity: &'static str, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Default)]
pub struct EntityStore {
    collections: RwLock<HashMap<EntityKind, Vec<Value>>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole collection, sorted by `sort` (`field` or `-field`) when given.
    pub async fn list(&self, kind: EntityKind, sort: Option<&str>) -> StoreResult<Vec<Value>> {
        let records = self
            .collections
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        match sort.map(str::trim).filter(|s| !s.is_empty()) {
            Some(spec) => sort_records(kind, records, &SortState::from_spec(spec)),
            None => Ok(records),
        }
    }

    pub async fn get(&self, kind: EntityKind, id: &str) -> StoreResult<Value> {
        self.collections
            .read()
            .await
            .get(&kind)
            .and_then(|records| records.iter().find(|r| record_id(r) == Some(id)))
            .cloned()
            .ok_or_else(|| not_found(kind, id))
    }

    /// Records equal to every entry of `query` (dotted paths allowed).
    pub async fn filter(&self, kind: EntityKind, query: &FilterQuery) -> Vec<Value> {
        self.collections
            .read()
            .await
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| query_matches(r, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn create(&self, kind: EntityKind, body: Value) -> StoreResult<Value> {
        let now = Utc::now().to_rfc3339();
        let record = stamp(normalize(kind, body)?, new_id(), None, &now);
        self.collections
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(record.clone());
        info!(entity = kind.key(), id = ?record_id(&record), "created record");
        Ok(record)
    }

    /// Replace a record, keeping its id and creation time.
    pub async fn update(&self, kind: EntityKind, id: &str, body: Value) -> StoreResult<Value> {
        let normalized = normalize(kind, body)?;
        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(&kind)
            .and_then(|records| records.iter_mut().find(|r| record_id(r) == Some(id)))
            .ok_or_else(|| not_found(kind, id))?;

        let created = slot.get("created_date").cloned();
        let record = stamp(normalized, id.to_owned(), created, &Utc::now().to_rfc3339());
        *slot = record.clone();
        info!(entity = kind.key(), id, "updated record");
        Ok(record)
    }

    pub async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(kind).or_default();
        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Err(not_found(kind, id));
        }
        info!(entity = kind.key(), id, "deleted record");
        Ok(())
    }

    /// All-or-nothing insert: one bad record rejects the batch.
    pub async fn bulk_create(&self, kind: EntityKind, bodies: Vec<Value>) -> StoreResult<usize> {
        let now = Utc::now().to_rfc3339();
        let records = bodies
            .into_iter()
            .map(|body| normalize(kind, body).map(|r| stamp(r, new_id(), None, &now)))
            .collect::<StoreResult<Vec<_>>>()?;
        let count = records.len();
        self.collections
            .write()
            .await
            .entry(kind)
            .or_default()
            .extend(records);
        info!(entity = kind.key(), count, "bulk created records");
        Ok(count)
    }

    /// Record count per entity key.
    pub async fn counts(&self) -> HashMap<&'static str, usize> {
        self.collections
            .read()
            .await
            .iter()
            .map(|(kind, records)| (kind.key(), records.len()))
            .collect()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

fn not_found(kind: EntityKind, id: &str) -> StoreError {
    StoreError::NotFound {
        entity: kind.key(),
        id: id.to_owned(),
    }
}

/// Decode into the typed entity, validate its form fields, and re-encode.
fn normalize(kind: EntityKind, body: Value) -> StoreResult<Value> {
    if !body.is_object() {
        return Err(StoreError::Malformed {
            entity: kind.key(),
            reason: "expected a JSON object".into(),
        });
    }
    with_entity!(kind, E => {
        let record: E = serde_json::from_value(body).map_err(|e| StoreError::Malformed {
            entity: E::KEY,
            reason: e.to_string(),
        })?;
        for field in E::FORM_FIELDS {
            record.validate_field(field).map_err(|e| StoreError::Invalid {
                field: e.field().to_owned(),
                message: e.to_string(),
            })?;
        }
        serde_json::to_value(&record).map_err(|e| StoreError::Malformed {
            entity: E::KEY,
            reason: e.to_string(),
        })
    })
}

fn stamp(mut record: Value, id: String, created: Option<Value>, now: &str) -> Value {
    if let Value::Object(map) = &mut record {
        map.insert("id".into(), Value::String(id));
        map.insert(
            "created_date".into(),
            created.unwrap_or_else(|| Value::String(now.to_owned())),
        );
        map.insert("updated_date".into(), Value::String(now.to_owned()));
    }
    record
}

/// Sort with the entity's own sort keys so server and client order agree.
fn sort_records(kind: EntityKind, records: Vec<Value>, sort: &SortState) -> StoreResult<Vec<Value>> {
    debug!(entity = kind.key(), sort = %sort.to_spec(), "sorting collection");
    with_entity!(kind, E => {
        let typed = records
            .into_iter()
            .map(serde_json::from_value::<E>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Malformed { entity: E::KEY, reason: e.to_string() })?;
        apply_sort(typed, sort, &LabelIndex::new())
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Malformed { entity: E::KEY, reason: e.to_string() })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let store = EntityStore::new();
        let record = store
            .create(EntityKind::City, json!({"name_en": "Haifa", "code": "HFA"}))
            .await
            .unwrap();
        assert!(record["id"].as_str().is_some());
        assert!(record["created_date"].as_str().is_some());
        assert_eq!(record["code"], "HFA");
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected() {
        let store = EntityStore::new();
        let err = store
            .create(EntityKind::City, json!({"name_en": "Haifa"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid { ref field, .. } if field == "code"));

        let err = store
            .create(EntityKind::City, json!(["not", "an", "object"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[tokio::test]
    async fn update_keeps_created_date() {
        let store = EntityStore::new();
        let created = store
            .create(EntityKind::City, json!({"name_en": "Haifa", "code": "HFA"}))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap();

        let updated = store
            .update(EntityKind::City, id, json!({"name_en": "Hefa", "code": "HFA"}))
            .await
            .unwrap();
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["created_date"], created["created_date"]);
        assert_eq!(updated["name_en"], "Hefa");
    }

    #[tokio::test]
    async fn list_sorts_by_sort_param() {
        let store = EntityStore::new();
        for (name, code) in [("beta", "B"), ("Alpha", "A"), ("gamma", "G")] {
            store
                .create(EntityKind::City, json!({"name_en": name, "code": code}))
                .await
                .unwrap();
        }
        let desc = store.list(EntityKind::City, Some("-name_en")).await.unwrap();
        let names: Vec<&str> = desc.iter().filter_map(|r| r["name_en"].as_str()).collect();
        assert_eq!(names, vec!["gamma", "beta", "Alpha"]);
    }

    #[tokio::test]
    async fn bulk_create_is_all_or_nothing() {
        let store = EntityStore::new();
        let err = store
            .bulk_create(
                EntityKind::City,
                vec![json!({"name_en": "A", "code": "A"}), json!({"name_en": "B"})],
            )
            .await;
        assert!(err.is_err());
        assert!(store.list(EntityKind::City, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = EntityStore::new();
        let err = store.delete(EntityKind::Street, "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "street", .. }));
    }
}
