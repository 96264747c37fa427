//! Side-loaded id → label mappings for foreign-key columns
//!
//! Policies reference insured persons, addresses reference cities and
//! streets. Sorting and searching on those columns compares the referenced
//! record's label, not its opaque id.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::query::SortValue;

#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    by_entity: HashMap<&'static str, HashMap<String, String>>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the labels for `E` with those of `items`.
    pub fn load<E: Entity>(&mut self, items: &[E]) {
        let labels = items
            .iter()
            .filter_map(|item| item.id().map(|id| (id.to_owned(), item.label())))
            .collect();
        self.by_entity.insert(E::KEY, labels);
    }

    pub fn insert(&mut self, entity: &'static str, id: impl Into<String>, label: impl Into<String>) {
        self.by_entity
            .entry(entity)
            .or_default()
            .insert(id.into(), label.into());
    }

    pub fn label(&self, entity: &str, id: &str) -> Option<&str> {
        self.by_entity
            .get(entity)
            .and_then(|labels| labels.get(id))
            .map(String::as_str)
    }

    /// Sort key for a foreign-key column; unknown ids compare by the id itself.
    pub fn sort_value(&self, entity: &str, id: Option<&str>) -> SortValue {
        match id {
            Some(id) => SortValue::text(Some(self.label(entity, id).unwrap_or(id))),
            None => SortValue::Missing,
        }
    }

    pub fn is_loaded(&self, entity: &str) -> bool {
        self.by_entity.contains_key(entity)
    }
}
