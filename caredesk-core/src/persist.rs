//! Persisted view state
//!
//! Filters, sort, page size and view mode survive restarts as JSON strings
//! under the keys `<entityKey>_filters`, `<entityKey>_sortConfig`,
//! `<entityKey>_pageSize` and `<viewKey>_viewPreference`. The file store
//! keeps them all in one JSON object on disk, rewritten on every change.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

pub const FILTERS_SUFFIX: &str = "_filters";
pub const SORT_SUFFIX: &str = "_sortConfig";
pub const PAGE_SIZE_SUFFIX: &str = "_pageSize";
pub const VIEW_PREFERENCE_SUFFIX: &str = "_viewPreference";

const OWNED_SUFFIXES: [&str; 4] = [
    FILTERS_SUFFIX,
    SORT_SUFFIX,
    PAGE_SIZE_SUFFIX,
    VIEW_PREFERENCE_SUFFIX,
];

pub fn filters_key(entity_key: &str) -> String {
    format!("{entity_key}{FILTERS_SUFFIX}")
}

pub fn sort_key(entity_key: &str) -> String {
    format!("{entity_key}{SORT_SUFFIX}")
}

pub fn page_size_key(entity_key: &str) -> String {
    format!("{entity_key}{PAGE_SIZE_SUFFIX}")
}

pub fn view_preference_key(view_key: &str) -> String {
    format!("{view_key}{VIEW_PREFERENCE_SUFFIX}")
}

/// Table or card rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPreference {
    #[default]
    Table,
    Cards,
}

impl fmt::Display for ViewPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Cards => "cards",
        })
    }
}

/// String key-value storage for view state.
pub trait ViewStateStore: Send + Sync + fmt::Debug {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&self, key: &str, value: String) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Vec<String>;
}

/// Decode a stored value, treating corrupt entries as absent.
pub fn load<T: DeserializeOwned>(store: &dyn ViewStateStore, key: &str) -> Option<T> {
    let raw = store.get_raw(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "ignoring unreadable view state");
            None
        }
    }
}

pub fn save<T: Serialize>(store: &dyn ViewStateStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| CoreError::json(key, e))?;
    store.set_raw(key, raw)
}

/// Remove every key belonging to `prefix` (an entity or view key).
pub fn clear_prefix(store: &dyn ViewStateStore, prefix: &str) -> Result<usize> {
    let mut removed = 0;
    for key in store.keys() {
        let owned = OWNED_SUFFIXES
            .iter()
            .any(|suffix| key.strip_suffix(suffix) == Some(prefix));
        if owned {
            store.remove(&key)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ViewStateStore for MemoryStateStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: String) -> Result<()> {
        self.values().insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.values().keys().cloned().collect()
    }
}

/// JSON file holding every key, e.g. `~/.caredesk/view-state.json`.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStateStore {
    pub const FILE_NAME: &'static str = "view-state.json";

    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)
                    .map_err(|e| CoreError::json(path.display().to_string(), e))?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = values.len(), "opened view state");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Open `view-state.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::open(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(values)
            .map_err(|e| CoreError::json(self.path.display().to_string(), e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ViewStateStore for FileStateStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let mut values = self.values();
        values.insert(key.to_owned(), value);
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values();
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.values().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterState, SortState};

    #[test]
    fn key_layout() {
        assert_eq!(filters_key("address"), "address_filters");
        assert_eq!(sort_key("address"), "address_sortConfig");
        assert_eq!(view_preference_key("addresses"), "addresses_viewPreference");
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStateStore::in_dir(dir.path()).unwrap();
            let filters = FilterState::new().with("city_id", "c1").with("is_active", true);
            save(&store, &filters_key("address"), &filters).unwrap();
            save(&store, &sort_key("address"), &SortState::desc("zip_code")).unwrap();
        }

        let store = FileStateStore::in_dir(dir.path()).unwrap();
        let filters: FilterState = load(&store, "address_filters").unwrap();
        assert_eq!(filters.text("city_id"), Some("c1"));
        assert_eq!(filters.flag("is_active"), Some(true));
        let sort: SortState = load(&store, "address_sortConfig").unwrap();
        assert_eq!(sort, SortState::desc("zip_code"));
    }

    #[test]
    fn corrupt_values_load_as_absent() {
        let store = MemoryStateStore::new();
        store.set_raw("city_sortConfig", "{not json".into()).unwrap();
        assert_eq!(load::<SortState>(&store, "city_sortConfig"), None);
    }

    #[test]
    fn clear_prefix_only_touches_owned_keys() {
        let store = MemoryStateStore::new();
        save(&store, "city_filters", &FilterState::new()).unwrap();
        save(&store, "city_sortConfig", &SortState::asc("code")).unwrap();
        save(&store, "street_filters", &FilterState::new()).unwrap();

        assert_eq!(clear_prefix(&store, "city").unwrap(), 2);
        assert_eq!(store.keys(), vec!["street_filters".to_owned()]);
    }

    #[test]
    fn view_preference_serializes_lowercase() {
        let store = MemoryStateStore::new();
        save(&store, &view_preference_key("cities"), &ViewPreference::Cards).unwrap();
        assert_eq!(store.get_raw("cities_viewPreference").as_deref(), Some("\"cards\""));
    }
}
