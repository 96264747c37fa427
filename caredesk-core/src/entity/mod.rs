//! Typed entity records
//!
//! Every back-office entity is an explicit struct with optional-field
//! semantics. The [`Entity`] trait carries what the generic list manager and
//! dialog controller need: the entity key, a default draft, the filter
//! predicate, the sort-key resolver and per-field validation.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::import::ImportColumn;
use crate::lookup::LabelIndex;
use crate::query::{FilterState, SortValue};
use crate::validation::ValidationError;

pub mod address;
pub mod contract;
pub mod crosswalk;
pub mod insured_person;
pub mod policy;
pub mod provider_code;

pub use address::{Address, City, Street};
pub use contract::{Contract, ContractStatus};
pub use crosswalk::{Crosswalk, MappingType};
pub use insured_person::{Gender, InsuredPerson, PersonStatus};
pub use policy::{Policy, PolicyStatus};
pub use provider_code::ProviderInternalCode;

/// Catalog codes: uppercase alphanumeric with dots, dashes and underscores
pub(crate) static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9._-]*$").expect("invalid code regex"));

pub(crate) static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex"));

pub(crate) static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()-]{5,19}$").expect("invalid phone regex"));

/// Identifier and server-maintained timestamps shared by every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
}

/// Phone/email block embedded in contracts and insured persons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Coverage limits attached to contracts and policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copay_percent: Option<f64>,
    #[serde(default)]
    pub requires_preauth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A record type managed through the gateway.
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Gateway and persisted-state key, e.g. `"city"`
    const KEY: &'static str;
    /// Human-readable singular name
    const LABEL: &'static str;
    /// Fields shown as table columns
    const COLUMNS: &'static [&'static str];
    /// Fields checked by `validate_all`, in display order
    const FORM_FIELDS: &'static [&'static str];
    /// Header aliases recognised by the importer
    const IMPORT_COLUMNS: &'static [ImportColumn];
    /// Initial sort when nothing is persisted
    fn default_sort() -> crate::query::SortState {
        crate::query::SortState::desc("created_date")
    }

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn id(&self) -> Option<&str> {
        self.meta().id.as_deref()
    }

    /// Default values for a create draft.
    fn default_draft() -> Self;

    /// Display label used by foreign-key lookups.
    fn label(&self) -> String;

    /// Filter predicate. Must be pure; neutral filters match everything.
    fn matches(&self, filters: &FilterState, labels: &LabelIndex) -> bool;

    /// Comparable key for `field`.
    fn sort_value(&self, field: &str, labels: &LabelIndex) -> SortValue;

    /// Check one field against the current draft. Unknown fields pass.
    fn validate_field(&self, field: &str) -> std::result::Result<(), ValidationError>;
}

pub(crate) fn default_true() -> bool {
    true
}

/// Sort keys every record supports.
pub(crate) fn meta_sort_value(meta: &RecordMeta, field: &str) -> SortValue {
    match field {
        "id" => SortValue::text(meta.id.as_deref()),
        "created_date" => SortValue::date(meta.created_date.as_deref()),
        "updated_date" => SortValue::date(meta.updated_date.as_deref()),
        _ => SortValue::Missing,
    }
}

/// Case-insensitive substring match of the search term against any field.
pub(crate) fn search_hit(filters: &FilterState, fields: &[Option<&str>]) -> bool {
    match filters.search() {
        None => true,
        Some(term) => fields
            .iter()
            .flatten()
            .any(|f| f.to_lowercase().contains(&term)),
    }
}

/// Exact match on a string column unless the filter is neutral.
pub(crate) fn eq_filter(filters: &FilterState, key: &str, value: Option<&str>) -> bool {
    match filters.text(key) {
        None => true,
        Some(want) => value == Some(want),
    }
}

pub(crate) fn flag_filter(filters: &FilterState, key: &str, value: bool) -> bool {
    match filters.flag(key) {
        None => true,
        Some(want) => value == want,
    }
}

/// Every entity type, for dispatch from string keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    City,
    Street,
    Address,
    Contract,
    InsuredPerson,
    Policy,
    ProviderInternalCode,
    Crosswalk,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        Self::City,
        Self::Street,
        Self::Address,
        Self::Contract,
        Self::InsuredPerson,
        Self::Policy,
        Self::ProviderInternalCode,
        Self::Crosswalk,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::City => City::KEY,
            Self::Street => Street::KEY,
            Self::Address => Address::KEY,
            Self::Contract => Contract::KEY,
            Self::InsuredPerson => InsuredPerson::KEY,
            Self::Policy => Policy::KEY,
            Self::ProviderInternalCode => ProviderInternalCode::KEY,
            Self::Crosswalk => Crosswalk::KEY,
        }
    }

    /// Accepts `insured_person`, `insured-person` and plural `cities`-style keys.
    pub fn from_key(key: &str) -> Result<Self> {
        let normalized = key.trim().to_lowercase().replace('-', "_");
        let singular = if let Some(stem) = normalized.strip_suffix("ies") {
            format!("{stem}y")
        } else if let Some(stem) = normalized.strip_suffix("sses") {
            format!("{stem}ss")
        } else {
            normalized.strip_suffix('s').unwrap_or(&normalized).to_owned()
        };
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == normalized || kind.key() == singular)
            .ok_or_else(|| CoreError::unknown_entity(key))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Run `$body` with `$E` bound to the concrete entity type for `$kind`.
#[macro_export]
macro_rules! with_entity {
    ($kind:expr, $E:ident => $body:expr) => {
        match $kind {
            $crate::entity::EntityKind::City => {
                type $E = $crate::entity::City;
                $body
            }
            $crate::entity::EntityKind::Street => {
                type $E = $crate::entity::Street;
                $body
            }
            $crate::entity::EntityKind::Address => {
                type $E = $crate::entity::Address;
                $body
            }
            $crate::entity::EntityKind::Contract => {
                type $E = $crate::entity::Contract;
                $body
            }
            $crate::entity::EntityKind::InsuredPerson => {
                type $E = $crate::entity::InsuredPerson;
                $body
            }
            $crate::entity::EntityKind::Policy => {
                type $E = $crate::entity::Policy;
                $body
            }
            $crate::entity::EntityKind::ProviderInternalCode => {
                type $E = $crate::entity::ProviderInternalCode;
                $body
            }
            $crate::entity::EntityKind::Crosswalk => {
                type $E = $crate::entity::Crosswalk;
                $body
            }
        }
    };
}

/// Apply `field=value` assignments on top of `base`.
///
/// Dotted fields address nested objects (`contact.phone`). Each raw value is
/// tried as a string and as a JSON scalar, string first unless the field
/// already holds a number or boolean; the first shape the record accepts
/// wins. An empty value clears optional fields.
pub fn apply_assignments<E: Entity>(base: &E, assignments: &[(String, String)]) -> Result<E> {
    let mut value = serde_json::to_value(base).map_err(|e| CoreError::json(E::KEY, e))?;
    for (field, raw) in assignments {
        let scalar = serde_json::from_str::<serde_json::Value>(raw)
            .ok()
            .filter(|v| !v.is_object() && !v.is_array());
        let text = serde_json::Value::String(raw.clone());
        let prefers_scalar = matches!(
            get_path(&value, field),
            Some(serde_json::Value::Number(_) | serde_json::Value::Bool(_))
        );

        let mut candidates = Vec::with_capacity(3);
        if raw.is_empty() {
            candidates.push(serde_json::Value::Null);
        }
        match scalar {
            Some(scalar) if prefers_scalar => candidates.extend([scalar, text]),
            Some(scalar) => candidates.extend([text, scalar]),
            None => candidates.push(text),
        }

        let mut applied = false;
        for candidate in candidates {
            let mut trial = value.clone();
            set_path(&mut trial, field, candidate)?;
            if serde_json::from_value::<E>(trial.clone()).is_ok() {
                value = trial;
                applied = true;
                break;
            }
        }
        if !applied {
            return Err(CoreError::invalid_field(
                field.as_str(),
                format!("'{}' is not accepted by {}", raw, E::LABEL),
            ));
        }
    }
    serde_json::from_value(value).map_err(|e| CoreError::invalid_field(E::KEY, e.to_string()))
}

fn get_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

/// Set `path` (dot separated) inside a JSON object, creating intermediate objects.
pub(crate) fn set_path(
    target: &mut serde_json::Value,
    path: &str,
    value: serde_json::Value,
) -> Result<()> {
    let mut current = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return Err(CoreError::invalid_field(path, "empty path segment"));
        }
        let object = match current {
            serde_json::Value::Object(map) => map,
            other if other.is_null() => {
                *other = serde_json::Value::Object(Default::default());
                other
                    .as_object_mut()
                    .ok_or_else(|| CoreError::invalid_field(path, "not an object"))?
            }
            _ => return Err(CoreError::invalid_field(path, "not an object")),
        };
        if segments.peek().is_none() {
            object.insert(segment.to_owned(), value);
            return Ok(());
        }
        current = object
            .entry(segment.to_owned())
            .or_insert(serde_json::Value::Null);
    }
    Ok(())
}
