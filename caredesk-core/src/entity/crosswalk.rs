//! Crosswalk mappings between coding systems (e.g. internal codes to CPT/ICD)

use serde::{Deserialize, Serialize};

use super::{default_true, eq_filter, flag_filter, meta_sort_value, search_hit, Entity, RecordMeta};
use crate::import::ImportColumn;
use crate::lookup::LabelIndex;
use crate::query::{FilterState, SortState, SortValue};
use crate::validation::{self, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingType {
    #[default]
    Exact,
    Broader,
    Narrower,
    Approximate,
}

impl MappingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Broader => "broader",
            Self::Narrower => "narrower",
            Self::Approximate => "approximate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crosswalk {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_code: Option<String>,
    #[serde(default)]
    pub mapping_type: MappingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Entity for Crosswalk {
    const KEY: &'static str = "crosswalk";
    const LABEL: &'static str = "Crosswalk";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "source_system",
        "source_code",
        "target_system",
        "target_code",
        "mapping_type",
        "is_active",
    ];
    const FORM_FIELDS: &'static [&'static str] = &[
        "source_system",
        "source_code",
        "target_system",
        "target_code",
        "valid_from",
        "valid_to",
        "notes",
    ];
    const IMPORT_COLUMNS: &'static [ImportColumn] = &[
        ImportColumn::required("source_system", &["Source System", "source_system", "From System"]),
        ImportColumn::required("source_code", &["Source Code", "source_code", "From Code"]),
        ImportColumn::required("target_system", &["Target System", "target_system", "To System"]),
        ImportColumn::required("target_code", &["Target Code", "target_code", "To Code"]),
        ImportColumn::optional("mapping_type", &["Mapping Type", "mapping_type", "Type"]),
        ImportColumn::optional("valid_from", &["Valid From", "valid_from"]),
        ImportColumn::optional("valid_to", &["Valid To", "valid_to"]),
        ImportColumn::optional("notes", &["Notes", "notes"]),
    ];

    fn default_sort() -> SortState {
        SortState::asc("source_code")
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn default_draft() -> Self {
        Self {
            meta: RecordMeta::default(),
            source_system: None,
            source_code: None,
            target_system: None,
            target_code: None,
            mapping_type: MappingType::Exact,
            valid_from: None,
            valid_to: None,
            notes: None,
            is_active: true,
        }
    }

    fn label(&self) -> String {
        format!(
            "{}:{} -> {}:{}",
            self.source_system.as_deref().unwrap_or("?"),
            self.source_code.as_deref().unwrap_or("?"),
            self.target_system.as_deref().unwrap_or("?"),
            self.target_code.as_deref().unwrap_or("?"),
        )
    }

    fn matches(&self, filters: &FilterState, _labels: &LabelIndex) -> bool {
        eq_filter(filters, "source_system", self.source_system.as_deref())
            && eq_filter(filters, "target_system", self.target_system.as_deref())
            && eq_filter(filters, "mapping_type", Some(self.mapping_type.as_str()))
            && flag_filter(filters, "is_active", self.is_active)
            && search_hit(
                filters,
                &[
                    self.source_code.as_deref(),
                    self.target_code.as_deref(),
                    self.notes.as_deref(),
                ],
            )
    }

    fn sort_value(&self, field: &str, _labels: &LabelIndex) -> SortValue {
        match field {
            "source_system" => SortValue::text(self.source_system.as_deref()),
            "source_code" => SortValue::text(self.source_code.as_deref()),
            "target_system" => SortValue::text(self.target_system.as_deref()),
            "target_code" => SortValue::text(self.target_code.as_deref()),
            "mapping_type" => SortValue::text(Some(self.mapping_type.as_str())),
            "valid_from" => SortValue::date(self.valid_from.as_deref()),
            "valid_to" => SortValue::date(self.valid_to.as_deref()),
            "is_active" => SortValue::Bool(self.is_active),
            _ => meta_sort_value(&self.meta, field),
        }
    }

    fn validate_field(&self, field: &str) -> Result<(), ValidationError> {
        match field {
            "source_system" => validation::required("source_system", self.source_system.as_deref()),
            "source_code" => {
                validation::required("source_code", self.source_code.as_deref())?;
                validation::max_len("source_code", self.source_code.as_deref(), 30)
            }
            "target_system" => validation::required("target_system", self.target_system.as_deref()),
            "target_code" => {
                validation::required("target_code", self.target_code.as_deref())?;
                validation::max_len("target_code", self.target_code.as_deref(), 30)
            }
            "valid_from" => validation::date("valid_from", self.valid_from.as_deref()),
            "valid_to" => {
                validation::date("valid_to", self.valid_to.as_deref())?;
                validation::date_order(
                    "valid_to",
                    "valid_from",
                    self.valid_from.as_deref(),
                    self.valid_to.as_deref(),
                )
            }
            "notes" => validation::max_len("notes", self.notes.as_deref(), 1000),
            _ => Ok(()),
        }
    }
}
