//! Provider internal code catalog

use serde::{Deserialize, Serialize};

use super::{
    default_true, eq_filter, flag_filter, meta_sort_value, search_hit, Entity, RecordMeta, CODE_RE,
};
use crate::import::ImportColumn;
use crate::lookup::LabelIndex;
use crate::query::{FilterState, SortState, SortValue};
use crate::validation::{self, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInternalCode {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_he: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Entity for ProviderInternalCode {
    const KEY: &'static str = "provider_internal_code";
    const LABEL: &'static str = "Provider Internal Code";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "provider_id",
        "code",
        "description_en",
        "category",
        "price",
        "is_active",
    ];
    const FORM_FIELDS: &'static [&'static str] = &[
        "provider_id",
        "code",
        "description_en",
        "description_he",
        "category",
        "price",
    ];
    const IMPORT_COLUMNS: &'static [ImportColumn] = &[
        ImportColumn::required("provider_id", &["Provider ID", "provider_id", "Provider"]),
        ImportColumn::required("code", &["Code", "Internal Code", "code"]),
        ImportColumn::optional("description_en", &["Description (English)", "description_en", "Description"]),
        ImportColumn::optional("description_he", &["Description (Hebrew)", "description_he"]),
        ImportColumn::optional("category", &["Category", "category"]),
        ImportColumn::optional("price", &["Price", "price"]),
        ImportColumn::optional("is_active", &["Active", "is_active"]),
    ];

    fn default_sort() -> SortState {
        SortState::asc("code")
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
            provider_id: None,
            code: None,
            description_en: None,
            description_he: None,
            category: None,
            price: None,
            is_active: true,
        }
    }

    fn label(&self) -> String {
        match (&self.code, &self.description_en) {
            (Some(code), Some(desc)) => format!("{code} - {desc}"),
            (Some(code), None) => code.clone(),
            _ => self.description_en.clone().unwrap_or_default(),
        }
    }

    fn matches(&self, filters: &FilterState, _labels: &LabelIndex) -> bool {
        eq_filter(filters, "provider_id", self.provider_id.as_deref())
            && eq_filter(filters, "category", self.category.as_deref())
            && flag_filter(filters, "is_active", self.is_active)
            && search_hit(
                filters,
                &[
                    self.code.as_deref(),
                    self.description_en.as_deref(),
                    self.description_he.as_deref(),
                    self.category.as_deref(),
                ],
            )
    }

    fn sort_value(&self, field: &str, _labels: &LabelIndex) -> SortValue {
        match field {
            "provider_id" => SortValue::text(self.provider_id.as_deref()),
            "code" => SortValue::text(self.code.as_deref()),
            "description_en" => SortValue::text(self.description_en.as_deref()),
            "description_he" => SortValue::text(self.description_he.as_deref()),
            "category" => SortValue::text(self.category.as_deref()),
            "price" => SortValue::number(self.price),
            "is_active" => SortValue::Bool(self.is_active),
            _ => meta_sort_value(&self.meta, field),
        }
    }

    fn validate_field(&self, field: &str) -> Result<(), ValidationError> {
        match field {
            "provider_id" => validation::required("provider_id", self.provider_id.as_deref()),
            "code" => {
                validation::required("code", self.code.as_deref())?;
                validation::max_len("code", self.code.as_deref(), 20)?;
                validation::pattern(
                    "code",
                    self.code.as_deref(),
                    &CODE_RE,
                    "must be uppercase letters, digits, dots, dashes or underscores",
                )
            }
            "description_en" => {
                validation::bilingual(
                    "description_en",
                    self.description_en.as_deref(),
                    "description_he",
                    self.description_he.as_deref(),
                )?;
                validation::max_len("description_en", self.description_en.as_deref(), 255)
            }
            "description_he" => {
                validation::bilingual(
                    "description_he",
                    self.description_he.as_deref(),
                    "description_en",
                    self.description_en.as_deref(),
                )?;
                validation::max_len("description_he", self.description_he.as_deref(), 255)
            }
            "category" => validation::max_len("category", self.category.as_deref(), 50),
            "price" => validation::in_range("price", self.price, 0.0, 10_000_000.0),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_filter() {
        let mut code = ProviderInternalCode::default_draft();
        code.is_active = false;
        let labels = LabelIndex::new();
        assert!(!code.matches(&FilterState::new().with("is_active", true), &labels));
        assert!(code.matches(&FilterState::new().with("is_active", "false"), &labels));
        assert!(code.matches(&FilterState::new().with("is_active", "all"), &labels));
    }

    #[test]
    fn description_bilingual() {
        let mut code = ProviderInternalCode::default_draft();
        assert!(code.validate_field("description_he").is_err());
        code.description_en = Some("MRI scan".into());
        assert!(code.validate_field("description_he").is_ok());
    }
}
