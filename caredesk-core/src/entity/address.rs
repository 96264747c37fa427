//! Cities, streets and addresses

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
    default_true, eq_filter, flag_filter, meta_sort_value, search_hit, Entity, RecordMeta, CODE_RE,
};
use crate::import::ImportColumn;
use crate::lookup::LabelIndex;
use crate::query::{FilterState, SortState, SortValue};
use crate::validation::{self, ValidationError};

const MAX_NAME_LEN: usize = 100;
const MAX_CODE_LEN: usize = 10;

static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{5,7}$").expect("invalid zip regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_he: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

fn validate_names(
    field: &'static str,
    name_en: Option<&str>,
    name_he: Option<&str>,
) -> Result<(), ValidationError> {
    match field {
        "name_en" => {
            validation::bilingual("name_en", name_en, "name_he", name_he)?;
            validation::max_len("name_en", name_en, MAX_NAME_LEN)
        }
        "name_he" => {
            validation::bilingual("name_he", name_he, "name_en", name_en)?;
            validation::max_len("name_he", name_he, MAX_NAME_LEN)
        }
        _ => Ok(()),
    }
}

impl Entity for City {
    const KEY: &'static str = "city";
    const LABEL: &'static str = "City";
    const COLUMNS: &'static [&'static str] = &["id", "code", "name_en", "name_he"];
    const FORM_FIELDS: &'static [&'static str] = &["name_en", "name_he", "code"];
    const IMPORT_COLUMNS: &'static [ImportColumn] = &[
        ImportColumn::optional("name_en", &["Name (English)", "English Name", "name_en", "name"]),
        ImportColumn::optional("name_he", &["Name (Hebrew)", "Hebrew Name", "name_he", "שם"]),
        ImportColumn::required("code", &["Code", "City Code", "code"]),
    ];

    fn default_sort() -> SortState {
        SortState::asc("name_en")
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn default_draft() -> Self {
        Self::default()
    }

    fn label(&self) -> String {
        self.name_en
            .clone()
            .or_else(|| self.name_he.clone())
            .or_else(|| self.code.clone())
            .unwrap_or_default()
    }

    fn matches(&self, filters: &FilterState, _labels: &LabelIndex) -> bool {
        search_hit(
            filters,
            &[
                self.name_en.as_deref(),
                self.name_he.as_deref(),
                self.code.as_deref(),
            ],
        )
    }

    fn sort_value(&self, field: &str, _labels: &LabelIndex) -> SortValue {
        match field {
            "name_en" => SortValue::text(self.name_en.as_deref()),
            "name_he" => SortValue::text(self.name_he.as_deref()),
            "code" => SortValue::text(self.code.as_deref()),
            _ => meta_sort_value(&self.meta, field),
        }
    }

    fn validate_field(&self, field: &str) -> Result<(), ValidationError> {
        match field {
            "name_en" => validate_names("name_en", self.name_en.as_deref(), self.name_he.as_deref()),
            "name_he" => validate_names("name_he", self.name_en.as_deref(), self.name_he.as_deref()),
            "code" => {
                validation::required("code", self.code.as_deref())?;
                validation::max_len("code", self.code.as_deref(), MAX_CODE_LEN)?;
                validation::pattern(
                    "code",
                    self.code.as_deref(),
                    &CODE_RE,
                    "must be uppercase letters, digits, dots, dashes or underscores",
                )
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Street {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_he: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Entity for Street {
    const KEY: &'static str = "street";
    const LABEL: &'static str = "Street";
    const COLUMNS: &'static [&'static str] = &["id", "city_id", "name_en", "name_he", "code"];
    const FORM_FIELDS: &'static [&'static str] = &["city_id", "name_en", "name_he", "code"];
    const IMPORT_COLUMNS: &'static [ImportColumn] = &[
        ImportColumn::required("city_id", &["City ID", "city_id", "City"]),
        ImportColumn::optional("name_en", &["Name (English)", "English Name", "name_en", "name"]),
        ImportColumn::optional("name_he", &["Name (Hebrew)", "Hebrew Name", "name_he"]),
        ImportColumn::optional("code", &["Code", "Street Code", "code"]),
    ];

    fn default_sort() -> SortState {
        SortState::asc("name_en")
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn default_draft() -> Self {
        Self::default()
    }

    fn label(&self) -> String {
        self.name_en
            .clone()
            .or_else(|| self.name_he.clone())
            .unwrap_or_default()
    }

    fn matches(&self, filters: &FilterState, labels: &LabelIndex) -> bool {
        let city = self
            .city_id
            .as_deref()
            .and_then(|id| labels.label(City::KEY, id));
        eq_filter(filters, "city_id", self.city_id.as_deref())
            && search_hit(
                filters,
                &[
                    self.name_en.as_deref(),
                    self.name_he.as_deref(),
                    self.code.as_deref(),
                    city,
                ],
            )
    }

    fn sort_value(&self, field: &str, labels: &LabelIndex) -> SortValue {
        match field {
            "city_id" => labels.sort_value(City::KEY, self.city_id.as_deref()),
            "name_en" => SortValue::text(self.name_en.as_deref()),
            "name_he" => SortValue::text(self.name_he.as_deref()),
            "code" => SortValue::text(self.code.as_deref()),
            _ => meta_sort_value(&self.meta, field),
        }
    }

    fn validate_field(&self, field: &str) -> Result<(), ValidationError> {
        match field {
            "city_id" => validation::required("city_id", self.city_id.as_deref()),
            "name_en" => validate_names("name_en", self.name_en.as_deref(), self.name_he.as_deref()),
            "name_he" => validate_names("name_he", self.name_en.as_deref(), self.name_he.as_deref()),
            "code" => validation::max_len("code", self.code.as_deref(), MAX_CODE_LEN),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Entity for Address {
    const KEY: &'static str = "address";
    const LABEL: &'static str = "Address";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "city_id",
        "street_id",
        "house_number",
        "apartment",
        "zip_code",
        "is_active",
    ];
    const FORM_FIELDS: &'static [&'static str] =
        &["city_id", "street_id", "house_number", "apartment", "zip_code", "notes"];
    const IMPORT_COLUMNS: &'static [ImportColumn] = &[
        ImportColumn::required("city_id", &["City ID", "city_id", "City"]),
        ImportColumn::optional("street_id", &["Street ID", "street_id", "Street"]),
        ImportColumn::required("house_number", &["House Number", "house_number", "Number"]),
        ImportColumn::optional("apartment", &["Apartment", "apartment", "Apt"]),
        ImportColumn::optional("zip_code", &["Zip Code", "zip_code", "Zip", "Postal Code"]),
        ImportColumn::optional("notes", &["Notes", "notes"]),
        ImportColumn::optional("is_active", &["Active", "is_active"]),
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn default_draft() -> Self {
        Self {
            meta: RecordMeta::default(),
            city_id: None,
            street_id: None,
            house_number: None,
            apartment: None,
            zip_code: None,
            notes: None,
            is_active: true,
        }
    }

    fn label(&self) -> String {
        match (&self.house_number, &self.apartment) {
            (Some(house), Some(apt)) => format!("{house}/{apt}"),
            (Some(house), None) => house.clone(),
            _ => self.meta.id.clone().unwrap_or_default(),
        }
    }

    fn matches(&self, filters: &FilterState, labels: &LabelIndex) -> bool {
        let city = self
            .city_id
            .as_deref()
            .and_then(|id| labels.label(City::KEY, id));
        let street = self
            .street_id
            .as_deref()
            .and_then(|id| labels.label(Street::KEY, id));

        eq_filter(filters, "city_id", self.city_id.as_deref())
            && eq_filter(filters, "street_id", self.street_id.as_deref())
            && flag_filter(filters, "is_active", self.is_active)
            && search_hit(
                filters,
                &[
                    self.house_number.as_deref(),
                    self.zip_code.as_deref(),
                    self.notes.as_deref(),
                    city,
                    street,
                ],
            )
    }

    fn sort_value(&self, field: &str, labels: &LabelIndex) -> SortValue {
        match field {
            "city_id" => labels.sort_value(City::KEY, self.city_id.as_deref()),
            "street_id" => labels.sort_value(Street::KEY, self.street_id.as_deref()),
            "house_number" => SortValue::text(self.house_number.as_deref()),
            "zip_code" => SortValue::text(self.zip_code.as_deref()),
            "is_active" => SortValue::Bool(self.is_active),
            _ => meta_sort_value(&self.meta, field),
        }
    }

    fn validate_field(&self, field: &str) -> Result<(), ValidationError> {
        match field {
            "city_id" => validation::required("city_id", self.city_id.as_deref()),
            "house_number" => {
                validation::required("house_number", self.house_number.as_deref())?;
                validation::max_len("house_number", self.house_number.as_deref(), 10)
            }
            "apartment" => validation::max_len("apartment", self.apartment.as_deref(), 10),
            "zip_code" => validation::pattern(
                "zip_code",
                self.zip_code.as_deref(),
                &ZIP_RE,
                "must be 5 to 7 digits",
            ),
            "notes" => validation::max_len("notes", self.notes.as_deref(), 500),
            _ => Ok(()),
        }
    }
}
