//! Insurance contracts with providers

use serde::{Deserialize, Serialize};

use super::{
    eq_filter, meta_sort_value, search_hit, Contact, CoverageRules, Entity, RecordMeta, EMAIL_RE,
    PHONE_RE,
};
use crate::import::ImportColumn;
use crate::lookup::LabelIndex;
use crate::query::{FilterState, SortValue};
use crate::validation::{self, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    #[default]
    Draft,
    Active,
    Suspended,
    Expired,
    Terminated,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_he: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub status: ContractStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<String>,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default)]
    pub coverage_rules: CoverageRules,
}

impl Entity for Contract {
    const KEY: &'static str = "contract";
    const LABEL: &'static str = "Contract";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "contract_number",
        "name_en",
        "status",
        "valid_from",
        "valid_to",
    ];
    const FORM_FIELDS: &'static [&'static str] = &[
        "contract_number",
        "name_en",
        "name_he",
        "valid_from",
        "valid_to",
        "contact.email",
        "contact.phone",
        "coverage_rules.copay_percent",
        "coverage_rules.max_amount",
    ];
    const IMPORT_COLUMNS: &'static [ImportColumn] = &[
        ImportColumn::required("contract_number", &["Contract Number", "contract_number", "Number"]),
        ImportColumn::optional("name_en", &["Name (English)", "name_en", "Name"]),
        ImportColumn::optional("name_he", &["Name (Hebrew)", "name_he"]),
        ImportColumn::optional("provider_id", &["Provider ID", "provider_id", "Provider"]),
        ImportColumn::optional("status", &["Status", "status"]),
        ImportColumn::required("valid_from", &["Valid From", "valid_from", "Start Date"]),
        ImportColumn::optional("valid_to", &["Valid To", "valid_to", "End Date"]),
        ImportColumn::optional("contact.phone", &["Phone", "contact_phone", "contact.phone"]),
        ImportColumn::optional("contact.email", &["Email", "contact_email", "contact.email"]),
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn default_draft() -> Self {
        Self {
            valid_from: Some(chrono::Utc::now().date_naive().to_string()),
            ..Self::default()
        }
    }

    fn label(&self) -> String {
        self.name_en
            .clone()
            .or_else(|| self.name_he.clone())
            .or_else(|| self.contract_number.clone())
            .unwrap_or_default()
    }

    fn matches(&self, filters: &FilterState, _labels: &LabelIndex) -> bool {
        eq_filter(filters, "status", Some(self.status.as_str()))
            && eq_filter(filters, "provider_id", self.provider_id.as_deref())
            && search_hit(
                filters,
                &[
                    self.contract_number.as_deref(),
                    self.name_en.as_deref(),
                    self.name_he.as_deref(),
                    self.contact.contact_name.as_deref(),
                ],
            )
    }

    fn sort_value(&self, field: &str, _labels: &LabelIndex) -> SortValue {
        match field {
            "contract_number" => SortValue::text(self.contract_number.as_deref()),
            "name_en" => SortValue::text(self.name_en.as_deref()),
            "name_he" => SortValue::text(self.name_he.as_deref()),
            "status" => SortValue::text(Some(self.status.as_str())),
            "valid_from" => SortValue::date(self.valid_from.as_deref()),
            "valid_to" => SortValue::date(self.valid_to.as_deref()),
            _ => meta_sort_value(&self.meta, field),
        }
    }

    fn validate_field(&self, field: &str) -> Result<(), ValidationError> {
        match field {
            "contract_number" => {
                validation::required("contract_number", self.contract_number.as_deref())?;
                validation::max_len("contract_number", self.contract_number.as_deref(), 50)
            }
            "name_en" => validation::bilingual(
                "name_en",
                self.name_en.as_deref(),
                "name_he",
                self.name_he.as_deref(),
            ),
            "name_he" => validation::bilingual(
                "name_he",
                self.name_he.as_deref(),
                "name_en",
                self.name_en.as_deref(),
            ),
            "valid_from" => {
                validation::required("valid_from", self.valid_from.as_deref())?;
                validation::date("valid_from", self.valid_from.as_deref())
            }
            "valid_to" => {
                validation::date("valid_to", self.valid_to.as_deref())?;
                validation::date_order(
                    "valid_to",
                    "valid_from",
                    self.valid_from.as_deref(),
                    self.valid_to.as_deref(),
                )
            }
            "contact.email" => validation::pattern(
                "contact.email",
                self.contact.email.as_deref(),
                &EMAIL_RE,
                "must be a valid email address",
            ),
            "contact.phone" => validation::pattern(
                "contact.phone",
                self.contact.phone.as_deref(),
                &PHONE_RE,
                "must be a valid phone number",
            ),
            "coverage_rules.copay_percent" => validation::in_range(
                "coverage_rules.copay_percent",
                self.coverage_rules.copay_percent,
                0.0,
                100.0,
            ),
            "coverage_rules.max_amount" => validation::in_range(
                "coverage_rules.max_amount",
                self.coverage_rules.max_amount,
                0.0,
                1_000_000_000.0,
            ),
            _ => Ok(()),
        }
    }
}
