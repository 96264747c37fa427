//! Insurance policies held by insured persons

use serde::{Deserialize, Serialize};

use super::{eq_filter, meta_sort_value, search_hit, CoverageRules, Entity, InsuredPerson, RecordMeta};
use crate::import::ImportColumn;
use crate::lookup::LabelIndex;
use crate::query::{FilterState, SortValue};
use crate::validation::{self, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    #[default]
    Pending,
    Active,
    Cancelled,
    Expired,
}

impl PolicyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insured_person_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_type: Option<String>,
    #[serde(default)]
    pub status: PolicyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium: Option<f64>,
    #[serde(default)]
    pub coverage_rules: CoverageRules,
}

impl Entity for Policy {
    const KEY: &'static str = "policy";
    const LABEL: &'static str = "Policy";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "policy_number",
        "insured_person_id",
        "coverage_type",
        "status",
        "start_date",
        "end_date",
        "premium",
    ];
    const FORM_FIELDS: &'static [&'static str] = &[
        "policy_number",
        "insured_person_id",
        "start_date",
        "end_date",
        "premium",
        "coverage_rules.copay_percent",
    ];
    const IMPORT_COLUMNS: &'static [ImportColumn] = &[
        ImportColumn::required("policy_number", &["Policy Number", "policy_number", "Number"]),
        ImportColumn::required("insured_person_id", &["Insured Person ID", "insured_person_id", "Insured"]),
        ImportColumn::optional("contract_id", &["Contract ID", "contract_id"]),
        ImportColumn::optional("coverage_type", &["Coverage Type", "coverage_type", "Coverage"]),
        ImportColumn::optional("status", &["Status", "status"]),
        ImportColumn::optional("start_date", &["Start Date", "start_date"]),
        ImportColumn::optional("end_date", &["End Date", "end_date"]),
        ImportColumn::optional("premium", &["Premium", "premium", "Monthly Premium"]),
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn default_draft() -> Self {
        Self {
            start_date: Some(chrono::Utc::now().date_naive().to_string()),
            ..Self::default()
        }
    }

    fn label(&self) -> String {
        self.policy_number.clone().unwrap_or_default()
    }

    fn matches(&self, filters: &FilterState, labels: &LabelIndex) -> bool {
        let insured = self
            .insured_person_id
            .as_deref()
            .and_then(|id| labels.label(InsuredPerson::KEY, id));
        eq_filter(filters, "status", Some(self.status.as_str()))
            && eq_filter(filters, "insured_person_id", self.insured_person_id.as_deref())
            && eq_filter(filters, "coverage_type", self.coverage_type.as_deref())
            && search_hit(
                filters,
                &[
                    self.policy_number.as_deref(),
                    self.coverage_type.as_deref(),
                    insured,
                ],
            )
    }

    fn sort_value(&self, field: &str, labels: &LabelIndex) -> SortValue {
        match field {
            "policy_number" => SortValue::text(self.policy_number.as_deref()),
            "insured_person_id" | "insured_person" => {
                labels.sort_value(InsuredPerson::KEY, self.insured_person_id.as_deref())
            }
            "coverage_type" => SortValue::text(self.coverage_type.as_deref()),
            "status" => SortValue::text(Some(self.status.as_str())),
            "start_date" => SortValue::date(self.start_date.as_deref()),
            "end_date" => SortValue::date(self.end_date.as_deref()),
            "premium" => SortValue::number(self.premium),
            _ => meta_sort_value(&self.meta, field),
        }
    }

    fn validate_field(&self, field: &str) -> Result<(), ValidationError> {
        match field {
            "policy_number" => {
                validation::required("policy_number", self.policy_number.as_deref())?;
                validation::max_len("policy_number", self.policy_number.as_deref(), 50)
            }
            "insured_person_id" => {
                validation::required("insured_person_id", self.insured_person_id.as_deref())
            }
            "start_date" => validation::date("start_date", self.start_date.as_deref()),
            "end_date" => {
                validation::date("end_date", self.end_date.as_deref())?;
                validation::date_order(
                    "end_date",
                    "start_date",
                    self.start_date.as_deref(),
                    self.end_date.as_deref(),
                )
            }
            "premium" => validation::in_range("premium", self.premium, 0.0, 1_000_000.0),
            "coverage_rules.copay_percent" => validation::in_range(
                "coverage_rules.copay_percent",
                self.coverage_rules.copay_percent,
                0.0,
                100.0,
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{apply_sort, SortState};

    fn policy(id: &str, person: &str) -> Policy {
        Policy {
            meta: RecordMeta {
                id: Some(id.into()),
                ..Default::default()
            },
            insured_person_id: Some(person.into()),
            ..Policy::default()
        }
    }

    #[test]
    fn sorts_by_insured_person_name() {
        let mut labels = LabelIndex::new();
        labels.insert(InsuredPerson::KEY, "p1", "Yossi Cohen");
        labels.insert(InsuredPerson::KEY, "p2", "avi Ben-David");
        labels.insert(InsuredPerson::KEY, "p3", "Miriam Katz");

        let items = vec![policy("x", "p1"), policy("y", "p2"), policy("z", "p3")];
        let sorted = apply_sort(items, &SortState::asc("insured_person_id"), &labels);
        let ids: Vec<_> = sorted.iter().filter_map(|p| p.id()).collect();
        assert_eq!(ids, vec!["y", "z", "x"]);
    }

    #[test]
    fn end_before_start_fails_on_end_date() {
        let p = Policy {
            start_date: Some("2025-05-01".into()),
            end_date: Some("2025-04-30".into()),
            ..Policy::default()
        };
        let err = p.validate_field("end_date").unwrap_err();
        assert_eq!(err.field(), "end_date");
    }

    #[test]
    fn negative_premium_rejected() {
        let p = Policy {
            premium: Some(-1.0),
            ..Policy::default()
        };
        assert!(p.validate_field("premium").is_err());
    }
}
