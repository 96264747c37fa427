//! Insured persons

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{eq_filter, meta_sort_value, search_hit, Contact, Entity, RecordMeta, EMAIL_RE, PHONE_RE};
use crate::import::ImportColumn;
use crate::lookup::LabelIndex;
use crate::query::{parse_date_millis, FilterState, SortState, SortValue};
use crate::validation::{self, ValidationError};

/// National id numbers: 5 to 9 digits
static ID_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5,9}$").expect("invalid id number regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonStatus {
    #[default]
    Active,
    Inactive,
}

impl PersonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuredPerson {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<String>,
    #[serde(default)]
    pub status: PersonStatus,
}

impl Entity for InsuredPerson {
    const KEY: &'static str = "insured_person";
    const LABEL: &'static str = "Insured Person";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "full_name",
        "id_number",
        "date_of_birth",
        "gender",
        "status",
    ];
    const FORM_FIELDS: &'static [&'static str] = &[
        "full_name",
        "id_number",
        "date_of_birth",
        "contact.email",
        "contact.phone",
    ];
    const IMPORT_COLUMNS: &'static [ImportColumn] = &[
        ImportColumn::required("full_name", &["Full Name", "full_name", "Name"]),
        ImportColumn::required("id_number", &["ID Number", "id_number", "Teudat Zehut", "National ID"]),
        ImportColumn::optional("date_of_birth", &["Date of Birth", "date_of_birth", "DOB", "Birth Date"]),
        ImportColumn::optional("gender", &["Gender", "gender"]),
        ImportColumn::optional("contact.phone", &["Phone", "phone", "contact.phone"]),
        ImportColumn::optional("contact.email", &["Email", "email", "contact.email"]),
        ImportColumn::optional("address_id", &["Address ID", "address_id"]),
    ];

    fn default_sort() -> SortState {
        SortState::asc("full_name")
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
        self.full_name
            .clone()
            .or_else(|| self.id_number.clone())
            .unwrap_or_default()
    }

    fn matches(&self, filters: &FilterState, _labels: &LabelIndex) -> bool {
        eq_filter(filters, "status", Some(self.status.as_str()))
            && eq_filter(filters, "gender", Some(self.gender.as_str()))
            && search_hit(
                filters,
                &[
                    self.full_name.as_deref(),
                    self.id_number.as_deref(),
                    self.contact.phone.as_deref(),
                    self.contact.email.as_deref(),
                ],
            )
    }

    fn sort_value(&self, field: &str, _labels: &LabelIndex) -> SortValue {
        match field {
            "full_name" => SortValue::text(self.full_name.as_deref()),
            "id_number" => SortValue::text(self.id_number.as_deref()),
            "date_of_birth" => SortValue::date(self.date_of_birth.as_deref()),
            "gender" => SortValue::text(Some(self.gender.as_str())),
            "status" => SortValue::text(Some(self.status.as_str())),
            _ => meta_sort_value(&self.meta, field),
        }
    }

    fn validate_field(&self, field: &str) -> Result<(), ValidationError> {
        match field {
            "full_name" => {
                validation::required("full_name", self.full_name.as_deref())?;
                validation::max_len("full_name", self.full_name.as_deref(), 120)
            }
            "id_number" => {
                validation::required("id_number", self.id_number.as_deref())?;
                validation::pattern(
                    "id_number",
                    self.id_number.as_deref(),
                    &ID_NUMBER_RE,
                    "must be 5 to 9 digits",
                )
            }
            "date_of_birth" => {
                validation::date("date_of_birth", self.date_of_birth.as_deref())?;
                let born = self.date_of_birth.as_deref().and_then(parse_date_millis);
                match born {
                    Some(ms) if ms > chrono::Utc::now().timestamp_millis() => {
                        Err(ValidationError::InvalidFormat {
                            field: "date_of_birth",
                            reason: "cannot be in the future",
                        })
                    }
                    _ => Ok(()),
                }
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
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_birth_date_rejected() {
        let person = InsuredPerson {
            date_of_birth: Some("2999-01-01".into()),
            ..InsuredPerson::default()
        };
        assert!(person.validate_field("date_of_birth").is_err());
    }

    #[test]
    fn id_number_digits_only() {
        let mut person = InsuredPerson::default_draft();
        person.id_number = Some("12-345".into());
        assert!(person.validate_field("id_number").is_err());
        person.id_number = Some("012345678".into());
        assert!(person.validate_field("id_number").is_ok());
    }

    #[test]
    fn gender_filter() {
        let person = InsuredPerson {
            gender: Gender::Female,
            ..InsuredPerson::default()
        };
        let labels = LabelIndex::new();
        assert!(person.matches(&FilterState::new().with("gender", "female"), &labels));
        assert!(!person.matches(&FilterState::new().with("gender", "male"), &labels));
        assert!(person.matches(&FilterState::new().with("gender", "all"), &labels));
    }
}
