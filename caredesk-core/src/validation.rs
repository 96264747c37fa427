//! Field validation rules shared by every entity form
//!
//! Rules are plain functions returning `Result<(), ValidationError>` so an
//! entity's `validate_field` reads as a list of checks chained with `?`.

use std::fmt;

use regex::Regex;

use crate::query::parse_date_millis;

/// Validation error for a single draft field
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Required { field: &'static str },

    /// Neither language variant of a bilingual pair is filled in
    BilingualRequired {
        field: &'static str,
        other: &'static str,
    },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// Numeric field outside the accepted range
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    /// Date field that does not parse
    InvalidDate { field: &'static str },

    /// End of a date range falls before its start
    DateOrder {
        field: &'static str,
        start: &'static str,
    },

    /// String doesn't match required format
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },
}

impl ValidationError {
    /// Field the error is attached to in a form's error map.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Required { field }
            | Self::BilingualRequired { field, .. }
            | Self::TooLong { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::InvalidDate { field }
            | Self::DateOrder { field, .. }
            | Self::InvalidFormat { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required { field } => write!(f, "{} is required", field),
            Self::BilingualRequired { field, other } => {
                write!(f, "either {} or {} is required", field, other)
            }
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
            Self::InvalidDate { field } => write!(f, "{} is not a valid date", field),
            Self::DateOrder { field, start } => {
                write!(f, "{} must be on or after {}", field, start)
            }
            Self::InvalidFormat { field, reason } => write!(f, "{}: {}", field, reason),
        }
    }
}

impl std::error::Error for ValidationError {}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Value must be present and non-blank.
pub fn required(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match present(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::Required { field }),
    }
}

/// At least one of the two language variants must be present.
pub fn bilingual(
    field: &'static str,
    value: Option<&str>,
    other: &'static str,
    other_value: Option<&str>,
) -> Result<(), ValidationError> {
    if present(value).is_none() && present(other_value).is_none() {
        return Err(ValidationError::BilingualRequired { field, other });
    }
    Ok(())
}

/// Length is counted in characters, not bytes (Hebrew names are multi-byte).
pub fn max_len(field: &'static str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        _ => Ok(()),
    }
}

pub fn in_range(
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ValidationError::OutOfRange { field, min, max }),
        _ => Ok(()),
    }
}

/// Optional date; when present it must parse.
pub fn date(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match present(value) {
        Some(v) if parse_date_millis(v).is_none() => Err(ValidationError::InvalidDate { field }),
        _ => Ok(()),
    }
}

/// `end` must not precede `start`. Skipped unless both dates parse; the
/// error is reported on the end field.
pub fn date_order(
    field: &'static str,
    start_field: &'static str,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(), ValidationError> {
    let start = present(start).and_then(parse_date_millis);
    let end = present(end).and_then(parse_date_millis);
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(ValidationError::DateOrder {
            field,
            start: start_field,
        }),
        _ => Ok(()),
    }
}

/// Optional value; when present it must match `re`.
pub fn pattern(
    field: &'static str,
    value: Option<&str>,
    re: &Regex,
    reason: &'static str,
) -> Result<(), ValidationError> {
    match present(value) {
        Some(v) if !re.is_match(v) => Err(ValidationError::InvalidFormat { field, reason }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "code",
            max: 10,
        };
        assert_eq!(err.to_string(), "code exceeds maximum length of 10 characters");

        let err = ValidationError::DateOrder {
            field: "valid_to",
            start: "valid_from",
        };
        assert_eq!(err.to_string(), "valid_to must be on or after valid_from");
    }

    #[test]
    fn required_rejects_blank() {
        assert!(required("code", Some("TLV")).is_ok());
        assert_eq!(
            required("code", Some("   ")),
            Err(ValidationError::Required { field: "code" })
        );
        assert!(required("code", None).is_err());
    }

    #[test]
    fn bilingual_needs_one_side() {
        assert!(bilingual("name_en", Some("Haifa"), "name_he", None).is_ok());
        assert!(bilingual("name_en", None, "name_he", Some("חיפה")).is_ok());
        let err = bilingual("name_en", Some(""), "name_he", None).unwrap_err();
        assert_eq!(err.field(), "name_en");
    }

    #[test]
    fn max_len_counts_chars() {
        // 5 Hebrew letters are 10 bytes
        assert!(max_len("name_he", Some("שלומי"), 5).is_ok());
        assert!(max_len("name_he", Some("שלומית"), 5).is_err());
    }

    #[test]
    fn range_bounds_inclusive() {
        assert!(in_range("copay_percent", Some(0.0), 0.0, 100.0).is_ok());
        assert!(in_range("copay_percent", Some(100.0), 0.0, 100.0).is_ok());
        assert!(in_range("copay_percent", Some(100.5), 0.0, 100.0).is_err());
        assert!(in_range("copay_percent", None, 0.0, 100.0).is_ok());
    }

    #[test]
    fn date_order_reports_end_field() {
        let err = date_order("valid_to", "valid_from", Some("2025-06-01"), Some("2025-01-01"))
            .unwrap_err();
        assert_eq!(err.field(), "valid_to");

        assert!(date_order("valid_to", "valid_from", Some("2025-01-01"), Some("2025-01-01")).is_ok());
        assert!(date_order("valid_to", "valid_from", None, Some("2025-01-01")).is_ok());
        assert!(date_order("valid_to", "valid_from", Some("garbage"), Some("2025-01-01")).is_ok());
    }

    #[test]
    fn date_must_parse() {
        assert!(date("valid_from", Some("2024-02-29")).is_ok());
        assert!(date("valid_from", Some("2023-02-29")).is_err());
        assert!(date("valid_from", Some("")).is_ok());
    }
}
