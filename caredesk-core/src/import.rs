//! Bulk import of entity rows from CSV, JSON arrays or NDJSON
//!
//! Rows are read as (header, raw text) pairs, matched against each entity's
//! column aliases and turned into creation drafts. Rows missing a required
//! column, rejecting a value's type, or failing field validation are dropped
//! and counted in the [`ImportSummary`].

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::entity::{apply_assignments, Entity};
use crate::error::{CoreError, Result};

/// One source row: headers paired with raw cell text, in file order.
pub type RawRow = Vec<(String, String)>;

/// Maps source headers onto one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportColumn {
    /// Target field, dotted for nested objects
    pub field: &'static str,
    /// Recognised headers, compared case-insensitively
    pub aliases: &'static [&'static str],
    pub required: bool,
}

impl ImportColumn {
    pub const fn required(field: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            field,
            aliases,
            required: true,
        }
    }

    pub const fn optional(field: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            field,
            aliases,
            required: false,
        }
    }

    pub fn matches_header(&self, header: &str) -> bool {
        let header = header.trim();
        header.eq_ignore_ascii_case(self.field)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(header))
    }

    /// First non-empty cell under any recognised header.
    fn pick<'a>(&self, row: &'a RawRow) -> Option<&'a str> {
        row.iter()
            .filter(|(header, _)| self.matches_header(header))
            .map(|(_, value)| value.trim())
            .find(|value| !value.is_empty())
    }
}

/// Why a row was left out of the create batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub accepted: usize,
    pub missing_required: usize,
    pub invalid: usize,
}

impl ImportSummary {
    pub fn dropped(&self) -> usize {
        self.missing_required + self.invalid
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} rows accepted", self.accepted, self.total)?;
        if self.dropped() > 0 {
            write!(
                f,
                " ({} missing required fields, {} invalid)",
                self.missing_required, self.invalid
            )?;
        }
        Ok(())
    }
}

/// Mapped drafts ready for `bulk_create`, with per-row diagnostics.
#[derive(Debug, Clone)]
pub struct ImportBatch<E> {
    pub records: Vec<E>,
    pub summary: ImportSummary,
    pub issues: Vec<RowIssue>,
}

/// Map raw rows onto `E` drafts.
pub fn map_rows<E: Entity>(rows: &[RawRow]) -> ImportBatch<E> {
    let mut summary = ImportSummary {
        total: rows.len(),
        ..ImportSummary::default()
    };
    let mut records = Vec::with_capacity(rows.len());
    let mut issues = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        match map_row::<E>(row) {
            Ok(record) => {
                summary.accepted += 1;
                records.push(record);
            }
            Err(RowError::Missing(field)) => {
                summary.missing_required += 1;
                issues.push(RowIssue {
                    row: row_number,
                    reason: format!("missing required column '{field}'"),
                });
            }
            Err(RowError::Invalid(reason)) => {
                summary.invalid += 1;
                issues.push(RowIssue {
                    row: row_number,
                    reason,
                });
            }
        }
    }

    debug!(entity = E::KEY, %summary, "mapped import rows");
    ImportBatch {
        records,
        summary,
        issues,
    }
}

enum RowError {
    Missing(&'static str),
    Invalid(String),
}

fn map_row<E: Entity>(row: &RawRow) -> std::result::Result<E, RowError> {
    let mut assignments = Vec::with_capacity(E::IMPORT_COLUMNS.len());
    for column in E::IMPORT_COLUMNS {
        match column.pick(row) {
            Some(value) => assignments.push((column.field.to_owned(), value.to_owned())),
            None if column.required => return Err(RowError::Missing(column.field)),
            None => {}
        }
    }

    let record = apply_assignments(&E::default_draft(), &assignments)
        .map_err(|e| RowError::Invalid(e.to_string()))?;

    for field in E::FORM_FIELDS {
        record
            .validate_field(field)
            .map_err(|e| RowError::Invalid(e.to_string()))?;
    }
    Ok(record)
}

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Json,
    Ndjson,
}

impl ImportFormat {
    /// Guess from the file extension; anything unknown is treated as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            Some("ndjson") | Some("jsonl") => Self::Ndjson,
            _ => Self::Csv,
        }
    }
}

/// Read every row from `path`, picking the parser from its extension.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
    let format = ImportFormat::from_path(path);
    let rows = match format {
        ImportFormat::Csv => {
            let file = fs::File::open(path)?;
            parse_csv(file).map_err(|e| CoreError::import(path, e))?
        }
        ImportFormat::Json | ImportFormat::Ndjson => {
            let text = fs::read_to_string(path)?;
            parse_json(&text).map_err(|e| CoreError::import(path, e))?
        }
    };
    info!(path = %path.display(), ?format, rows = rows.len(), "read import file");
    Ok(rows)
}

/// Parse CSV with a header row. Blank lines are skipped.
pub fn parse_csv<R: Read>(reader: R) -> std::result::Result<Vec<RawRow>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| format!("cannot read header row: {e}"))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("malformed CSV: {e}"))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_owned(), v.to_owned()))
                .collect(),
        );
    }
    Ok(rows)
}

/// Parse a JSON array of objects, falling back to one object per line.
pub fn parse_json(text: &str) -> std::result::Result<Vec<RawRow>, String> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<Value> =
            serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON array: {e}"))?;
        return values.iter().map(object_row).collect();
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let value: Value = serde_json::from_str(line)
                .map_err(|e| format!("invalid JSON on line {}: {e}", n + 1))?;
            object_row(&value)
        })
        .collect()
}

/// Flatten one JSON object into dotted headers and text cells.
fn object_row(value: &Value) -> std::result::Result<RawRow, String> {
    let Value::Object(map) = value else {
        return Err("each row must be a JSON object".to_owned());
    };
    let mut row = Vec::new();
    for (key, value) in map {
        flatten_into(&mut row, key.clone(), value);
    }
    Ok(row)
}

fn flatten_into(row: &mut RawRow, prefix: String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => row.push((prefix, s.clone())),
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(row, format!("{prefix}.{key}"), nested);
            }
        }
        other => row.push((prefix, other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{City, Contract, InsuredPerson};

    #[test]
    fn csv_headers_match_aliases_case_insensitively() {
        let data = "NAME (ENGLISH),name (hebrew),Code\nTel Aviv,תל אביב,TLV\nHaifa,,HFA\n";
        let rows = parse_csv(data.as_bytes()).unwrap();
        let batch = map_rows::<City>(&rows);

        assert_eq!(batch.summary.accepted, 2);
        assert_eq!(batch.records[0].name_en.as_deref(), Some("Tel Aviv"));
        assert_eq!(batch.records[0].name_he.as_deref(), Some("תל אביב"));
        assert_eq!(batch.records[1].code.as_deref(), Some("HFA"));
        assert_eq!(batch.records[1].name_he, None);
    }

    #[test]
    fn rows_missing_required_columns_are_dropped() {
        let data = "name_en,code\nJerusalem,JLM\nBeersheba,\n\nEilat,ETH\n";
        let rows = parse_csv(data.as_bytes()).unwrap();
        let batch = map_rows::<City>(&rows);

        assert_eq!(batch.summary.total, 3);
        assert_eq!(batch.summary.accepted, 2);
        assert_eq!(batch.summary.missing_required, 1);
        assert_eq!(batch.issues[0].row, 2);
        assert_eq!(
            batch.summary.to_string(),
            "2 of 3 rows accepted (1 missing required fields, 0 invalid)"
        );
    }

    #[test]
    fn rows_failing_validation_are_dropped() {
        let data = "name_en,code\nNazareth,naz\n";
        let rows = parse_csv(data.as_bytes()).unwrap();
        let batch = map_rows::<City>(&rows);
        assert_eq!(batch.summary.invalid, 1);
        assert!(batch.records.is_empty());
    }

    #[test]
    fn json_array_with_nested_objects() {
        let text = r#"[
            {"contract_number": "C-1", "name_en": "Clalit", "valid_from": "2024-01-01",
             "contact": {"email": "ops@clalit.example"}},
            {"name_en": "No number"}
        ]"#;
        let rows = parse_json(text).unwrap();
        let batch = map_rows::<Contract>(&rows);
        assert_eq!(batch.summary.accepted, 1);
        assert_eq!(batch.summary.missing_required, 1);
        assert_eq!(
            batch.records[0].contact.email.as_deref(),
            Some("ops@clalit.example")
        );
    }

    #[test]
    fn ndjson_lines() {
        let text = "{\"Full Name\":\"Dana Levi\",\"ID Number\":\"123456789\"}\n\n{\"Full Name\":\"Noa\",\"ID Number\":12345}\n";
        let rows = parse_json(text).unwrap();
        let batch = map_rows::<InsuredPerson>(&rows);
        assert_eq!(batch.summary.accepted, 2);
        assert_eq!(batch.records[1].id_number.as_deref(), Some("12345"));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ImportFormat::from_path(Path::new("a.CSV")), ImportFormat::Csv);
        assert_eq!(ImportFormat::from_path(Path::new("a.json")), ImportFormat::Json);
        assert_eq!(ImportFormat::from_path(Path::new("a.jsonl")), ImportFormat::Ndjson);
    }

    #[test]
    fn read_rows_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cities.csv");
        fs::write(&path, "code,name_en\nTLV,Tel Aviv\n").unwrap();
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], ("code".to_owned(), "TLV".to_owned()));
    }
}
