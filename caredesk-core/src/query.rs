//! Client-side filtering, sorting and pagination
//!
//! All three operate on collections already held in memory: filtering is a
//! full linear scan with the entity's predicate, sorting is a stable sort on
//! keys resolved once per item, pagination is a slice.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::lookup::LabelIndex;

/// Maximum items per page
pub const MAX_PER_PAGE: u32 = 100;

/// Default items per page
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Sentinel meaning "do not filter on this key"
pub const ALL: &str = "all";

/// Key holding the free-text search term
pub const SEARCH_KEY: &str = "search";

/// A single filter value as persisted by the views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Filter key → value. Missing keys, `"all"` and empty strings are neutral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterState(BTreeMap<String, FilterValue>);

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    /// Active string value for `key`, `None` when the filter is neutral.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(FilterValue::Text(s)) if !s.is_empty() && s != ALL => Some(s.as_str()),
            _ => None,
        }
    }

    /// Active boolean value for `key`; accepts `"true"`/`"false"` strings.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(FilterValue::Bool(b)) => Some(*b),
            Some(FilterValue::Text(s)) => match s.as_str() {
                "true" | "active" | "yes" => Some(true),
                "false" | "inactive" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(FilterValue::Number(n)) => Some(*n),
            Some(FilterValue::Text(s)) => s.parse().ok(),
            _ => None,
        }
    }

    /// Lowercased search term, if any.
    pub fn search(&self) -> Option<String> {
        self.text(SEARCH_KEY)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    /// True when no key would exclude anything.
    pub fn is_neutral(&self) -> bool {
        self.0.values().all(|v| match v {
            FilterValue::Text(s) => s.is_empty() || s == ALL,
            _ => false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// One (field, direction) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    #[serde(alias = "key")]
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortState {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Gateway sort spec: `field` or `-field`.
    pub fn to_spec(&self) -> String {
        match self.direction {
            SortDirection::Asc => self.field.clone(),
            SortDirection::Desc => format!("-{}", self.field),
        }
    }

    pub fn from_spec(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(spec),
        }
    }
}

/// Comparable key resolved from one record field.
///
/// `Missing` orders before everything else, so absent or unparsable values
/// come first ascending and last descending.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Missing,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SortValue {
    /// Case-insensitive text key.
    pub fn text(value: Option<&str>) -> Self {
        match value {
            Some(s) => Self::Text(s.to_lowercase()),
            None => Self::Missing,
        }
    }

    pub fn number(value: Option<f64>) -> Self {
        match value {
            Some(n) if n.is_finite() => Self::Number(n),
            _ => Self::Missing,
        }
    }

    /// Date parsed to epoch millis.
    pub fn date(value: Option<&str>) -> Self {
        match value.and_then(parse_date_millis) {
            Some(ms) => Self::Number(ms as f64),
            None => Self::Missing,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::Text(_) => 3,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Parse an ISO date, date-time or RFC 3339 timestamp to epoch millis.
pub fn parse_date_millis(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Keep the items matching the entity predicate. Pure.
pub fn apply_filters<E: Entity>(items: &[E], filters: &FilterState, labels: &LabelIndex) -> Vec<E> {
    items
        .iter()
        .filter(|item| item.matches(filters, labels))
        .cloned()
        .collect()
}

/// Stable sort on the entity's resolved key for `sort.field`.
pub fn apply_sort<E: Entity>(items: Vec<E>, sort: &SortState, labels: &LabelIndex) -> Vec<E> {
    let mut keyed: Vec<(SortValue, E)> = items
        .into_iter()
        .map(|item| (item.sort_value(&sort.field, labels), item))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match sort.direction {
        SortDirection::Asc => a.compare(b),
        SortDirection::Desc => b.compare(a),
    });

    keyed.into_iter().map(|(_, item)| item).collect()
}

/// Number of pages for `total` items; an empty set still has one page.
pub fn total_pages(total: usize, per_page: u32) -> u32 {
    let per_page = per_page.max(1) as usize;
    total.div_ceil(per_page).max(1) as u32
}

/// Clamp `page` into `[1, total_pages]`.
pub fn clamp_page(page: u32, total: usize, per_page: u32) -> u32 {
    page.clamp(1, total_pages(total, per_page))
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page (max 100)
    pub per_page: u32,
}

impl Pagination {
    /// Create pagination with validation.
    ///
    /// - Page is clamped to minimum of 1
    /// - Per page is clamped to 1..=100
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1) * self.per_page) as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of a filtered, sorted collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: usize,
    /// Current page number (after clamping)
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// Slice one page out of `items`, clamping the requested page.
pub fn paginate<T: Clone>(items: &[T], pagination: Pagination) -> Page<T> {
    let clamped = Pagination::new(pagination.page, pagination.per_page);
    let page = clamp_page(clamped.page, items.len(), clamped.per_page);
    let clamped = Pagination { page, ..clamped };

    Page {
        items: items
            .iter()
            .skip(clamped.offset())
            .take(clamped.per_page as usize)
            .cloned()
            .collect(),
        total: items.len(),
        page,
        per_page: clamped.per_page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page() {
        let p = Pagination::new(0, 10);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn clamps_per_page() {
        let p = Pagination::new(1, 0);
        assert_eq!(p.per_page, 1);

        let p = Pagination::new(1, 999);
        assert_eq!(p.per_page, 100);
    }

    #[test]
    fn total_pages_counts() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(100, 10), 10);
    }

    #[test]
    fn paginate_clamps_past_last_page() {
        let items: Vec<u32> = (0..25).collect();
        let page = paginate(&items, Pagination::new(9, 10));
        assert_eq!(page.page, 3);
        assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(page.total, 25);
        assert!(!page.has_next());
        assert!(page.has_prev());
    }

    #[test]
    fn neutral_filters() {
        let filters = FilterState::new().with("city_id", ALL).with("search", "");
        assert!(filters.is_neutral());
        assert_eq!(filters.text("city_id"), None);
        assert_eq!(filters.search(), None);

        let filters = filters.with("city_id", "c1");
        assert!(!filters.is_neutral());
        assert_eq!(filters.text("city_id"), Some("c1"));
    }

    #[test]
    fn filter_state_round_trips() {
        let filters = FilterState::new()
            .with("status", "active")
            .with("is_active", true)
            .with("search", "Tel")
            .with("min_premium", FilterValue::Number(120.5));
        let json = serde_json::to_string(&filters).unwrap();
        let back: FilterState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filters);
    }

    #[test]
    fn sort_spec_round_trip() {
        assert_eq!(SortState::desc("created_date").to_spec(), "-created_date");
        assert_eq!(SortState::from_spec("-created_date"), SortState::desc("created_date"));
        assert_eq!(SortState::from_spec("code"), SortState::asc("code"));
    }

    #[test]
    fn sort_config_accepts_key_alias() {
        let sort: SortState = serde_json::from_str(r#"{"key":"name_en","direction":"desc"}"#).unwrap();
        assert_eq!(sort, SortState::desc("name_en"));
    }

    #[test]
    fn missing_sorts_lowest() {
        let missing = SortValue::date(Some("not a date"));
        let dated = SortValue::date(Some("2024-01-01"));
        assert_eq!(missing, SortValue::Missing);
        assert_eq!(missing.compare(&dated), Ordering::Less);
        assert_eq!(
            SortValue::text(Some("alpha")).compare(&SortValue::text(Some("Beta"))),
            Ordering::Less
        );
    }

    #[test]
    fn parses_date_shapes() {
        assert_eq!(parse_date_millis("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_date_millis("1970-01-01T00:00:01Z"), Some(1_000));
        assert_eq!(parse_date_millis("1970-01-01T00:00:02"), Some(2_000));
        assert_eq!(parse_date_millis("31/12/2024"), None);
    }
}
