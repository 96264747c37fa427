//! Text rendering of one list page, as a table or as cards

use std::fmt::Write as _;

use caredesk_core::entity::Entity;
use caredesk_core::gateway::field_value;
use caredesk_core::query::Page;
use serde_json::Value;

const MAX_CELL: usize = 32;

/// Plain-text cell for a JSON value; nested values render as compact JSON.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => if *b { "yes" } else { "no" }.to_string(),
        Some(other) => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn rows<E: Entity>(items: &[E], columns: &[&str]) -> Vec<Vec<String>> {
    items
        .iter()
        .map(|item| {
            let value = serde_json::to_value(item).unwrap_or(Value::Null);
            columns
                .iter()
                .map(|column| truncate(&cell(field_value(&value, column)), MAX_CELL))
                .collect()
        })
        .collect()
}

fn footer<E>(page: &Page<E>, selected: usize) -> String {
    let mut line = format!(
        "Page {}/{} ({} record{})",
        page.page,
        page.total_pages(),
        page.total,
        if page.total == 1 { "" } else { "s" }
    );
    if selected > 0 {
        let _ = write!(line, ", {selected} selected");
    }
    line
}

pub fn table<E: Entity>(page: &Page<E>, selected: usize) -> String {
    if page.items.is_empty() {
        return format!("No {} records.\n", E::LABEL.to_lowercase());
    }

    let columns = E::COLUMNS;
    let body = rows(&page.items, columns);
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            body.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(text, width)| format!("{text:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    out.push_str(&line(columns.to_vec()));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    out.push_str(&line(rule.iter().map(String::as_str).collect()));
    out.push('\n');
    for row in &body {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out.push_str(&footer(page, selected));
    out.push('\n');
    out
}

/// One block per record listing every populated column.
pub fn cards<E: Entity>(page: &Page<E>, selected: usize) -> String {
    if page.items.is_empty() {
        return format!("No {} records.\n", E::LABEL.to_lowercase());
    }

    let label_width = E::COLUMNS.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut out = String::new();
    for item in &page.items {
        let _ = writeln!(out, "┌ {} {}", E::LABEL, item.label());
        let value = serde_json::to_value(item).unwrap_or(Value::Null);
        for column in E::COLUMNS {
            let text = cell(field_value(&value, column));
            if !text.is_empty() {
                let _ = writeln!(out, "│ {column:<label_width$}  {text}");
            }
        }
        out.push_str("└\n");
    }
    out.push_str(&footer(page, selected));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use caredesk_core::entity::{City, RecordMeta};
    use caredesk_core::query::{paginate, Pagination};

    fn cities() -> Vec<City> {
        ["Haifa", "Tel Aviv-Yafo"]
            .iter()
            .enumerate()
            .map(|(n, name)| City {
                meta: RecordMeta {
                    id: Some(format!("c{n}")),
                    ..Default::default()
                },
                name_en: Some((*name).into()),
                code: Some(format!("C{n}")),
                ..City::default_draft()
            })
            .collect()
    }

    #[test]
    fn table_aligns_columns_and_reports_page() {
        let page = paginate(&cities(), Pagination::new(1, 20));
        let text = table(&page, 1);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("id"));
        assert!(lines[0].contains("name_en"));
        assert!(lines[3].contains("Tel Aviv-Yafo"));
        assert_eq!(lines.last().copied(), Some("Page 1/1 (2 records, 1 selected)"));
    }

    #[test]
    fn empty_page_says_so() {
        let page = paginate(&Vec::<City>::new(), Pagination::new(1, 20));
        assert_eq!(table(&page, 0), "No city records.\n");
    }

    #[test]
    fn cards_skip_empty_fields() {
        let page = paginate(&cities(), Pagination::new(1, 20));
        let text = cards(&page, 0);
        assert!(text.contains("┌ City Haifa"));
        assert!(!text.contains("name_he"));
    }

    #[test]
    fn long_cells_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
