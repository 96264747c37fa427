use std::collections::BTreeSet;

use caredesk_core::entity::{City, Entity, RecordMeta};
use caredesk_core::lookup::LabelIndex;
use caredesk_core::query::{
    apply_filters, apply_sort, paginate, total_pages, FilterState, Pagination, SortState, ALL,
    SEARCH_KEY,
};
use proptest::prelude::*;

fn city(n: usize, name: Option<String>, code: String) -> City {
    City {
        meta: RecordMeta {
            id: Some(format!("c{n}")),
            created_date: Some(format!("2024-01-{:02}T00:00:00Z", n % 28 + 1)),
            ..Default::default()
        },
        name_en: name,
        code: Some(code),
        ..City::default_draft()
    }
}

// Strategy for arbitrary city collections, names possibly missing
fn arb_cities() -> impl Strategy<Value = Vec<City>> {
    prop::collection::vec(
        (prop::option::of("[A-Za-z ]{0,12}"), "[A-Z0-9]{1,6}"),
        0..60,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(n, (name, code))| city(n, name, code))
            .collect()
    })
}

// Distinct, non-empty lowercase names so every pair is strictly ordered
fn arb_unique_cities() -> impl Strategy<Value = Vec<City>> {
    prop::collection::btree_set("[a-z]{1,10}", 1..40).prop_map(|names: BTreeSet<String>| {
        names
            .into_iter()
            .rev()
            .enumerate()
            .map(|(n, name)| city(n, Some(name), format!("C{n}")))
            .collect()
    })
}

fn ids(items: &[City]) -> Vec<String> {
    items.iter().filter_map(|c| c.id().map(str::to_owned)).collect()
}

proptest! {
    /// Property: neutral filters keep every item in order
    #[test]
    fn prop_neutral_filters_are_noop(cities in arb_cities()) {
        let labels = LabelIndex::new();
        let empty = FilterState::new();
        let sentinels = FilterState::new().with(SEARCH_KEY, "").with("code", ALL);

        prop_assert_eq!(apply_filters(&cities, &empty, &labels), cities.clone());
        prop_assert_eq!(apply_filters(&cities, &sentinels, &labels), cities);
    }

    /// Property: sorting an already sorted list changes nothing
    #[test]
    fn prop_sort_is_idempotent(cities in arb_cities(), desc in any::<bool>()) {
        let labels = LabelIndex::new();
        let sort = if desc { SortState::desc("name_en") } else { SortState::asc("name_en") };

        let once = apply_sort(cities, &sort, &labels);
        let twice = apply_sort(once.clone(), &sort, &labels);
        prop_assert_eq!(ids(&once), ids(&twice));
    }

    /// Property: flipping the direction reverses a fully ordered field
    #[test]
    fn prop_reverse_direction_reverses_order(cities in arb_unique_cities()) {
        let labels = LabelIndex::new();
        let asc = apply_sort(cities.clone(), &SortState::asc("name_en"), &labels);
        let mut desc = apply_sort(cities, &SortState::desc("name_en"), &labels);
        desc.reverse();
        prop_assert_eq!(ids(&asc), ids(&desc));
    }

    /// Property: pages never exceed the page size and clamp to the last page
    #[test]
    fn prop_pagination_bounds(
        cities in arb_cities(),
        page in 0u32..20,
        per_page in 1u32..30,
    ) {
        let result = paginate(&cities, Pagination::new(page, per_page));
        let pages = total_pages(cities.len(), per_page);

        prop_assert!(result.items.len() <= per_page as usize);
        prop_assert_eq!(result.total, cities.len());
        prop_assert_eq!(pages as usize, cities.len().div_ceil(per_page as usize).max(1));
        prop_assert!(result.page >= 1 && result.page <= pages);
        if page > pages {
            prop_assert_eq!(result.page, pages);
        }
        if !cities.is_empty() {
            prop_assert!(!result.items.is_empty());
        }
    }
}
