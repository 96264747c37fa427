use std::sync::Arc;
use std::time::Duration;

use caredesk_core::entity::{Address, City, Contract, Entity, RecordMeta};
use caredesk_core::error::{GatewayError, SubmitError};
use caredesk_core::form::DialogForm;
use caredesk_core::gateway::MemoryGateway;
use caredesk_core::list::{EntityListManager, FetchState, NoticeLevel};
use caredesk_core::query::FilterState;
use caredesk_core::session::Session;

fn meta(id: &str) -> RecordMeta {
    RecordMeta {
        id: Some(id.into()),
        ..Default::default()
    }
}

fn address(id: &str, city_id: &str, street_id: &str) -> Address {
    Address {
        meta: meta(id),
        city_id: Some(city_id.into()),
        street_id: Some(street_id.into()),
        house_number: Some("12".into()),
        ..Address::default_draft()
    }
}

fn numbered_cities(n: usize) -> Vec<City> {
    (1..=n)
        .map(|i| City {
            meta: meta(&format!("c{i}")),
            name_en: Some(format!("City {i}")),
            code: Some(format!("C{i}")),
            ..City::default_draft()
        })
        .collect()
}

#[tokio::test]
async fn city_create_then_list_returns_record() {
    let gateway = Arc::new(MemoryGateway::<City>::new());
    let mut list = EntityListManager::<City>::new(Arc::new(Session::default()), gateway.clone());

    let mut form = DialogForm::<City>::new();
    form.open_create();
    form.set_field("name_en", "Tel Aviv").unwrap();
    form.set_field("name_he", "תל אביב").unwrap();
    form.set_field("code", "TLV").unwrap();
    let saved = list.submit_form(&mut form).await.unwrap();

    assert!(saved.id().is_some());
    let view = list.view();
    assert_eq!(view.page.total, 1);
    let city = &view.page.items[0];
    assert_eq!(city.name_en.as_deref(), Some("Tel Aviv"));
    assert_eq!(city.name_he.as_deref(), Some("תל אביב"));
    assert_eq!(city.code.as_deref(), Some("TLV"));
    assert_eq!(list.take_notices()[0].level, NoticeLevel::Success);
}

#[tokio::test]
async fn address_filter_by_city_ignores_all_sentinel() {
    let gateway = Arc::new(MemoryGateway::with_records([
        address("a1", "c1", "s1"),
        address("a2", "c1", "s2"),
        address("a3", "c2", "s3"),
    ]));
    let mut list = EntityListManager::<Address>::new(Arc::new(Session::default()), gateway);
    list.fetch(false).await;

    list.set_filters(FilterState::new().with("city_id", "c1").with("street_id", "all"));
    let view = list.view();
    assert_eq!(view.page.total, 2);
    assert!(view
        .page
        .items
        .iter()
        .all(|a| a.city_id.as_deref() == Some("c1")));
}

#[tokio::test]
async fn contract_date_order_never_reaches_gateway() {
    let gateway = Arc::new(MemoryGateway::<Contract>::new());
    let mut list = EntityListManager::<Contract>::new(Arc::new(Session::default()), gateway.clone());

    let mut form = DialogForm::<Contract>::new();
    form.open_create();
    form.set_field("contract_number", "C-100").unwrap();
    form.set_field("name_en", "Clalit").unwrap();
    form.set_field("valid_from", "2025-06-01").unwrap();
    form.set_field("valid_to", "2025-01-01").unwrap();

    let err = list.submit_form(&mut form).await.unwrap_err();
    assert!(matches!(&err, SubmitError::Invalid { errors } if errors.contains_key("valid_to")));
    assert!(form.error("valid_to").is_some());
    assert!(form.error("valid_from").is_none());
    assert_eq!(gateway.calls().mutations(), 0);
    assert_eq!(gateway.calls().list, 0);
}

#[tokio::test]
async fn select_all_visible_toggles_whole_page() {
    let gateway = Arc::new(MemoryGateway::with_records(numbered_cities(5)));
    let mut list = EntityListManager::<City>::new(Arc::new(Session::default()), gateway);
    list.fetch(false).await;

    list.toggle("c1");
    list.toggle("c3");
    assert_eq!(list.selection().len(), 2);

    list.select_all_visible();
    assert_eq!(list.selection().len(), 5);

    list.select_all_visible();
    assert_eq!(list.selection().len(), 0);
}

#[tokio::test]
async fn bulk_delete_tallies_partial_failures_and_refreshes_once() {
    let gateway = Arc::new(MemoryGateway::with_records(numbered_cities(6)));
    gateway.fail_delete("c2", GatewayError::other("locked"));
    gateway.fail_delete("c5", GatewayError::other("locked"));
    let mut list = EntityListManager::<City>::new(Arc::new(Session::default()), gateway.clone());
    list.fetch(false).await;
    let lists_before = gateway.calls().list;

    let ids: Vec<String> = (1..=6).map(|i| format!("c{i}")).collect();
    for id in &ids {
        list.toggle(id);
    }
    let outcome = list.bulk_remove(&ids).await;

    assert_eq!(outcome.succeeded, 4);
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.to_string(), "4 succeeded, 2 failed");
    assert_eq!(gateway.calls().list, lists_before + 1);
    assert_eq!(list.raw().len(), 2);
    // partial failure keeps the survivors selected
    assert_eq!(list.selection().ids(), vec!["c2".to_owned(), "c5".to_owned()]);
    assert_eq!(list.take_notices()[0].level, NoticeLevel::Warning);
}

#[tokio::test]
async fn bulk_delete_with_no_successes_skips_refresh() {
    let gateway = Arc::new(MemoryGateway::with_records(numbered_cities(2)));
    gateway.fail_delete("c1", GatewayError::other("locked"));
    gateway.fail_delete("c2", GatewayError::other("locked"));
    let mut list = EntityListManager::<City>::new(Arc::new(Session::default()), gateway.clone());
    list.fetch(false).await;

    let outcome = list
        .bulk_remove(&["c1".to_owned(), "c2".to_owned()])
        .await;
    assert_eq!((outcome.succeeded, outcome.failed), (0, 2));
    assert_eq!(gateway.calls().list, 1);
}

#[tokio::test(start_paused = true)]
async fn sustained_rate_limit_retries_three_times_then_fails() {
    let gateway = Arc::new(MemoryGateway::<City>::new());
    gateway.fail_always(GatewayError::rate_limited("slow down"));
    let mut list = EntityListManager::<City>::new(Arc::new(Session::default()), gateway.clone());

    let started = tokio::time::Instant::now();
    let state = list.fetch(false).await;

    assert_eq!(state, FetchState::Failed);
    assert_eq!(gateway.calls().list, 4);
    assert_eq!(started.elapsed(), Duration::from_secs(1 + 2 + 4));
    assert_eq!(
        list.error(),
        Some("Too many requests. Please wait a moment and try again.")
    );
}

#[tokio::test(start_paused = true)]
async fn transient_network_error_recovers() {
    let gateway = Arc::new(MemoryGateway::with_records(numbered_cities(3)));
    gateway.push_fault(GatewayError::network("connection reset"));
    let mut list = EntityListManager::<City>::new(Arc::new(Session::default()), gateway.clone());

    assert_eq!(list.fetch(false).await, FetchState::Success);
    assert_eq!(gateway.calls().list, 2);
    assert_eq!(list.retries(), 0);
    assert_eq!(list.raw().len(), 3);
}

#[tokio::test]
async fn import_rows_creates_accepted_records() {
    let gateway = Arc::new(MemoryGateway::<City>::new());
    let mut list = EntityListManager::<City>::new(Arc::new(Session::default()), gateway.clone());

    let rows = vec![
        vec![
            ("Name (English)".to_owned(), "Haifa".to_owned()),
            ("Code".to_owned(), "HFA".to_owned()),
        ],
        vec![("Name (English)".to_owned(), "No code".to_owned())],
    ];
    let report = list.import_rows(&rows).await.unwrap();

    assert_eq!(report.summary.accepted, 1);
    assert_eq!(report.summary.missing_required, 1);
    assert_eq!(gateway.calls().bulk_create, 1);
    assert_eq!(list.raw().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_share_one_gateway_call() {
    let gateway = Arc::new(
        MemoryGateway::with_records(numbered_cities(3)).with_latency(Duration::from_millis(50)),
    );
    let session = Arc::new(Session::default());
    let mut first = EntityListManager::<City>::new(session.clone(), gateway.clone());
    let mut second = EntityListManager::<City>::new(session, gateway.clone());

    let (a, b) = tokio::join!(first.fetch(false), second.fetch(false));
    assert_eq!((a, b), (FetchState::Success, FetchState::Success));
    assert_eq!(gateway.calls().list, 1);
    assert_eq!(first.raw().len(), 3);
    assert_eq!(second.raw().len(), 3);
}
