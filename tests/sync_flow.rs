//! End-to-end tests of the sync engine against a mock aggregation server.
//!
//! The engine decides what to request; these tests execute those requests with
//! the real `ApiClient` over `wiremock` and feed the results back, the way the
//! UI does.

use std::time::Duration;

use feedsync::api::ApiClient;
use feedsync::sync::{
    ItemId, ItemRegion, PageOutcome, PollTick, ReadFilter, Scope, SnapshotOutcome, SyncEngine,
    SyncSettings, ViewSelection,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entries(ids: &[i64]) -> Value {
    Value::Array(
        ids.iter()
            .map(|id| json!({"id": id, "title": format!("Entry {}", id), "read": false}))
            .collect(),
    )
}

fn sidebar(unread: i64) -> Value {
    json!({"categories_and_blogs": [
        {"id": 1, "name": "Tech", "feeds": [
            {"feed": {"id": 10, "title": "Lobsters", "url": "https://l.example/rss", "daily_enabled": false},
             "unread_count": unread}
        ]}
    ]})
}

fn setup(server: &MockServer, scope: Scope) -> (ApiClient, SyncEngine, mpsc::Receiver<PollTick>) {
    let api = ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let (tick_tx, tick_rx) = mpsc::channel(8);
    let engine = SyncEngine::new(
        SyncSettings::default(),
        ViewSelection::new(scope, ReadFilter::Unread),
        tick_tx,
    );
    (api, engine, tick_rx)
}

fn ids(engine: &SyncEngine) -> Vec<i64> {
    engine.items().iter().map(|i| i.id.0).collect()
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_full_page_then_empty_page_issues_exactly_two_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/feeditems"))
        .and(query_param("limit", "5"))
        .and(query_param_is_missing("last_item_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries(&[1, 2, 3, 4, 5])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/feeditems"))
        .and(query_param("last_item_id", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (api, mut engine, _ticks) = setup(&server, Scope::Global);

    let first = engine.start().page.unwrap();
    let result = api.fetch_page(&first).await;
    assert!(matches!(
        engine.page_loaded(&first, result),
        PageOutcome::Materialized { exhausted: false, .. }
    ));
    assert_eq!(engine.session().cursor(), Some(ItemId(5)));

    let second = engine.load_more().page.unwrap();
    assert_eq!(second.cursor, Some(ItemId(5)));
    let result = api.fetch_page(&second).await;
    assert_eq!(
        engine.page_loaded(&second, result),
        PageOutcome::Materialized {
            added: vec![],
            exhausted: true
        }
    );

    assert!(engine.session().end_of_collection());
    assert_eq!(engine.session().cursor(), Some(ItemId(5)));
    assert_eq!(engine.load_more().page, None);
    assert_eq!(ids(&engine), vec![1, 2, 3, 4, 5]);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
}

#[tokio::test]
async fn test_server_error_is_retried_from_same_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/feeditems/1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db locked"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/feeditems/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries(&[9, 8, 7, 6, 5])))
        .mount(&server)
        .await;

    let (api, mut engine, _ticks) = setup(&server, Scope::Category(1));

    let first = engine.start().page.unwrap();
    let result = api.fetch_page(&first).await;
    assert_eq!(engine.page_loaded(&first, result), PageOutcome::Failed);
    assert!(!engine.session().fetch_in_flight());
    assert!(!engine.session().end_of_collection());
    assert_eq!(engine.session().cursor(), None);

    let retry = engine.request_next_page().unwrap();
    assert_eq!(retry.cursor, None);
    let result = api.fetch_page(&retry).await;
    engine.page_loaded(&retry, result);
    assert_eq!(ids(&engine), vec![9, 8, 7, 6, 5]);
}

#[tokio::test]
async fn test_page_arriving_after_navigation_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/feeditems"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries(&[1, 2, 3])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/feeditems/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries(&[40, 41, 42, 43, 44])))
        .mount(&server)
        .await;

    let (api, mut engine, _ticks) = setup(&server, Scope::Global);

    let old = engine.start().page.unwrap();
    let new = engine.set_filter(ReadFilter::All).page.unwrap();

    let late = api.fetch_page(&old).await;
    assert_eq!(engine.page_loaded(&old, late), PageOutcome::Stale);
    assert!(engine.items().is_empty());
    assert!(engine.session().fetch_in_flight());

    let result = api.fetch_page(&new).await;
    engine.page_loaded(&new, result);
    assert_eq!(ids(&engine), vec![40, 41, 42, 43, 44]);
}

// ============================================================================
// Read marking
// ============================================================================

#[tokio::test]
async fn test_each_visible_item_is_committed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/feeditems"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries(&[1, 2, 3, 4, 5])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mark_as_read/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let (api, mut engine, _ticks) = setup(&server, Scope::Global);
    let request = engine.start().page.unwrap();
    let result = api.fetch_page(&request).await;
    engine.page_loaded(&request, result);

    // Item 1 ends well inside the upper part of a 20-row pane, item 2 does not
    let regions = [
        ItemRegion {
            id: ItemId(1),
            top: 0,
            bottom: 6,
        },
        ItemRegion {
            id: ItemId(2),
            top: 7,
            bottom: 19,
        },
    ];
    let tickets = engine.scan_visibility(&regions, 20);
    assert_eq!(tickets.len(), 1);
    assert!(engine.items()[0].read);
    assert!(!engine.items()[1].read);

    // A second scan before the commit lands is suppressed locally
    assert!(engine.scan_visibility(&regions, 20).is_empty());

    let ticket = tickets[0];
    let result = api.mark_read(&ticket).await;
    let follow_up = engine.read_committed(ticket, result);
    assert!(follow_up.refresh_badge);
    assert!(engine.scan_visibility(&regions, 20).is_empty());
}

#[tokio::test]
async fn test_failed_commit_keeps_item_read_locally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/feeditems"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries(&[1])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mark_as_read/1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let (api, mut engine, _ticks) = setup(&server, Scope::Global);
    let request = engine.start().page.unwrap();
    let result = api.fetch_page(&request).await;
    engine.page_loaded(&request, result);

    let regions = [ItemRegion {
        id: ItemId(1),
        top: 0,
        bottom: 2,
    }];
    let ticket = engine.scan_visibility(&regions, 20)[0];
    let result = api.mark_read(&ticket).await;
    assert!(result.is_err());

    let follow_up = engine.read_committed(ticket, result);
    assert!(!follow_up.refresh_badge);
    assert!(engine.items()[0].read);
    assert!(engine.scan_visibility(&regions, 20).is_empty());
}

// ============================================================================
// Sidebar poll
// ============================================================================

#[tokio::test]
async fn test_identical_sidebar_is_not_re_rendered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories_and_blogs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sidebar(3)))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/categories_and_blogs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sidebar(2)))
        .mount(&server)
        .await;

    let (api, mut engine, _ticks) = setup(&server, Scope::Global);

    let mut outcomes = Vec::new();
    let mut ticket = engine.start().sidebar;
    for _ in 0..3 {
        let t = ticket.take().unwrap();
        let result = api.sidebar_snapshot().await;
        outcomes.push(engine.poll_mut().on_snapshot(t, result).outcome);
        ticket = engine.poll_mut().request_refresh();
    }

    assert_eq!(
        outcomes,
        vec![
            SnapshotOutcome::Changed,
            SnapshotOutcome::Unchanged,
            SnapshotOutcome::Changed
        ]
    );
    assert_eq!(engine.poll().snapshot().unwrap().total_unread(), 2);
}

#[tokio::test]
async fn test_sidebar_failure_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories_and_blogs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sidebar(5)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/categories_and_blogs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let (api, mut engine, _ticks) = setup(&server, Scope::Global);

    let first = engine.start().sidebar.unwrap();
    let result = api.sidebar_snapshot().await;
    engine.poll_mut().on_snapshot(first, result);

    let second = engine.poll_mut().request_refresh().unwrap();
    let result = api.sidebar_snapshot().await;
    assert_eq!(
        engine.poll_mut().on_snapshot(second, result).outcome,
        SnapshotOutcome::Failed
    );
    assert_eq!(engine.poll().snapshot().unwrap().total_unread(), 5);
}

#[tokio::test]
async fn test_daily_view_pages_and_commits_digests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/daily/feed"))
        .and(query_param("limit", "10"))
        .and(query_param("unread", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "summary": "Morning", "articles": [{"title": "A", "link": "https://a.example"}]}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mark_as_read/daily/7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (api, mut engine, _ticks) = setup(&server, Scope::Daily);
    let request = engine.start().page.unwrap();
    let result = api.fetch_page(&request).await;

    // One digest is below the near-empty threshold
    assert!(matches!(
        engine.page_loaded(&request, result),
        PageOutcome::Materialized { exhausted: true, .. }
    ));

    // Digests must be fully visible
    let partly = [ItemRegion {
        id: ItemId(7),
        top: 2,
        bottom: 30,
    }];
    assert!(engine.scan_visibility(&partly, 20).is_empty());

    let whole = [ItemRegion {
        id: ItemId(7),
        top: 2,
        bottom: 18,
    }];
    let ticket = engine.scan_visibility(&whole, 20)[0];
    let result = api.mark_read(&ticket).await;
    assert!(engine.read_committed(ticket, result).refresh_badge);
}
