//! Tests for pagination module

use super::*;
use crate::error::Error;
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::table::IgnoreErrors;
use crate::types::{BackoffType, JsonValue, Row};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpClient {
    HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url(server.uri())
            .max_retries(0)
            .backoff(
                BackoffType::Constant,
                Duration::from_millis(1),
                Duration::from_millis(1),
            )
            .no_rate_limit()
            .build(),
    )
    .unwrap()
}

fn as_row(item: JsonValue) -> crate::Result<Option<Row>> {
    match item {
        JsonValue::Object(map) => Ok(Some(map)),
        _ => Err(Error::decode("not an object")),
    }
}

fn items(range: std::ops::Range<u32>) -> Vec<JsonValue> {
    range.map(|i| json!({"id": i.to_string()})).collect()
}

// ============================================================================
// ODataPage Tests
// ============================================================================

#[test]
fn test_page_with_next_link() {
    let page = ODataPage::from_body(
        json!({
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users",
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/users?$skiptoken=abc",
            "value": [{"id": "1"}, {"id": "2"}]
        }),
        false,
    )
    .unwrap();

    assert_eq!(page.items.len(), 2);
    assert!(page.has_next());
    assert_eq!(
        NextPage::after(&page),
        NextPage::Continue("https://graph.microsoft.com/v1.0/users?$skiptoken=abc".to_string())
    );
}

#[test]
fn test_last_page() {
    let page = ODataPage::from_body(json!({"value": []}), false).unwrap();
    assert!(page.items.is_empty());
    assert!(NextPage::after(&page).is_done());

    let page = ODataPage::from_body(json!({"value": [], "@odata.nextLink": ""}), false).unwrap();
    assert!(!page.has_next());
}

#[test]
fn test_singleton_page() {
    let page = ODataPage::from_body(
        json!({"id": "authorizationPolicy", "allowInvitesFrom": "everyone"}),
        true,
    )
    .unwrap();
    assert_eq!(page.items, vec![json!({"id": "authorizationPolicy", "allowInvitesFrom": "everyone"})]);
    assert!(!page.has_next());
}

#[test]
fn test_singleton_with_scalar_value_field() {
    let page = ODataPage::from_body(json!({"id": "x", "value": "kept"}), true).unwrap();
    assert_eq!(page.items, vec![json!({"id": "x", "value": "kept"})]);
}

#[test]
fn test_collection_shape_errors() {
    assert!(ODataPage::from_body(json!({"id": "x"}), false).is_err());
    assert!(ODataPage::from_body(json!({"value": "x"}), false).is_err());
    assert!(ODataPage::from_body(json!([1, 2]), false).is_err());
}

// ============================================================================
// RowSink Tests
// ============================================================================

#[test]
fn test_closure_sink() {
    let mut seen = Vec::new();
    let mut sink = |row: Row| {
        seen.push(row);
        seen.len() < 2
    };
    assert!(sink.wants_more());
    assert!(sink.emit(Row::new()));
    assert!(!sink.emit(Row::new()));
    drop(sink);
    assert_eq!(seen.len(), 2);
}

#[test]
fn test_summary_counters() {
    let mut summary = StreamSummary::new();
    summary.add_page(5);
    summary.add_page(3);
    summary.add_row();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.items, 8);
    assert_eq!(summary.rows, 1);
}

// ============================================================================
// RowStreamer Tests
// ============================================================================

#[tokio::test]
async fn test_stream_follows_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$top", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": items(0..2),
            "@odata.nextLink": format!("{}/v1.0/users-page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users-page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": items(2..3)})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors::default();
    let mut rows = Vec::new();
    let mut sink = |row: Row| {
        rows.push(row);
        true
    };

    let summary = RowStreamer::new(&client, &ignore)
        .stream(
            "v1.0/users",
            RequestConfig::new().query("$top", "2"),
            as_row,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.rows, 3);
    assert!(!summary.stopped);
    let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!("0"), json!("1"), json!("2")]);
}

#[tokio::test]
async fn test_stream_stops_when_sink_declines() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": items(0..10),
            "@odata.nextLink": format!("{}/v1.0/devices-page2", server.uri())
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices-page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors::default();
    let mut emitted = 0;
    let mut sink = |_row: Row| {
        emitted += 1;
        emitted < 3
    };

    let summary = RowStreamer::new(&client, &ignore)
        .stream("v1.0/devices", RequestConfig::new(), as_row, &mut sink)
        .await
        .unwrap();

    assert_eq!(emitted, 3);
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.items, 10);
    assert!(summary.stopped);
}

struct NoMoreRows;

impl RowSink for NoMoreRows {
    fn emit(&mut self, _row: Row) -> bool {
        panic!("no rows should be emitted");
    }

    fn wants_more(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn test_stream_checks_sink_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": items(0..1)})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors::default();
    let summary = RowStreamer::new(&client, &ignore)
        .stream("v1.0/users", RequestConfig::new(), as_row, &mut NoMoreRows)
        .await
        .unwrap();

    assert_eq!(summary.pages, 0);
    assert!(summary.stopped);
}

#[tokio::test]
async fn test_stream_skips_filtered_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": items(0..4)})))
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors::default();
    let mut rows = Vec::new();
    let mut sink = |row: Row| {
        rows.push(row);
        true
    };

    let summary = RowStreamer::new(&client, &ignore)
        .stream(
            "v1.0/groups",
            RequestConfig::new(),
            |item: JsonValue| {
                let keep = item["id"] != json!("1");
                Ok(keep.then(|| item.as_object().cloned().unwrap_or_default()))
            },
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(summary.items, 4);
    assert_eq!(summary.rows, 3);
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_stream_headers_on_every_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(header("ConsistencyLevel", "eventual"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": items(0..1),
            "@odata.nextLink": format!("{}/v1.0/users-next", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users-next"))
        .and(header("ConsistencyLevel", "eventual"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": items(1..2)})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors::default();
    let mut count = 0;
    let mut sink = |_row: Row| {
        count += 1;
        true
    };

    RowStreamer::new(&client, &ignore)
        .header("ConsistencyLevel", "eventual")
        .stream("v1.0/users", RequestConfig::new(), as_row, &mut sink)
        .await
        .unwrap();

    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_stream_ignorable_error_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/identity/conditionalAccess/policies"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": "Forbidden",
                "message": "Tenant does not have a premium license"
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors {
        codes: Vec::new(),
        messages: vec!["premium license".to_string()],
    };
    let mut sink = |_row: Row| true;

    let summary = RowStreamer::new(&client, &ignore)
        .stream(
            "v1.0/identity/conditionalAccess/policies",
            RequestConfig::new(),
            as_row,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(summary.rows, 0);
    assert!(summary.ignored_error.is_some());
}

#[tokio::test]
async fn test_stream_other_errors_propagate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": "Authorization_RequestDenied",
                "message": "Insufficient privileges to complete the operation."
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors::codes(["Request_ResourceNotFound"]);
    let mut sink = |_row: Row| true;

    let err = RowStreamer::new(&client, &ignore)
        .stream("v1.0/users", RequestConfig::new(), as_row, &mut sink)
        .await
        .unwrap_err();

    assert_eq!(err.provider_code(), Some("Authorization_RequestDenied"));
}

#[tokio::test]
async fn test_stream_ignorable_error_after_first_page_propagates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": items(0..2),
            "@odata.nextLink": format!("{}/v1.0/groups-page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups-page2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource does not exist."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors::codes(["Request_ResourceNotFound"]);
    let mut emitted = 0;
    let mut sink = |_row: Row| {
        emitted += 1;
        true
    };

    let err = RowStreamer::new(&client, &ignore)
        .stream("v1.0/groups", RequestConfig::new(), as_row, &mut sink)
        .await
        .unwrap_err();

    assert_eq!(err.provider_code(), Some("Request_ResourceNotFound"));
    assert_eq!(emitted, 2);
}

#[tokio::test]
async fn test_stream_singleton() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/policies/authorizationPolicy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#policies/authorizationPolicy/$entity",
            "id": "authorizationPolicy",
            "allowInvitesFrom": "everyone"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let ignore = IgnoreErrors::default();
    let mut rows = Vec::new();
    let mut sink = |row: Row| {
        rows.push(row);
        true
    };

    let summary = RowStreamer::new(&client, &ignore)
        .singleton(true)
        .stream(
            "v1.0/policies/authorizationPolicy",
            RequestConfig::new(),
            as_row,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(summary.rows, 1);
    assert_eq!(rows[0]["allowInvitesFrom"], json!("everyone"));
}
