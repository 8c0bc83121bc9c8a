//! Tests for the HTTP client module

use super::*;
use crate::auth::{CachedToken, CliTokenSource, Credential, TokenEndpoints};
use crate::config::HttpSettings;
use crate::error::Error;
use crate::types::BackoffType;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(2)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .no_rate_limit()
        .build()
}

/// Token source that numbers each token it hands out
#[derive(Default)]
struct CountingTokens {
    issued: AtomicUsize,
}

#[async_trait]
impl CliTokenSource for CountingTokens {
    fn name(&self) -> &str {
        "counting"
    }

    fn ensure_available(&self) -> crate::Result<()> {
        Ok(())
    }

    async fn get_token(&self, _resource: &str) -> crate::Result<CachedToken> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CachedToken::expires_in(format!("token-{n}"), 3600))
    }
}

fn endpoints() -> TokenEndpoints {
    TokenEndpoints {
        authority_host: "https://login.microsoftonline.com".to_string(),
        resource: "https://graph.microsoft.com".to_string(),
        msi_endpoint: None,
        msi_header: None,
    }
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 3);
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_some());
    assert!(config.user_agent.starts_with("entra-tables/"));
}

#[test]
fn test_http_client_config_from_settings() {
    let settings = HttpSettings {
        timeout_secs: 5,
        max_retries: 7,
        requests_per_second: 0,
    };
    let config = HttpClientConfig::from_settings(&settings, "https://graph.microsoft.com/v1.0");
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.max_retries, 7);
    assert!(config.rate_limit.is_none());
    assert_eq!(
        config.base_url.as_deref(),
        Some("https://graph.microsoft.com/v1.0")
    );
}

#[test]
fn test_http_client_config_from_settings_rate_limited() {
    let settings = HttpSettings {
        timeout_secs: 30,
        max_retries: 3,
        requests_per_second: 4,
    };
    let config = HttpClientConfig::from_settings(&settings, "https://graph.microsoft.com/");
    let limit = config.rate_limit.clone().unwrap();
    assert_eq!(limit.requests_per_second, 4);
    assert_eq!(limit.burst_size, 4);

    let client = HttpClient::with_config(config).unwrap();
    assert!(client.has_rate_limiter());
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("$top", "10")
        .query("$filter", "accountEnabled eq true")
        .header("ConsistencyLevel", "eventual")
        .timeout(Duration::from_secs(10))
        .retries(2);

    assert_eq!(config.query[0], ("$top".to_string(), "10".to_string()));
    assert_eq!(config.query.len(), 2);
    assert_eq!(
        config.headers.get("ConsistencyLevel"),
        Some(&"eventual".to_string())
    );
    assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    assert_eq!(config.max_retries, Some(2));
}

#[tokio::test]
async fn test_http_client_get_json_with_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$top", "5"))
        .and(header("ConsistencyLevel", "eventual"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "1"}]
        })))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(test_config(&server)).unwrap();
    let data: serde_json::Value = client
        .get_json_with_config(
            "/v1.0/users",
            RequestConfig::new()
                .query("$top", "5")
                .header("ConsistencyLevel", "eventual"),
        )
        .await
        .unwrap();

    assert_eq!(data["value"][0]["id"], "1");
}

#[tokio::test]
async fn test_http_client_odata_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource 'missing' does not exist or one of its queried reference-property objects are not present.",
                "innerError": {"request-id": "abc"}
            }
        })))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(test_config(&server)).unwrap();
    let err = client.get("/v1.0/users/missing").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.provider_code(), Some("Request_ResourceNotFound"));
}

#[tokio::test]
async fn test_http_client_retry_on_503() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(test_config(&server)).unwrap();
    let response = client.get("/v1.0/groups").await.unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_http_client_throttle_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_json(serde_json::json!({
                    "error": {"code": "TooManyRequests", "message": "Too many requests"}
                })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(test_config(&server)).unwrap();
    let response = client.get("/v1.0/devices").await.unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_http_client_throttle_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(test_config(&server)).unwrap();
    let err = client.get("/v1.0/devices").await.unwrap_err();

    assert!(matches!(err, Error::RateLimited { .. }));
}

#[tokio::test]
async fn test_http_client_server_error_after_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/always-fail"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(test_config(&server)).unwrap();
    let err = client.get("/v1.0/always-fail").await.unwrap_err();

    assert!(matches!(err, Error::Provider { status: 500, .. }));
}

#[tokio::test]
async fn test_http_client_bad_request_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"code": "Request_UnsupportedQuery", "message": "Unsupported Query."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(test_config(&server)).unwrap();
    let err = client.get("/v1.0/users").await.unwrap_err();

    assert!(matches!(err, Error::Provider { status: 400, ref code, .. } if code == "Request_UnsupportedQuery"));
}

#[tokio::test]
async fn test_http_client_refreshes_token_on_401() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/organization"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"code": "InvalidAuthenticationToken", "message": "Lifetime validation failed"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/organization"))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .mount(&server)
        .await;

    let tokens = Arc::new(CountingTokens::default());
    let client = HttpClient::with_auth(
        test_config(&server),
        Credential::AzureCli {
            source: tokens.clone(),
        },
        endpoints(),
    )
    .unwrap();

    let response = client.get("/v1.0/organization").await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(tokens.issued.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_http_client_full_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$skiptoken", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url("https://ignored.example.com")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let next_link = format!("{}/v1.0/users?$skiptoken=abc", server.uri());
    let response = client.get(&next_link).await.unwrap();

    assert_eq!(response.status(), 200);
}

#[test]
fn test_provider_error_non_json_body() {
    let err = provider_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
    assert!(matches!(err, Error::Provider { status: 502, ref code, .. } if code == "Bad Gateway"));
}

#[test]
fn test_calculate_backoff() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(400));
    assert_eq!(client.calculate_backoff(3), Duration::from_millis(500));
}

#[test]
fn test_calculate_backoff_linear() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(300));
    assert!(client.has_rate_limiter());
}
