//! Integration-client behavior against a mock provider: retry counts,
//! error classification, breaker short-circuiting, and timeouts.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use integration_gateway::integrations::{AiClient, BillingEvent, BillingWebhookClient, OAuthClient};
use talent_resilience::{
    BackoffConfig, BreakerRegistry, CircuitBreakerConfig, IntegrationError, ResilientExecutor,
    RetryPolicy,
};

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(
        BackoffConfig::default()
            .with_max_retries(max_retries)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5)),
    )
}

fn executor(failure_threshold: u32, max_retries: u32) -> Arc<ResilientExecutor> {
    let config = CircuitBreakerConfig::default().with_failure_threshold(failure_threshold);
    Arc::new(
        ResilientExecutor::new(Arc::new(BreakerRegistry::new(config)))
            .with_retry_policy(fast_retry(max_retries))
            .with_call_timeout(Duration::from_secs(5)),
    )
}

fn oauth_client(server: &MockServer, executor: Arc<ResilientExecutor>) -> OAuthClient {
    OAuthClient::new(
        reqwest::Client::new(),
        executor,
        Url::parse(&format!("{}/oauth/token", server.uri())).unwrap(),
        Url::parse(&format!("{}/oauth/userinfo", server.uri())).unwrap(),
        "client".to_string(),
        "secret".to_string(),
    )
}

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "at-1",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "rt-1"
    })
}

#[tokio::test]
async fn exchange_code_returns_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server, executor(5, 3));
    let tokens = client
        .exchange_code("abc", "https://app.example.com/cb")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "at-1");
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;

    let client = oauth_client(&server, executor(10, 3));
    let tokens = client
        .exchange_code("abc", "https://app.example.com/cb")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "at-1");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn client_errors_yield_exactly_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server, executor(10, 3));
    let result = client
        .exchange_code("expired", "https://app.example.com/cb")
        .await;

    assert!(matches!(
        result,
        Err(IntegrationError::Client { status: 400 })
    ));
}

#[tokio::test]
async fn upstream_429_is_retried_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("retry-after", "1"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;

    let client = oauth_client(&server, executor(10, 3));
    let tokens = client
        .exchange_code("abc", "https://app.example.com/cb")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "at-1");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn repeated_failures_open_the_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // No retries, so each call is one wire request and one breaker failure.
    let client = oauth_client(&server, executor(2, 0));

    for _ in 0..2 {
        let result = client
            .exchange_code("abc", "https://app.example.com/cb")
            .await;
        assert!(matches!(
            result,
            Err(IntegrationError::Server { status: 500 })
        ));
    }

    // Breaker is open: rejected locally, nothing reaches the wire.
    let result = client
        .exchange_code("abc", "https://app.example.com/cb")
        .await;
    assert!(matches!(result, Err(IntegrationError::BreakerOpen { .. })));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "sub": "42" }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let exec = Arc::new(
        ResilientExecutor::new(Arc::new(BreakerRegistry::with_defaults()))
            .with_retry_policy(fast_retry(0))
            .with_call_timeout(Duration::from_millis(50)),
    );
    let client = oauth_client(&server, exec);

    let result = client.fetch_userinfo("at-1").await;
    assert!(matches!(result, Err(IntegrationError::Timeout { .. })));
}

#[tokio::test]
async fn userinfo_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "42",
            "email": "pat@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server, executor(5, 3));
    let profile = client.fetch_userinfo("at-1").await.unwrap();

    assert_eq!(profile.sub, "42");
    assert_eq!(profile.email.as_deref(), Some("pat@example.com"));
}

#[tokio::test]
async fn billing_delivery_carries_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhooks/talent"))
        .and(header_exists("x-idempotency-key"))
        .and(header_exists("x-delivery-id"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let client = BillingWebhookClient::new(
        reqwest::Client::new(),
        executor(5, 3),
        Url::parse(&format!("{}/webhooks/talent", server.uri())).unwrap(),
    );

    let event = BillingEvent {
        event_type: "seat.added".to_string(),
        tenant_id: "acme".to_string(),
        payload: json!({ "seats": 12 }),
    };
    let delivery_id = client.deliver(&event).await.unwrap();
    assert!(!delivery_id.is_empty());
}

#[tokio::test]
async fn ai_completion_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "Strong quarter overall.",
            "model": "talent-review-v1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AiClient::new(
        reqwest::Client::new(),
        executor(5, 1),
        Url::parse(&server.uri()).unwrap(),
        Duration::from_secs(2),
    );

    let completion = client
        .complete("talent-review-v1", "Summarize this review", 256)
        .await
        .unwrap();
    assert_eq!(completion.text, "Strong quarter overall.");
}
