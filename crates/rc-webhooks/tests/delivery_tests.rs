//! Integration tests for first-attempt dispatch.
//!
//! A wiremock server stands in for the receiving endpoint; the
//! in-memory store backs delivery records.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rc_webhooks::signature::{self, SIGNATURE_HEADER};
use rc_webhooks::{
    DeliveryStatus, Dispatcher, DispatcherConfig, Endpoint, HealthConfig, HealthTracker,
    MemoryWebhookStore, RetryPolicy, RetryScheduler, Subscription, WebhookStore,
};

fn build_dispatcher(store: Arc<MemoryWebhookStore>) -> Dispatcher {
    let store: Arc<dyn WebhookStore> = store;
    let scheduler = RetryScheduler::new(RetryPolicy::new(
        Duration::from_millis(50),
        Duration::from_secs(5),
    ));
    let health = HealthTracker::new(store.clone(), HealthConfig::default());
    Dispatcher::new(store, scheduler, health, DispatcherConfig::default()).unwrap()
}

fn header_value(request: &wiremock::Request, name: &str) -> Option<String> {
    request
        .headers
        .iter()
        .find(|(k, _)| k.as_str().eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.iter().next().map(|v| v.as_str().to_string()))
}

#[tokio::test]
async fn test_successful_delivery_closes_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("orders", format!("{}/hook", server.uri()));
    store.insert_subscription(Subscription::new(endpoint.id, "config.created"));
    store.insert_endpoint(endpoint);

    let dispatcher = build_dispatcher(store.clone());
    let results = dispatcher
        .dispatch("config.created", &json!({"key": "app.timeout"}))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let delivery = store.get_delivery(results[0].id).unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempt_count, 1);
    assert_eq!(delivery.response_status, Some(200));
    assert_eq!(delivery.response_body.as_deref(), Some("accepted"));
    assert!(delivery.completed_at.is_some());
    assert!(delivery.next_retry_at.is_none());
}

#[tokio::test]
async fn test_signature_covers_exact_body_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("signed", server.uri()).with_secret("topsecret");
    store.insert_subscription(Subscription::new(endpoint.id, "audit.event"));
    store.insert_endpoint(endpoint);

    build_dispatcher(store)
        .dispatch("audit.event", &json!({"action": "login"}))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let sent = header_value(request, SIGNATURE_HEADER).expect("signature header missing");
    assert_eq!(sent, signature::sign("topsecret", &request.body));
    assert!(signature::verify("topsecret", &request.body, &sent));

    // Wire body carries the envelope fields alongside the payload.
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["event_type"], "audit.event");
    assert_eq!(body["payload"]["action"], "login");
    assert!(body["timestamp"].is_string());
    assert!(body["delivery_id"].is_string());
}

#[tokio::test]
async fn test_no_secret_means_no_signature_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("unsigned", server.uri());
    store.insert_subscription(Subscription::new(endpoint.id, "audit.event"));
    store.insert_endpoint(endpoint);

    build_dispatcher(store)
        .dispatch("audit.event", &json!({}))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(header_value(&requests[0], SIGNATURE_HEADER).is_none());
}

#[tokio::test]
async fn test_custom_headers_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Team", "platform"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint =
        Endpoint::new("custom", server.uri()).with_headers(json!({"X-Team": "platform"}));
    store.insert_subscription(Subscription::new(endpoint.id, "system.alert"));
    store.insert_endpoint(endpoint);

    let results = build_dispatcher(store)
        .dispatch("system.alert", &json!({"severity": "high"}))
        .await
        .unwrap();
    assert_eq!(results[0].status, DeliveryStatus::Success);
}

#[tokio::test]
async fn test_non_2xx_schedules_a_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("flaky", server.uri()).with_retry_count(3);
    store.insert_subscription(Subscription::new(endpoint.id, "config.updated"));
    store.insert_endpoint(endpoint);

    let results = build_dispatcher(store.clone())
        .dispatch("config.updated", &json!({}))
        .await
        .unwrap();

    let delivery = store.get_delivery(results[0].id).unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert_eq!(delivery.attempt_count, 2);
    assert_eq!(delivery.response_status, Some(503));
    assert_eq!(delivery.response_body.as_deref(), Some("overloaded"));
    assert_eq!(delivery.error_message.as_deref(), Some("HTTP 503"));
    assert!(delivery.next_retry_at.is_some());
    assert!(delivery.completed_at.is_none());
}

#[tokio::test]
async fn test_filter_mismatch_produces_no_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("errors-only", server.uri());
    store.insert_subscription(
        Subscription::new(endpoint.id, "system.alert").with_filter(json!({"level": "ERROR"})),
    );
    store.insert_endpoint(endpoint);

    let results = build_dispatcher(store.clone())
        .dispatch("system.alert", &json!({"level": "INFO"}))
        .await
        .unwrap();

    assert!(results.is_empty());
    assert!(store.deliveries().is_empty());
}

#[tokio::test]
async fn test_inactive_endpoint_is_skipped() {
    let store = Arc::new(MemoryWebhookStore::new());
    let mut endpoint = Endpoint::new("paused", "http://127.0.0.1:1/hook");
    endpoint.status = rc_webhooks::EndpointStatus::Inactive;
    store.insert_subscription(Subscription::new(endpoint.id, "config.created"));
    store.insert_endpoint(endpoint);

    let results = build_dispatcher(store.clone())
        .dispatch("config.created", &json!({}))
        .await
        .unwrap();

    assert!(results.is_empty());
    assert!(store.deliveries().is_empty());
}

#[tokio::test]
async fn test_event_fans_out_to_all_matching_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    for name in ["first", "second"] {
        let endpoint = Endpoint::new(name, server.uri());
        store.insert_subscription(Subscription::new(endpoint.id, "feature_flag.updated"));
        store.insert_endpoint(endpoint);
    }

    let results = build_dispatcher(store)
        .dispatch("feature_flag.updated", &json!({"name": "dark-mode"}))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|d| d.status == DeliveryStatus::Success));
}

#[tokio::test]
async fn test_send_test_delivers_outside_subscriptions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("probe", server.uri());
    let endpoint_id = endpoint.id;
    // No subscription on purpose.
    store.insert_endpoint(endpoint);

    let delivery = build_dispatcher(store)
        .send_test(endpoint_id, "system.alert", json!({"test": true}))
        .await
        .unwrap();

    assert_eq!(delivery.status, DeliveryStatus::Success);
}

#[tokio::test]
async fn test_send_test_unknown_endpoint_errors() {
    let store = Arc::new(MemoryWebhookStore::new());
    let err = build_dispatcher(store)
        .send_test(uuid::Uuid::new_v4(), "system.alert", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, rc_webhooks::WebhookError::EndpointNotFound { .. }));
}
