//! Integration tests for endpoint health tracking and auto-disable.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use rc_webhooks::{
    DeliveryStatus, Dispatcher, DispatcherConfig, Endpoint, EndpointStatus, HealthConfig,
    HealthTracker, MemoryWebhookStore, RetryPolicy, RetryScheduler, Subscription, WebhookStore,
};

fn tracker(store: Arc<MemoryWebhookStore>, threshold: u32) -> HealthTracker {
    let dyn_store: Arc<dyn WebhookStore> = store;
    HealthTracker::new(dyn_store, HealthConfig { failure_threshold: threshold })
}

#[tokio::test]
async fn test_streak_at_threshold_disables_endpoint() {
    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("ep", "http://127.0.0.1:1/hook");
    store.insert_endpoint(endpoint.clone());

    let health = tracker(store.clone(), 3);
    for expected in 1..=2 {
        health.record_outcome(&endpoint, false).await.unwrap();
        let current = store.get_endpoint(endpoint.id).unwrap();
        assert_eq!(current.failure_streak, expected);
        assert_eq!(current.status, EndpointStatus::Active);
    }

    health.record_outcome(&endpoint, false).await.unwrap();
    let disabled = store.get_endpoint(endpoint.id).unwrap();
    assert_eq!(disabled.failure_streak, 3);
    assert_eq!(disabled.status, EndpointStatus::Failed);
}

#[tokio::test]
async fn test_success_resets_the_streak() {
    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("ep", "http://127.0.0.1:1/hook");
    store.insert_endpoint(endpoint.clone());

    let health = tracker(store.clone(), 3);
    health.record_outcome(&endpoint, false).await.unwrap();
    health.record_outcome(&endpoint, false).await.unwrap();
    health.record_outcome(&endpoint, true).await.unwrap();

    let current = store.get_endpoint(endpoint.id).unwrap();
    assert_eq!(current.failure_streak, 0);
    assert_eq!(current.status, EndpointStatus::Active);

    // The count starts over; two more failures stay below the threshold.
    health.record_outcome(&endpoint, false).await.unwrap();
    health.record_outcome(&endpoint, false).await.unwrap();
    assert_eq!(store.get_endpoint(endpoint.id).unwrap().status, EndpointStatus::Active);
}

#[tokio::test]
async fn test_terminal_failure_on_deleted_endpoint_is_a_no_op() {
    let store = Arc::new(MemoryWebhookStore::new());

    // The endpoint was deleted while its delivery was in flight; the
    // streak reports zero instead of erroring.
    let streak = store.record_terminal_failure(Uuid::new_v4()).await.unwrap();
    assert_eq!(streak, 0);

    let endpoint = Endpoint::new("gone", "http://127.0.0.1:1/hook");
    let health = tracker(store.clone(), 1);
    health.record_outcome(&endpoint, false).await.unwrap();
    assert!(store.get_endpoint(endpoint.id).is_none());
}

#[tokio::test]
async fn test_disabled_endpoint_stops_receiving_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let dyn_store: Arc<dyn WebhookStore> = store.clone();
    let endpoint = Endpoint::new("ep", server.uri()).with_retry_count(1);
    let endpoint_id = endpoint.id;
    store.insert_subscription(Subscription::new(endpoint.id, "system.alert"));
    store.insert_endpoint(endpoint);

    // Threshold of one: a single terminal failure disables the endpoint.
    let health = HealthTracker::new(dyn_store.clone(), HealthConfig { failure_threshold: 1 });
    let dispatcher = Dispatcher::new(
        dyn_store,
        RetryScheduler::new(RetryPolicy::default()),
        health,
        DispatcherConfig::default(),
    )
    .unwrap();

    let first = dispatcher.dispatch("system.alert", &json!({})).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].status, DeliveryStatus::Failed);
    assert_eq!(store.get_endpoint(endpoint_id).unwrap().status, EndpointStatus::Failed);

    // Resolution now excludes the endpoint entirely.
    let second = dispatcher.dispatch("system.alert", &json!({})).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn test_retrying_failures_do_not_advance_the_streak() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let dyn_store: Arc<dyn WebhookStore> = store.clone();
    let endpoint = Endpoint::new("ep", server.uri()).with_retry_count(5);
    let endpoint_id = endpoint.id;
    store.insert_subscription(Subscription::new(endpoint.id, "audit.event"));
    store.insert_endpoint(endpoint);

    let health = HealthTracker::new(dyn_store.clone(), HealthConfig { failure_threshold: 1 });
    let dispatcher = Dispatcher::new(
        dyn_store,
        RetryScheduler::new(RetryPolicy::default()),
        health,
        DispatcherConfig::default(),
    )
    .unwrap();

    let results = dispatcher.dispatch("audit.event", &json!({})).await.unwrap();
    assert_eq!(results[0].status, DeliveryStatus::Retrying);

    // Budget remains, so the failure is not terminal and health is untouched.
    let current = store.get_endpoint(endpoint_id).unwrap();
    assert_eq!(current.failure_streak, 0);
    assert_eq!(current.status, EndpointStatus::Active);
}
