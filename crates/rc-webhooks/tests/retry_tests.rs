//! Integration tests for the retry lifecycle: dispatch, sweep,
//! redispatch, and eventual success or exhaustion.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use rc_webhooks::{
    DeliveryStatus, Dispatcher, DispatcherConfig, Endpoint, HealthConfig, HealthTracker,
    MemoryWebhookStore, RetryPolicy, RetryScheduler, RetrySweeper, Subscription, SweepConfig,
    WebhookStore,
};

struct Harness {
    store: Arc<MemoryWebhookStore>,
    dispatcher: Dispatcher,
    sweeper: RetrySweeper,
}

fn harness() -> Harness {
    // Short delays so due times pass within the test.
    harness_with_base(Duration::from_millis(20))
}

fn harness_with_base(base: Duration) -> Harness {
    let store = Arc::new(MemoryWebhookStore::new());
    let dyn_store: Arc<dyn WebhookStore> = store.clone();
    let scheduler = RetryScheduler::new(RetryPolicy::new(base, base * 10));
    let health = HealthTracker::new(dyn_store.clone(), HealthConfig::default());
    let dispatcher =
        Dispatcher::new(dyn_store.clone(), scheduler, health, DispatcherConfig::default()).unwrap();
    let sweeper = RetrySweeper::new(dyn_store, dispatcher.clone(), SweepConfig::default());
    Harness { store, dispatcher, sweeper }
}

async fn sweep_when_due(h: &Harness) -> usize {
    // Longest delay the 20ms base policy can schedule within a test.
    tokio::time::sleep(Duration::from_millis(250)).await;
    h.sweeper.sweep_once().await.unwrap()
}

#[tokio::test]
async fn test_retry_succeeds_on_third_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = harness();
    let endpoint = Endpoint::new("flaky", server.uri()).with_retry_count(3);
    h.store.insert_subscription(Subscription::new(endpoint.id, "config.created"));
    h.store.insert_endpoint(endpoint);

    let results = h.dispatcher.dispatch("config.created", &json!({})).await.unwrap();
    let id = results[0].id;

    let after_first = h.store.get_delivery(id).unwrap();
    assert_eq!(after_first.status, DeliveryStatus::Retrying);
    assert_eq!(after_first.attempt_count, 2);
    let first_due = after_first.next_retry_at.unwrap();

    assert_eq!(sweep_when_due(&h).await, 1);
    let after_second = h.store.get_delivery(id).unwrap();
    assert_eq!(after_second.status, DeliveryStatus::Retrying);
    assert_eq!(after_second.attempt_count, 3);
    assert!(after_second.next_retry_at.unwrap() > first_due);

    assert_eq!(sweep_when_due(&h).await, 1);
    let done = h.store.get_delivery(id).unwrap();
    assert_eq!(done.status, DeliveryStatus::Success);
    assert_eq!(done.attempt_count, 3);
    assert!(done.completed_at.is_some());
    assert!(done.next_retry_at.is_none());
}

#[tokio::test]
async fn test_exhausted_budget_fails_terminally_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let h = harness();
    let endpoint = Endpoint::new("down", server.uri()).with_retry_count(2);
    let endpoint_id = endpoint.id;
    h.store.insert_subscription(Subscription::new(endpoint.id, "audit.event"));
    h.store.insert_endpoint(endpoint);

    let results = h.dispatcher.dispatch("audit.event", &json!({})).await.unwrap();
    let id = results[0].id;
    assert_eq!(h.store.get_delivery(id).unwrap().status, DeliveryStatus::Retrying);

    assert_eq!(sweep_when_due(&h).await, 1);
    let done = h.store.get_delivery(id).unwrap();
    assert_eq!(done.status, DeliveryStatus::Failed);
    assert_eq!(done.attempt_count, 2);
    assert!(done.completed_at.is_some());

    // One lifecycle, one health report, regardless of how many sends failed.
    assert_eq!(h.store.get_endpoint(endpoint_id).unwrap().failure_streak, 1);

    // Nothing left to claim.
    assert_eq!(sweep_when_due(&h).await, 0);
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    let h = harness();
    // Port 1 is never listening; the connect fails immediately.
    let endpoint = Endpoint::new("unreachable", "http://127.0.0.1:1/hook").with_retry_count(3);
    h.store.insert_subscription(Subscription::new(endpoint.id, "system.alert"));
    h.store.insert_endpoint(endpoint);

    let results = h.dispatcher.dispatch("system.alert", &json!({})).await.unwrap();
    let delivery = h.store.get_delivery(results[0].id).unwrap();

    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert!(delivery.response_status.is_none());
    assert!(delivery.error_message.is_some());
    assert!(delivery.next_retry_at.is_some());
}

#[tokio::test]
async fn test_sweep_is_idle_before_due_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let h = harness_with_base(Duration::from_secs(60));
    let endpoint = Endpoint::new("slow", server.uri()).with_retry_count(5);
    h.store.insert_subscription(Subscription::new(endpoint.id, "config.updated"));
    h.store.insert_endpoint(endpoint);

    h.dispatcher.dispatch("config.updated", &json!({})).await.unwrap();

    // Immediately after dispatch the retry is scheduled in the future.
    assert_eq!(h.sweeper.sweep_once().await.unwrap(), 0);
}
