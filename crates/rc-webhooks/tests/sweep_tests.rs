//! Integration tests for the claim step and sweep edge cases.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use rc_webhooks::{
    DeliveryAttempt, DeliveryStatus, Dispatcher, DispatcherConfig, Endpoint, EndpointStatus,
    HealthConfig, HealthTracker, MemoryWebhookStore, RetryPolicy, RetryScheduler, RetrySweeper,
    Subscription, SweepConfig, WebhookStore,
};

fn due_retry(endpoint_id: Uuid) -> DeliveryAttempt {
    let mut attempt = DeliveryAttempt::new(endpoint_id, "config.created", json!({}));
    attempt.status = DeliveryStatus::Retrying;
    attempt.attempt_count = 2;
    attempt.next_retry_at = Some(Utc::now() - chrono::Duration::seconds(1));
    attempt
}

fn sweeper(store: Arc<MemoryWebhookStore>) -> RetrySweeper {
    sweeper_with(store, SweepConfig::default())
}

fn sweeper_with(store: Arc<MemoryWebhookStore>, config: SweepConfig) -> RetrySweeper {
    let dyn_store: Arc<dyn WebhookStore> = store;
    let scheduler = RetryScheduler::new(RetryPolicy::new(
        Duration::from_millis(20),
        Duration::from_millis(200),
    ));
    let health = HealthTracker::new(dyn_store.clone(), HealthConfig::default());
    let dispatcher =
        Dispatcher::new(dyn_store.clone(), scheduler, health, DispatcherConfig::default()).unwrap();
    RetrySweeper::new(dyn_store, dispatcher, config)
}

#[tokio::test]
async fn test_concurrent_claims_never_share_a_row() {
    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("ep", "http://127.0.0.1:1/hook");
    let attempt = due_retry(endpoint.id);
    store.insert_endpoint(endpoint);
    store.insert_delivery(&attempt).await.unwrap();

    // Two sweep workers racing for the same due row.
    let (a, b) = tokio::join!(
        store.claim_due_retries(Utc::now(), 10),
        store.claim_due_retries(Utc::now(), 10),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(a.len() + b.len(), 1, "exactly one worker must win the claim");
    let winner = a.into_iter().chain(b).next().unwrap();
    assert_eq!(winner.id, attempt.id);
    assert_eq!(winner.status, DeliveryStatus::Pending);
    assert!(winner.next_retry_at.is_none());
}

#[tokio::test]
async fn test_claim_respects_batch_limit_and_due_order() {
    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("ep", "http://127.0.0.1:1/hook");
    let endpoint_id = endpoint.id;
    store.insert_endpoint(endpoint);

    let mut ids = Vec::new();
    for age in [30, 20, 10] {
        let mut attempt = due_retry(endpoint_id);
        attempt.next_retry_at = Some(Utc::now() - chrono::Duration::seconds(age));
        ids.push(attempt.id);
        store.insert_delivery(&attempt).await.unwrap();
    }

    let claimed = store.claim_due_retries(Utc::now(), 2).await.unwrap();
    assert_eq!(claimed.len(), 2);
    // Oldest due first.
    assert_eq!(claimed[0].id, ids[0]);
    assert_eq!(claimed[1].id, ids[1]);

    let rest = store.claim_due_retries(Utc::now(), 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, ids[2]);
}

#[tokio::test]
async fn test_future_and_terminal_rows_are_not_claimed() {
    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("ep", "http://127.0.0.1:1/hook");
    let endpoint_id = endpoint.id;
    store.insert_endpoint(endpoint);

    let mut future = due_retry(endpoint_id);
    future.next_retry_at = Some(Utc::now() + chrono::Duration::minutes(5));
    store.insert_delivery(&future).await.unwrap();

    let mut done = due_retry(endpoint_id);
    done.mark_success(200, None);
    store.insert_delivery(&done).await.unwrap();

    assert!(store.claim_due_retries(Utc::now(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sweep_drops_retry_for_disabled_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let mut endpoint = Endpoint::new("paused", server.uri());
    endpoint.status = EndpointStatus::Inactive;
    let endpoint_id = endpoint.id;
    let attempt = due_retry(endpoint.id);
    store.insert_endpoint(endpoint);
    store.insert_delivery(&attempt).await.unwrap();

    assert_eq!(sweeper(store.clone()).sweep_once().await.unwrap(), 1);

    let delivery = store.get_delivery(attempt.id).unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert!(delivery.completed_at.is_some());
    // The endpoint did not fail; its health is untouched.
    assert_eq!(store.get_endpoint(endpoint_id).unwrap().failure_streak, 0);
}

#[tokio::test]
async fn test_sweep_closes_retry_for_deleted_endpoint() {
    let store = Arc::new(MemoryWebhookStore::new());
    let attempt = due_retry(Uuid::new_v4());
    store.insert_delivery(&attempt).await.unwrap();

    assert_eq!(sweeper(store.clone()).sweep_once().await.unwrap(), 1);

    let delivery = store.get_delivery(attempt.id).unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.error_message.as_deref(), Some("endpoint no longer exists"));
}

#[tokio::test]
async fn test_abandoned_claim_is_recovered_and_redispatched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("ep", server.uri());
    let attempt = due_retry(endpoint.id);
    store.insert_endpoint(endpoint);
    store.insert_delivery(&attempt).await.unwrap();

    // A worker claims the row, then dies before sending. The row is now
    // pending with no retry schedule, invisible to a plain claim.
    assert_eq!(store.claim_due_retries(Utc::now(), 10).await.unwrap().len(), 1);
    assert!(store.claim_due_retries(Utc::now(), 10).await.unwrap().is_empty());

    // Once the grace period has elapsed, the next sweep re-queues the
    // row and delivers it.
    let config = SweepConfig { stuck_timeout: Duration::ZERO, ..SweepConfig::default() };
    assert_eq!(sweeper_with(store.clone(), config).sweep_once().await.unwrap(), 1);

    let delivery = store.get_delivery(attempt.id).unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert!(delivery.completed_at.is_some());
}

#[tokio::test]
async fn test_in_flight_first_send_is_not_recovered_early() {
    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("ep", "http://127.0.0.1:1/hook");
    let attempt = DeliveryAttempt::new(endpoint.id, "config.created", json!({}));
    store.insert_endpoint(endpoint);
    store.insert_delivery(&attempt).await.unwrap();

    // A freshly inserted pending row belongs to a live worker; the
    // default grace period leaves it alone.
    assert_eq!(sweeper(store.clone()).sweep_once().await.unwrap(), 0);

    let delivery = store.get_delivery(attempt.id).unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Pending);
    assert!(delivery.next_retry_at.is_none());
}

#[tokio::test]
async fn test_sweep_redispatches_claimed_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryWebhookStore::new());
    let endpoint = Endpoint::new("ep", server.uri());
    let mut attempt = due_retry(endpoint.id);
    attempt.event_type = "system.alert".to_string();
    store.insert_subscription(Subscription::new(endpoint.id, "system.alert"));
    store.insert_endpoint(endpoint);
    store.insert_delivery(&attempt).await.unwrap();

    assert_eq!(sweeper(store.clone()).sweep_once().await.unwrap(), 1);

    let delivery = store.get_delivery(attempt.id).unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Success);
    // Redispatch reuses the row; no second record appears.
    assert_eq!(store.deliveries().len(), 1);
}
