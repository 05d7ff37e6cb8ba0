//! Persistence abstraction for the delivery core.
//!
//! All components communicate through the store rather than in-memory
//! queues, so pending work survives process restarts and is simply
//! picked up by the next sweep.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{DeliveryAttempt, Endpoint, Subscription};

pub use memory::MemoryWebhookStore;
pub use postgres::PostgresWebhookStore;

#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Candidate subscriptions for an event type, restricted to ACTIVE
    /// endpoints. Filter conditions are evaluated in memory by the caller.
    async fn subscriptions_for_event(&self, event_type: &str)
        -> Result<Vec<(Endpoint, Subscription)>>;

    async fn find_endpoint(&self, id: Uuid) -> Result<Option<Endpoint>>;

    async fn insert_delivery(&self, delivery: &DeliveryAttempt) -> Result<()>;

    /// Persist the latest state of an evolving delivery row.
    async fn update_delivery(&self, delivery: &DeliveryAttempt) -> Result<()>;

    /// Claim due retries: atomically flip rows with `status = retrying`
    /// and `next_retry_at <= now` to `pending` (clearing `next_retry_at`)
    /// and return them. Two concurrent sweep workers never both receive
    /// the same row.
    async fn claim_due_retries(&self, now: DateTime<Utc>, limit: i64)
        -> Result<Vec<DeliveryAttempt>>;

    /// Re-queue deliveries stranded in `pending` by a worker that died
    /// between claim (or insert) and send: rows whose last activity is
    /// older than `timeout` move back to `retrying` with an immediate
    /// `next_retry_at`. Returns the number of rows recovered.
    async fn recover_stuck_deliveries(&self, timeout: std::time::Duration) -> Result<u64>;

    /// Record a terminal delivery failure against the endpoint and return
    /// the new consecutive-failure streak.
    async fn record_terminal_failure(&self, endpoint_id: Uuid) -> Result<i64>;

    /// Reset the endpoint's consecutive-failure streak after a success.
    async fn reset_failure_streak(&self, endpoint_id: Uuid) -> Result<()>;

    /// Demote an active endpoint to `failed`. One-directional; recovery
    /// goes through the admin update API.
    async fn mark_endpoint_failed(&self, endpoint_id: Uuid) -> Result<()>;
}
