//! In-memory webhook store.
//!
//! Backs integration tests and local development without a database.
//! A single mutex makes every store operation atomic, which is exactly
//! the discipline the claim step relies on.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{DeliveryAttempt, DeliveryStatus, Endpoint, EndpointStatus, Subscription};
use crate::store::WebhookStore;

#[derive(Default)]
struct Inner {
    endpoints: HashMap<Uuid, Endpoint>,
    subscriptions: Vec<Subscription>,
    deliveries: HashMap<Uuid, DeliveryAttempt>,
}

#[derive(Default)]
pub struct MemoryWebhookStore {
    inner: Mutex<Inner>,
}

impl MemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_endpoint(&self, endpoint: Endpoint) {
        self.inner.lock().endpoints.insert(endpoint.id, endpoint);
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        self.inner.lock().subscriptions.push(subscription);
    }

    pub fn get_endpoint(&self, id: Uuid) -> Option<Endpoint> {
        self.inner.lock().endpoints.get(&id).cloned()
    }

    pub fn get_delivery(&self, id: Uuid) -> Option<DeliveryAttempt> {
        self.inner.lock().deliveries.get(&id).cloned()
    }

    pub fn deliveries(&self) -> Vec<DeliveryAttempt> {
        self.inner.lock().deliveries.values().cloned().collect()
    }
}

#[async_trait]
impl WebhookStore for MemoryWebhookStore {
    async fn subscriptions_for_event(
        &self,
        event_type: &str,
    ) -> Result<Vec<(Endpoint, Subscription)>> {
        let inner = self.inner.lock();
        Ok(inner
            .subscriptions
            .iter()
            .filter(|s| s.event_type == event_type)
            .filter_map(|s| {
                inner
                    .endpoints
                    .get(&s.endpoint_id)
                    .filter(|e| e.status == EndpointStatus::Active)
                    .map(|e| (e.clone(), s.clone()))
            })
            .collect())
    }

    async fn find_endpoint(&self, id: Uuid) -> Result<Option<Endpoint>> {
        Ok(self.inner.lock().endpoints.get(&id).cloned())
    }

    async fn insert_delivery(&self, delivery: &DeliveryAttempt) -> Result<()> {
        self.inner.lock().deliveries.insert(delivery.id, delivery.clone());
        Ok(())
    }

    async fn update_delivery(&self, delivery: &DeliveryAttempt) -> Result<()> {
        self.inner.lock().deliveries.insert(delivery.id, delivery.clone());
        Ok(())
    }

    async fn claim_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>> {
        let mut inner = self.inner.lock();
        let mut due: Vec<(DateTime<Utc>, Uuid)> = inner
            .deliveries
            .values()
            .filter(|d| d.status == DeliveryStatus::Retrying)
            .filter_map(|d| d.next_retry_at.filter(|at| *at <= now).map(|at| (at, d.id)))
            .collect();
        due.sort();
        due.truncate(limit.max(0) as usize);
        let due: Vec<Uuid> = due.into_iter().map(|(_, id)| id).collect();

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            if let Some(delivery) = inner.deliveries.get_mut(&id) {
                // Compare-and-set under the lock: the marker flip is the claim.
                delivery.status = DeliveryStatus::Pending;
                delivery.next_retry_at = None;
                claimed.push(delivery.clone());
            }
        }
        Ok(claimed)
    }

    async fn recover_stuck_deliveries(&self, timeout: std::time::Duration) -> Result<u64> {
        let grace = chrono::Duration::from_std(timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000));
        let now = Utc::now();
        let cutoff = now - grace;

        let mut inner = self.inner.lock();
        let mut recovered = 0;
        for delivery in inner.deliveries.values_mut() {
            if delivery.status == DeliveryStatus::Pending
                && delivery.last_attempt_at.unwrap_or(delivery.created_at) <= cutoff
            {
                delivery.status = DeliveryStatus::Retrying;
                delivery.next_retry_at = Some(now);
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn record_terminal_failure(&self, endpoint_id: Uuid) -> Result<i64> {
        let mut inner = self.inner.lock();
        match inner.endpoints.get_mut(&endpoint_id) {
            Some(endpoint) => {
                endpoint.failure_streak += 1;
                endpoint.updated_at = Utc::now();
                Ok(endpoint.failure_streak as i64)
            }
            None => Ok(0),
        }
    }

    async fn reset_failure_streak(&self, endpoint_id: Uuid) -> Result<()> {
        if let Some(endpoint) = self.inner.lock().endpoints.get_mut(&endpoint_id) {
            endpoint.failure_streak = 0;
            endpoint.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_endpoint_failed(&self, endpoint_id: Uuid) -> Result<()> {
        if let Some(endpoint) = self.inner.lock().endpoints.get_mut(&endpoint_id) {
            if endpoint.status == EndpointStatus::Active {
                endpoint.status = EndpointStatus::Failed;
                endpoint.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}
