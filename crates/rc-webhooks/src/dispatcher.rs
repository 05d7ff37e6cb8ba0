//! Webhook dispatcher.
//!
//! Resolves an event to its matching subscriptions, creates one delivery
//! record per match, and executes the HTTP sends concurrently. The same
//! send path serves first attempts, swept retries, and manual test
//! deliveries, so signing, headers, and outcome handling cannot drift
//! between them.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{Result, WebhookError};
use crate::filter;
use crate::health::HealthTracker;
use crate::model::{DeliveryAttempt, DeliveryPayload, Endpoint};
use crate::retry::{RetryDisposition, RetryScheduler};
use crate::signature::{self, SIGNATURE_HEADER};
use crate::store::WebhookStore;

/// Stored response bodies are truncated to this many bytes.
const MAX_RESPONSE_BODY_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// TCP connect timeout for outbound requests. The per-request
    /// deadline comes from the endpoint's `timeout_seconds`.
    pub connect_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10) }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn WebhookStore>,
    client: reqwest::Client,
    scheduler: RetryScheduler,
    health: HealthTracker,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn WebhookStore>,
        scheduler: RetryScheduler,
        health: HealthTracker,
        config: DispatcherConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| WebhookError::Client { message: e.to_string() })?;

        Ok(Self { store, client, scheduler, health })
    }

    /// Dispatch one event to every matching active subscription.
    ///
    /// Returns the delivery records created, in their post-first-attempt
    /// state. An event with no matching subscriptions produces no
    /// records and no error.
    pub async fn dispatch(&self, event_type: &str, payload: &Value) -> Result<Vec<DeliveryAttempt>> {
        // Surface unserializable payloads before any record is created
        // or any request goes out.
        serde_json::to_vec(payload)?;

        let candidates = self.store.subscriptions_for_event(event_type).await?;
        let matches: Vec<_> = candidates
            .into_iter()
            .filter(|(_, sub)| filter::matches(sub.filter_condition.as_ref(), payload))
            .collect();

        if matches.is_empty() {
            debug!("No matching subscriptions for event {}", event_type);
            return Ok(Vec::new());
        }

        info!(
            "Dispatching event {} to {} endpoint(s)",
            event_type,
            matches.len()
        );

        let sends = matches.into_iter().map(|(endpoint, _)| {
            let attempt = DeliveryAttempt::new(endpoint.id, event_type, payload.clone());
            self.deliver(endpoint, attempt)
        });

        let mut results = Vec::new();
        for outcome in futures::future::join_all(sends).await {
            results.push(outcome?);
        }
        Ok(results)
    }

    /// Send a synthetic payload to a single endpoint, bypassing
    /// subscriptions and filters. The endpoint may be in any status;
    /// the outcome still feeds health tracking and the retry schedule.
    pub async fn send_test(
        &self,
        endpoint_id: uuid::Uuid,
        event_type: &str,
        payload: Value,
    ) -> Result<DeliveryAttempt> {
        let endpoint = self
            .store
            .find_endpoint(endpoint_id)
            .await?
            .ok_or_else(|| WebhookError::endpoint_not_found(endpoint_id.to_string()))?;

        let attempt = DeliveryAttempt::new(endpoint.id, event_type, payload);
        self.deliver(endpoint, attempt).await
    }

    /// Execute the first attempt of a new delivery record.
    async fn deliver(
        &self,
        endpoint: Endpoint,
        mut attempt: DeliveryAttempt,
    ) -> Result<DeliveryAttempt> {
        self.store.insert_delivery(&attempt).await?;
        self.execute(&endpoint, &mut attempt).await;
        Ok(attempt)
    }

    /// Execute one send of a claimed retry. The attempt was already
    /// flipped back to pending by the sweep's claim.
    pub(crate) async fn execute_retry(&self, endpoint: &Endpoint, attempt: &mut DeliveryAttempt) {
        self.execute(endpoint, attempt).await;
    }

    /// One HTTP send plus outcome handling. Persists the attempt's new
    /// state and reports terminal outcomes to the health tracker. Store
    /// and health errors are logged rather than propagated; the send
    /// already happened and the in-memory record is authoritative for
    /// the caller.
    async fn execute(&self, endpoint: &Endpoint, attempt: &mut DeliveryAttempt) {
        match self.send_once(endpoint, attempt).await {
            Ok((status, body)) if (200..300).contains(&status) => {
                debug!(
                    "Delivery {} to {} succeeded with HTTP {}",
                    attempt.id, endpoint.url, status
                );
                attempt.mark_success(status, body);
                self.persist(attempt).await;
                self.report_health(endpoint, true).await;
            }
            Ok((status, body)) => {
                let message = format!("HTTP {}", status);
                self.handle_failure(endpoint, attempt, &message, Some(status), body).await;
            }
            Err(message) => {
                self.handle_failure(endpoint, attempt, &message, None, None).await;
            }
        }
    }

    /// Build and fire the signed request. Returns the status code and
    /// truncated body, or a transport error message.
    async fn send_once(
        &self,
        endpoint: &Endpoint,
        attempt: &DeliveryAttempt,
    ) -> std::result::Result<(i32, Option<String>), String> {
        let wire = DeliveryPayload::new(attempt.event_type.clone(), attempt.payload.clone(), attempt.id);
        let body = serde_json::to_vec(&wire).map_err(|e| format!("serialize body: {}", e))?;

        let mut request = self
            .client
            .post(&endpoint.url)
            .timeout(Duration::from_secs(endpoint.timeout_seconds.max(1) as u64))
            .header(CONTENT_TYPE, "application/json");

        for (name, value) in endpoint.header_pairs() {
            request = request.header(name, value);
        }

        if let Some(secret) = endpoint.secret.as_deref() {
            request = request.header(SIGNATURE_HEADER, signature::sign(secret, &body));
        }

        match request.body(body).send().await {
            Ok(response) => {
                let status = response.status().as_u16() as i32;
                let body = match response.text().await {
                    Ok(text) if text.is_empty() => None,
                    Ok(text) => Some(truncate(text)),
                    Err(_) => None,
                };
                Ok((status, body))
            }
            Err(e) if e.is_timeout() => Err(format!(
                "timed out after {}s",
                endpoint.timeout_seconds.max(1)
            )),
            Err(e) if e.is_connect() => Err(format!("connection failed: {}", e)),
            Err(e) => Err(format!("request failed: {}", e)),
        }
    }

    async fn handle_failure(
        &self,
        endpoint: &Endpoint,
        attempt: &mut DeliveryAttempt,
        message: &str,
        response_status: Option<i32>,
        response_body: Option<String>,
    ) {
        let disposition =
            self.scheduler
                .on_failure(attempt, endpoint, message, response_status, response_body);
        self.persist(attempt).await;

        match disposition {
            RetryDisposition::Scheduled(at) => {
                warn!(
                    "Delivery {} to {} failed ({}), retry {} of {} at {}",
                    attempt.id,
                    endpoint.url,
                    message,
                    attempt.attempt_count,
                    endpoint.retry_count,
                    at
                );
            }
            RetryDisposition::Exhausted => {
                warn!(
                    "Delivery {} to {} terminally failed after {} attempt(s): {}",
                    attempt.id, endpoint.url, attempt.attempt_count, message
                );
                self.report_health(endpoint, false).await;
            }
        }
    }

    async fn persist(&self, attempt: &DeliveryAttempt) {
        if let Err(e) = self.store.update_delivery(attempt).await {
            error!("Failed to persist delivery {}: {}", attempt.id, e);
        }
    }

    async fn report_health(&self, endpoint: &Endpoint, success: bool) {
        if let Err(e) = self.health.record_outcome(endpoint, success).await {
            error!("Failed to record health outcome for endpoint {}: {}", endpoint.id, e);
        }
    }
}

fn truncate(text: String) -> String {
    if text.len() <= MAX_RESPONSE_BODY_BYTES {
        return text;
    }
    let mut end = MAX_RESPONSE_BODY_BYTES;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(MAX_RESPONSE_BODY_BYTES); // 2 bytes per char
        let out = truncate(text);
        assert!(out.len() <= MAX_RESPONSE_BODY_BYTES);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_truncate_leaves_short_bodies_alone() {
        assert_eq!(truncate("ok".to_string()), "ok");
    }
}
