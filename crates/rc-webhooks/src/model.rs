//! Webhook Domain Entities
//!
//! Endpoints, subscriptions, and delivery attempts. These are the only
//! durable artifacts of the delivery subsystem; every component
//! communicates through them via the [`WebhookStore`](crate::store::WebhookStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WebhookError;

/// Event types the platform emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventType {
    ConfigCreated,
    ConfigUpdated,
    ConfigDeleted,
    FeatureFlagCreated,
    FeatureFlagUpdated,
    FeatureFlagDeleted,
    AuditEvent,
    SystemAlert,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigCreated => "config.created",
            Self::ConfigUpdated => "config.updated",
            Self::ConfigDeleted => "config.deleted",
            Self::FeatureFlagCreated => "feature_flag.created",
            Self::FeatureFlagUpdated => "feature_flag.updated",
            Self::FeatureFlagDeleted => "feature_flag.deleted",
            Self::AuditEvent => "audit.event",
            Self::SystemAlert => "system.alert",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WebhookError> {
        match s {
            "config.created" => Ok(Self::ConfigCreated),
            "config.updated" => Ok(Self::ConfigUpdated),
            "config.deleted" => Ok(Self::ConfigDeleted),
            "feature_flag.created" => Ok(Self::FeatureFlagCreated),
            "feature_flag.updated" => Ok(Self::FeatureFlagUpdated),
            "feature_flag.deleted" => Ok(Self::FeatureFlagDeleted),
            "audit.event" => Ok(Self::AuditEvent),
            "system.alert" => Ok(Self::SystemAlert),
            other => Err(WebhookError::InvalidEventType { value: other.to_string() }),
        }
    }

    pub fn all() -> &'static [WebhookEventType] {
        &[
            Self::ConfigCreated,
            Self::ConfigUpdated,
            Self::ConfigDeleted,
            Self::FeatureFlagCreated,
            Self::FeatureFlagUpdated,
            Self::FeatureFlagDeleted,
            Self::AuditEvent,
            Self::SystemAlert,
        ]
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration state of an endpoint.
///
/// `Failed` is set only by the health tracker after sustained terminal
/// failures; recovery requires an explicit admin update back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Active,
    Inactive,
    Failed,
}

impl EndpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Lifecycle state of a delivery attempt record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
    Retrying,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "retrying" => Some(Self::Retrying),
            _ => None,
        }
    }
}

/// A registered external HTTP receiver of webhook events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    /// HMAC-SHA256 signing secret. When absent, requests are unsigned.
    pub secret: Option<String>,
    /// Custom headers merged into every outbound request (JSON object of strings).
    pub headers: Option<serde_json::Value>,
    /// Retry budget: total attempts a delivery may consume.
    pub retry_count: i32,
    /// Hard upper bound on each HTTP send, in seconds.
    pub timeout_seconds: i32,
    pub status: EndpointStatus,
    /// Consecutive terminal failures recorded by the health tracker.
    pub failure_streak: i32,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            description: None,
            secret: None,
            headers: None,
            retry_count: 3,
            timeout_seconds: 5,
            status: EndpointStatus::Active,
            failure_streak: 0,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_retry_count(mut self, retry_count: i32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: i32) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_headers(mut self, headers: serde_json::Value) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == EndpointStatus::Active
    }

    /// Custom headers as string pairs, skipping non-string values.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        match self.headers.as_ref().and_then(|h| h.as_object()) {
            Some(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// A binding of one endpoint to one event type plus an optional filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    /// Structured predicate over payload fields; `None` matches everything.
    pub filter_condition: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(endpoint_id: Uuid, event_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            event_type: event_type.into(),
            filter_condition: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_filter(mut self, condition: serde_json::Value) -> Self {
        self.filter_condition = Some(condition);
        self
    }
}

/// A durable record of one dispatch-and-retry lifecycle for one
/// (event, endpoint) pair. Retries mutate this row in place; it is
/// never deleted by the delivery core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempt_count: i32,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Set only while status = retrying; cleared on claim, success, or
    /// terminal failure.
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Set exactly once, on the attempt that ends the lifecycle.
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeliveryAttempt {
    /// New pending delivery; the first send counts as attempt 1.
    pub fn new(endpoint_id: Uuid, event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            event_type: event_type.into(),
            payload,
            status: DeliveryStatus::Pending,
            attempt_count: 1,
            response_status: None,
            response_body: None,
            error_message: None,
            created_at: Utc::now(),
            last_attempt_at: None,
            next_retry_at: None,
            completed_at: None,
        }
    }

    /// Record a 2xx outcome and close the lifecycle.
    pub fn mark_success(&mut self, response_status: i32, response_body: Option<String>) {
        let now = Utc::now();
        self.status = DeliveryStatus::Success;
        self.response_status = Some(response_status);
        self.response_body = response_body;
        self.error_message = None;
        self.last_attempt_at = Some(now);
        self.next_retry_at = None;
        self.completed_at = Some(now);
    }

    /// Record a terminal failure and close the lifecycle.
    pub fn mark_terminal_failure(
        &mut self,
        error_message: impl Into<String>,
        response_status: Option<i32>,
        response_body: Option<String>,
    ) {
        let now = Utc::now();
        self.status = DeliveryStatus::Failed;
        self.error_message = Some(error_message.into());
        self.response_status = response_status;
        self.response_body = response_body;
        self.last_attempt_at = Some(now);
        self.next_retry_at = None;
        self.completed_at = Some(now);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DeliveryStatus::Success | DeliveryStatus::Failed)
    }
}

/// Wire body for outbound webhook requests.
///
/// Serialized once per dispatch; the signature (when present) is the
/// HMAC-SHA256 of exactly these bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub event_type: String,
    pub payload: serde_json::Value,
    /// RFC 3339 / ISO-8601 timestamp of the dispatch.
    pub timestamp: String,
    pub delivery_id: Uuid,
}

impl DeliveryPayload {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value, delivery_id: Uuid) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now().to_rfc3339(),
            delivery_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_round_trip() {
        for et in WebhookEventType::all() {
            assert_eq!(WebhookEventType::parse(et.as_str()).unwrap(), *et);
        }
        assert!(WebhookEventType::parse("bogus.event").is_err());
    }

    #[test]
    fn test_new_delivery_starts_at_attempt_one() {
        let d = DeliveryAttempt::new(Uuid::new_v4(), "config.created", json!({"k": "v"}));
        assert_eq!(d.status, DeliveryStatus::Pending);
        assert_eq!(d.attempt_count, 1);
        assert!(d.completed_at.is_none());
        assert!(d.next_retry_at.is_none());
    }

    #[test]
    fn test_mark_success_clears_retry_state() {
        let mut d = DeliveryAttempt::new(Uuid::new_v4(), "config.created", json!({}));
        d.status = DeliveryStatus::Retrying;
        d.next_retry_at = Some(Utc::now());
        d.mark_success(200, Some("ok".to_string()));
        assert_eq!(d.status, DeliveryStatus::Success);
        assert!(d.next_retry_at.is_none());
        assert!(d.completed_at.is_some());
        assert!(d.error_message.is_none());
    }

    #[test]
    fn test_header_pairs_skips_non_string_values() {
        let ep = Endpoint::new("ep", "http://example.com/hook")
            .with_headers(json!({"X-Tag": "a", "X-Num": 7}));
        let pairs = ep.header_pairs();
        assert_eq!(pairs, vec![("X-Tag".to_string(), "a".to_string())]);
    }
}
