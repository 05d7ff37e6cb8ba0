//! Webhook Deliveries Admin API
//!
//! Read access to delivery history plus a manual test dispatch that
//! goes through the full signing and retry pipeline.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use rc_webhooks::{DeliveryAttempt, Dispatcher, PostgresWebhookStore, WebhookEventType};

use crate::api::common::PaginationParams;
use crate::error::PlatformError;

/// Delivery response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub id: String,
    pub endpoint_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempt_count: i32,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub last_attempt_at: Option<String>,
    pub next_retry_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<DeliveryAttempt> for DeliveryResponse {
    fn from(d: DeliveryAttempt) -> Self {
        Self {
            id: d.id.to_string(),
            endpoint_id: d.endpoint_id.to_string(),
            event_type: d.event_type,
            payload: d.payload,
            status: d.status.as_str().to_string(),
            attempt_count: d.attempt_count,
            response_status: d.response_status,
            response_body: d.response_body,
            error_message: d.error_message,
            created_at: d.created_at.to_rfc3339(),
            last_attempt_at: d.last_attempt_at.map(|t| t.to_rfc3339()),
            next_retry_at: d.next_retry_at.map(|t| t.to_rfc3339()),
            completed_at: d.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Test delivery request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestDeliveryRequest {
    /// Event type to label the test with; defaults to `system.alert`
    pub event_type: Option<String>,
    /// Payload to send; defaults to a small marker object
    pub payload: Option<serde_json::Value>,
}

/// Query parameters for delivery history
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DeliveriesQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    /// Endpoint whose deliveries to list
    pub endpoint_id: Uuid,
}

/// Webhook deliveries service state
#[derive(Clone)]
pub struct WebhookDeliveriesState {
    pub store: Arc<PostgresWebhookStore>,
    pub dispatcher: Arc<Dispatcher>,
}

/// List deliveries for an endpoint
#[utoipa::path(
    get,
    path = "",
    tag = "webhook-deliveries",
    params(DeliveriesQuery),
    responses(
        (status = 200, description = "Delivery history, newest first", body = Vec<DeliveryResponse>)
    )
)]
pub async fn list_deliveries(
    State(state): State<WebhookDeliveriesState>,
    Query(query): Query<DeliveriesQuery>,
) -> Result<Json<Vec<DeliveryResponse>>, PlatformError> {
    let deliveries = state
        .store
        .deliveries_for_endpoint(
            query.endpoint_id,
            query.pagination.offset(),
            query.pagination.limit(),
        )
        .await?;
    Ok(Json(deliveries.into_iter().map(Into::into).collect()))
}

/// Get a delivery by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "webhook-deliveries",
    params(("id" = String, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery found", body = DeliveryResponse),
        (status = 404, description = "Delivery not found")
    )
)]
pub async fn get_delivery(
    State(state): State<WebhookDeliveriesState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryResponse>, PlatformError> {
    let delivery = state
        .store
        .find_delivery(id)
        .await?
        .ok_or_else(|| PlatformError::not_found("WebhookDelivery", id.to_string()))?;
    Ok(Json(delivery.into()))
}

/// Send a test delivery to an endpoint
///
/// Bypasses subscriptions but not signing, retries, or health
/// tracking, so the resulting record reflects real delivery behavior.
#[utoipa::path(
    post,
    path = "/test/{endpoint_id}",
    tag = "webhook-deliveries",
    params(("endpoint_id" = String, Path, description = "Endpoint ID")),
    request_body = TestDeliveryRequest,
    responses(
        (status = 200, description = "Delivery attempted", body = DeliveryResponse),
        (status = 400, description = "Unknown event type"),
        (status = 404, description = "Endpoint not found")
    )
)]
pub async fn send_test_delivery(
    State(state): State<WebhookDeliveriesState>,
    Path(endpoint_id): Path<Uuid>,
    Json(req): Json<TestDeliveryRequest>,
) -> Result<Json<DeliveryResponse>, PlatformError> {
    let event_type = match req.event_type.as_deref() {
        Some(s) => WebhookEventType::parse(s)?,
        None => WebhookEventType::SystemAlert,
    };
    let payload = req.payload.unwrap_or_else(|| json!({"test": true}));

    let delivery = state
        .dispatcher
        .send_test(endpoint_id, event_type.as_str(), payload)
        .await?;
    Ok(Json(delivery.into()))
}

/// Create webhook deliveries router
pub fn webhook_deliveries_router(state: WebhookDeliveriesState) -> Router {
    Router::new()
        .route("/", get(list_deliveries))
        .route("/test/:endpoint_id", post(send_test_delivery))
        .route("/:id", get(get_delivery))
        .with_state(state)
}
