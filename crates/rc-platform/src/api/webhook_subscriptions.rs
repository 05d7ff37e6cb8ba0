//! Webhook Subscriptions Admin API
//!
//! Bind endpoints to event types. Event types and filter shapes are
//! validated here, at configuration time, so a bad subscription is a
//! 400 to the caller instead of a delivery that silently never matches.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use rc_webhooks::{filter, PostgresWebhookStore, Subscription, WebhookError, WebhookEventType, WebhookStore};

use crate::api::common::SuccessResponse;
use crate::error::PlatformError;
use crate::service::AuditService;

/// Create subscription request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub endpoint_id: Uuid,
    pub event_type: String,
    /// Optional payload predicate; deliveries are skipped when it fails
    pub filter_condition: Option<serde_json::Value>,
}

/// Subscription response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: String,
    pub endpoint_id: String,
    pub event_type: String,
    pub filter_condition: Option<serde_json::Value>,
    pub created_at: String,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id.to_string(),
            endpoint_id: sub.endpoint_id.to_string(),
            event_type: sub.event_type,
            filter_condition: sub.filter_condition,
            created_at: sub.created_at.to_rfc3339(),
        }
    }
}

/// Query parameters for subscription list
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SubscriptionsQuery {
    /// Endpoint whose subscriptions to list
    pub endpoint_id: Uuid,
}

/// Event type catalog entry
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeResponse {
    pub event_type: String,
}

/// Webhook subscriptions service state
#[derive(Clone)]
pub struct WebhookSubscriptionsState {
    pub store: Arc<PostgresWebhookStore>,
    pub audit: AuditService,
}

/// Subscribe an endpoint to an event type
#[utoipa::path(
    post,
    path = "",
    tag = "webhook-subscriptions",
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = SubscriptionResponse),
        (status = 400, description = "Unknown event type or malformed filter"),
        (status = 404, description = "Endpoint not found"),
        (status = 409, description = "Endpoint already subscribed to this event type")
    )
)]
pub async fn create_subscription(
    State(state): State<WebhookSubscriptionsState>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), PlatformError> {
    let event_type = WebhookEventType::parse(&req.event_type)?;
    if let Some(condition) = req.filter_condition.as_ref() {
        filter::validate(condition)?;
    }

    if state.store.find_endpoint(req.endpoint_id).await?.is_none() {
        return Err(WebhookError::endpoint_not_found(req.endpoint_id.to_string()).into());
    }
    if state
        .store
        .subscription_exists(req.endpoint_id, event_type.as_str())
        .await?
    {
        return Err(PlatformError::duplicate(
            "WebhookSubscription",
            "eventType",
            event_type.as_str(),
        ));
    }

    let mut subscription = Subscription::new(req.endpoint_id, event_type.as_str());
    subscription.filter_condition = req.filter_condition;

    state.store.insert_subscription(&subscription).await?;
    state
        .audit
        .record_create("system", "webhook_subscription", &subscription.id.to_string())
        .await;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

/// List subscriptions for an endpoint
#[utoipa::path(
    get,
    path = "",
    tag = "webhook-subscriptions",
    params(SubscriptionsQuery),
    responses(
        (status = 200, description = "Subscriptions for the endpoint", body = Vec<SubscriptionResponse>)
    )
)]
pub async fn list_subscriptions(
    State(state): State<WebhookSubscriptionsState>,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<Vec<SubscriptionResponse>>, PlatformError> {
    let subscriptions = state.store.list_subscriptions(query.endpoint_id).await?;
    Ok(Json(subscriptions.into_iter().map(Into::into).collect()))
}

/// List supported event types
#[utoipa::path(
    get,
    path = "/event-types",
    tag = "webhook-subscriptions",
    responses(
        (status = 200, description = "Event type catalog", body = Vec<EventTypeResponse>)
    )
)]
pub async fn list_event_types() -> Json<Vec<EventTypeResponse>> {
    Json(
        WebhookEventType::all()
            .iter()
            .map(|et| EventTypeResponse {
                event_type: et.as_str().to_string(),
            })
            .collect(),
    )
}

/// Get a subscription by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "webhook-subscriptions",
    params(("id" = String, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Subscription found", body = SubscriptionResponse),
        (status = 404, description = "Subscription not found")
    )
)]
pub async fn get_subscription(
    State(state): State<WebhookSubscriptionsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubscriptionResponse>, PlatformError> {
    let subscription = state
        .store
        .find_subscription(id)
        .await?
        .ok_or_else(|| PlatformError::not_found("WebhookSubscription", id.to_string()))?;
    Ok(Json(subscription.into()))
}

/// Delete a subscription
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "webhook-subscriptions",
    params(("id" = String, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Subscription deleted", body = SuccessResponse),
        (status = 404, description = "Subscription not found")
    )
)]
pub async fn delete_subscription(
    State(state): State<WebhookSubscriptionsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    if !state.store.delete_subscription(id).await? {
        return Err(PlatformError::not_found("WebhookSubscription", id.to_string()));
    }
    state
        .audit
        .record_delete("system", "webhook_subscription", &id.to_string())
        .await;
    Ok(Json(SuccessResponse::with_message("Subscription deleted")))
}

/// Create webhook subscriptions router
pub fn webhook_subscriptions_router(state: WebhookSubscriptionsState) -> Router {
    Router::new()
        .route("/", post(create_subscription).get(list_subscriptions))
        .route("/event-types", get(list_event_types))
        .route("/:id", get(get_subscription).delete(delete_subscription))
        .with_state(state)
}
