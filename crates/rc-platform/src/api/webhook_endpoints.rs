//! Webhook Endpoints Admin API
//!
//! Register and manage the external receivers the dispatcher delivers
//! to. Setting a failed endpoint back to `active` clears its failure
//! streak, so an admin update is the recovery path after auto-disable.

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

use rc_webhooks::{Endpoint, EndpointStatus, PostgresWebhookStore, WebhookError, WebhookStore};

use crate::api::common::{PaginationParams, SuccessResponse};
use crate::error::PlatformError;
use crate::service::AuditService;

/// Create endpoint request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEndpointRequest {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    /// HMAC-SHA256 signing secret; omit for unsigned deliveries
    pub secret: Option<String>,
    /// Custom headers sent with every delivery (JSON object of strings)
    pub headers: Option<serde_json::Value>,
    pub retry_count: Option<i32>,
    pub timeout_seconds: Option<i32>,
    pub created_by: Option<String>,
}

/// Update endpoint request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEndpointRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub secret: Option<String>,
    pub headers: Option<serde_json::Value>,
    pub retry_count: Option<i32>,
    pub timeout_seconds: Option<i32>,
    /// `active`, `inactive`, or `failed`
    pub status: Option<String>,
}

/// Endpoint response DTO. The signing secret is never returned.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResponse {
    pub id: String,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub has_secret: bool,
    pub headers: Option<serde_json::Value>,
    pub retry_count: i32,
    pub timeout_seconds: i32,
    pub status: String,
    pub failure_streak: i32,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Endpoint> for EndpointResponse {
    fn from(ep: Endpoint) -> Self {
        Self {
            id: ep.id.to_string(),
            name: ep.name,
            url: ep.url,
            description: ep.description,
            has_secret: ep.secret.is_some(),
            headers: ep.headers,
            retry_count: ep.retry_count,
            timeout_seconds: ep.timeout_seconds,
            status: ep.status.as_str().to_string(),
            failure_streak: ep.failure_streak,
            created_by: ep.created_by,
            created_at: ep.created_at.to_rfc3339(),
            updated_at: ep.updated_at.to_rfc3339(),
        }
    }
}

/// Query parameters for endpoint list
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EndpointsQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Webhook endpoints service state
#[derive(Clone)]
pub struct WebhookEndpointsState {
    pub store: Arc<PostgresWebhookStore>,
    pub audit: AuditService,
}

fn validate_url(url: &str) -> Result<(), PlatformError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(WebhookError::InvalidUrl { url: url.to_string() }.into())
    }
}

fn validate_limits(retry_count: i32, timeout_seconds: i32) -> Result<(), PlatformError> {
    if !(1..=10).contains(&retry_count) {
        return Err(PlatformError::validation("retryCount must be between 1 and 10"));
    }
    if !(1..=300).contains(&timeout_seconds) {
        return Err(PlatformError::validation(
            "timeoutSeconds must be between 1 and 300",
        ));
    }
    Ok(())
}

/// Register a webhook endpoint
#[utoipa::path(
    post,
    path = "",
    tag = "webhook-endpoints",
    request_body = CreateEndpointRequest,
    responses(
        (status = 201, description = "Endpoint registered", body = EndpointResponse),
        (status = 400, description = "Invalid URL or limits")
    )
)]
pub async fn create_endpoint(
    State(state): State<WebhookEndpointsState>,
    Json(req): Json<CreateEndpointRequest>,
) -> Result<(StatusCode, Json<EndpointResponse>), PlatformError> {
    validate_url(&req.url)?;

    let mut endpoint = Endpoint::new(&req.name, &req.url);
    endpoint.description = req.description;
    endpoint.secret = req.secret;
    endpoint.headers = req.headers;
    endpoint.created_by = req.created_by;
    if let Some(retry_count) = req.retry_count {
        endpoint.retry_count = retry_count;
    }
    if let Some(timeout_seconds) = req.timeout_seconds {
        endpoint.timeout_seconds = timeout_seconds;
    }
    validate_limits(endpoint.retry_count, endpoint.timeout_seconds)?;

    state.store.insert_endpoint(&endpoint).await?;
    state
        .audit
        .record_create("system", "webhook_endpoint", &endpoint.id.to_string())
        .await;
    Ok((StatusCode::CREATED, Json(endpoint.into())))
}

/// List webhook endpoints
#[utoipa::path(
    get,
    path = "",
    tag = "webhook-endpoints",
    params(EndpointsQuery),
    responses(
        (status = 200, description = "Registered endpoints, newest first", body = Vec<EndpointResponse>)
    )
)]
pub async fn list_endpoints(
    State(state): State<WebhookEndpointsState>,
    Query(query): Query<EndpointsQuery>,
) -> Result<Json<Vec<EndpointResponse>>, PlatformError> {
    let endpoints = state
        .store
        .list_endpoints(query.pagination.offset(), query.pagination.limit())
        .await?;
    Ok(Json(endpoints.into_iter().map(Into::into).collect()))
}

/// Get a webhook endpoint by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "webhook-endpoints",
    params(("id" = String, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Endpoint found", body = EndpointResponse),
        (status = 404, description = "Endpoint not found")
    )
)]
pub async fn get_endpoint(
    State(state): State<WebhookEndpointsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EndpointResponse>, PlatformError> {
    let endpoint = state
        .store
        .find_endpoint(id)
        .await?
        .ok_or_else(|| WebhookError::endpoint_not_found(id.to_string()))?;
    Ok(Json(endpoint.into()))
}

/// Update a webhook endpoint
///
/// Setting status back to `active` resets the failure streak, which is
/// how a `failed` endpoint re-enters delivery.
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "webhook-endpoints",
    params(("id" = String, Path, description = "Endpoint ID")),
    request_body = UpdateEndpointRequest,
    responses(
        (status = 200, description = "Endpoint updated", body = EndpointResponse),
        (status = 400, description = "Invalid URL, status, or limits"),
        (status = 404, description = "Endpoint not found")
    )
)]
pub async fn update_endpoint(
    State(state): State<WebhookEndpointsState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEndpointRequest>,
) -> Result<Json<EndpointResponse>, PlatformError> {
    let mut endpoint = state
        .store
        .find_endpoint(id)
        .await?
        .ok_or_else(|| WebhookError::endpoint_not_found(id.to_string()))?;

    if let Some(name) = req.name {
        endpoint.name = name;
    }
    if let Some(url) = req.url {
        validate_url(&url)?;
        endpoint.url = url;
    }
    if req.description.is_some() {
        endpoint.description = req.description;
    }
    if req.secret.is_some() {
        endpoint.secret = req.secret;
    }
    if req.headers.is_some() {
        endpoint.headers = req.headers;
    }
    if let Some(retry_count) = req.retry_count {
        endpoint.retry_count = retry_count;
    }
    if let Some(timeout_seconds) = req.timeout_seconds {
        endpoint.timeout_seconds = timeout_seconds;
    }
    validate_limits(endpoint.retry_count, endpoint.timeout_seconds)?;

    if let Some(status) = req.status.as_deref() {
        let status = EndpointStatus::parse(status)
            .ok_or_else(|| PlatformError::validation(format!("Invalid status: {}", status)))?;
        if status == EndpointStatus::Active && endpoint.status != EndpointStatus::Active {
            endpoint.failure_streak = 0;
        }
        endpoint.status = status;
    }
    endpoint.updated_at = chrono::Utc::now();

    state.store.update_endpoint(&endpoint).await?;
    state
        .audit
        .record_update("system", "webhook_endpoint", &endpoint.id.to_string(), None, None)
        .await;
    Ok(Json(endpoint.into()))
}

/// Delete a webhook endpoint
///
/// Subscriptions and delivery history cascade.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "webhook-endpoints",
    params(("id" = String, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Endpoint deleted", body = SuccessResponse),
        (status = 404, description = "Endpoint not found")
    )
)]
pub async fn delete_endpoint(
    State(state): State<WebhookEndpointsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    if !state.store.delete_endpoint(id).await? {
        return Err(WebhookError::endpoint_not_found(id.to_string()).into());
    }
    state
        .audit
        .record_delete("system", "webhook_endpoint", &id.to_string())
        .await;
    Ok(Json(SuccessResponse::with_message("Endpoint deleted")))
}

/// Create webhook endpoints router
pub fn webhook_endpoints_router(state: WebhookEndpointsState) -> Router {
    Router::new()
        .route("/", post(create_endpoint).get(list_endpoints))
        .route(
            "/:id",
            get(get_endpoint).put(update_endpoint).delete(delete_endpoint),
        )
        .with_state(state)
}
