//! Notifications API
//!
//! Create notifications and track their delivered/read lifecycle.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::common::PaginationParams;
use crate::domain::{
    Notification, NotificationPriority, NotificationStatus, NotificationType,
};
use crate::error::PlatformError;
use crate::repository::NotificationRepository;

/// Create notification request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub title: String,
    pub message: String,
    pub notification_type: Option<String>,
    pub priority: Option<String>,
    pub recipient_id: String,
    pub recipient_type: String,
    pub sender_id: Option<String>,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
    pub expires_at: Option<String>,
}

/// Notification response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub priority: String,
    pub status: String,
    pub recipient_id: String,
    pub recipient_type: String,
    pub sender_id: Option<String>,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
    pub created_at: String,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
    pub expires_at: Option<String>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.to_string(),
            title: n.title,
            message: n.message,
            notification_type: n.notification_type.as_str().to_string(),
            priority: n.priority.as_str().to_string(),
            status: n.status.as_str().to_string(),
            recipient_id: n.recipient_id,
            recipient_type: n.recipient_type,
            sender_id: n.sender_id,
            data: n.data,
            action_url: n.action_url,
            created_at: n.created_at.to_rfc3339(),
            delivered_at: n.delivered_at.map(|t| t.to_rfc3339()),
            read_at: n.read_at.map(|t| t.to_rfc3339()),
            expires_at: n.expires_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Query parameters for notification list
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationsQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    /// Recipient whose notifications to list
    pub recipient_id: String,

    /// Filter by status
    pub status: Option<String>,
}

/// Notifications service state
#[derive(Clone)]
pub struct NotificationsState {
    pub notification_repo: Arc<NotificationRepository>,
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, PlatformError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PlatformError::validation(format!("Invalid timestamp: {}", s)))
}

/// Create a notification
#[utoipa::path(
    post,
    path = "",
    tag = "notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = NotificationResponse),
        (status = 400, description = "Invalid type or priority")
    )
)]
pub async fn create_notification(
    State(state): State<NotificationsState>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>), PlatformError> {
    if req.recipient_type != "user" && req.recipient_type != "group" {
        return Err(PlatformError::validation(
            "recipientType must be 'user' or 'group'",
        ));
    }

    let mut notification = Notification::new(
        &req.title,
        &req.message,
        &req.recipient_id,
        &req.recipient_type,
    );
    if let Some(kind) = req.notification_type.as_deref() {
        notification.notification_type = NotificationType::parse(kind)
            .ok_or_else(|| PlatformError::validation(format!("Invalid notification type: {}", kind)))?;
    }
    if let Some(priority) = req.priority.as_deref() {
        notification.priority = NotificationPriority::parse(priority)
            .ok_or_else(|| PlatformError::validation(format!("Invalid priority: {}", priority)))?;
    }
    notification.sender_id = req.sender_id;
    notification.data = req.data;
    notification.action_url = req.action_url;
    notification.expires_at = req.expires_at.as_deref().map(parse_datetime).transpose()?;

    state.notification_repo.insert(&notification).await?;
    Ok((StatusCode::CREATED, Json(notification.into())))
}

/// List notifications for a recipient
#[utoipa::path(
    get,
    path = "",
    tag = "notifications",
    params(NotificationsQuery),
    responses(
        (status = 200, description = "Notifications, newest first", body = Vec<NotificationResponse>)
    )
)]
pub async fn list_notifications(
    State(state): State<NotificationsState>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<NotificationResponse>>, PlatformError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            NotificationStatus::parse(s)
                .ok_or_else(|| PlatformError::validation(format!("Invalid status: {}", s)))
        })
        .transpose()?;

    let notifications = state
        .notification_repo
        .list_for_recipient(
            &query.recipient_id,
            status,
            query.pagination.offset(),
            query.pagination.limit(),
        )
        .await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

/// Get a notification by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification found", body = NotificationResponse),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn get_notification(
    State(state): State<NotificationsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationResponse>, PlatformError> {
    let notification = state
        .notification_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| PlatformError::not_found("Notification", id.to_string()))?;
    Ok(Json(notification.into()))
}

/// Mark a notification delivered
#[utoipa::path(
    post,
    path = "/{id}/delivered",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked delivered", body = NotificationResponse),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_delivered(
    State(state): State<NotificationsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationResponse>, PlatformError> {
    let mut notification = state
        .notification_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| PlatformError::not_found("Notification", id.to_string()))?;

    notification.mark_delivered();
    state.notification_repo.update(&notification).await?;
    Ok(Json(notification.into()))
}

/// Mark a notification read
#[utoipa::path(
    post,
    path = "/{id}/read",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked read", body = NotificationResponse),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_read(
    State(state): State<NotificationsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationResponse>, PlatformError> {
    let mut notification = state
        .notification_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| PlatformError::not_found("Notification", id.to_string()))?;

    notification.mark_read();
    state.notification_repo.update(&notification).await?;
    Ok(Json(notification.into()))
}

/// Create notifications router
pub fn notifications_router(state: NotificationsState) -> Router {
    Router::new()
        .route("/", post(create_notification).get(list_notifications))
        .route("/:id", get(get_notification))
        .route("/:id/delivered", post(mark_delivered))
        .route("/:id/read", post(mark_read))
        .with_state(state)
}
