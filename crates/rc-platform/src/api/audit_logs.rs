//! Audit Logs Admin API
//!
//! Append and filtered read access to the audit trail.

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
use crate::domain::AuditLog;
use crate::error::PlatformError;
use crate::repository::audit_log::AuditLogFilter;
use crate::repository::AuditLogRepository;

/// Create audit log request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditLogRequest {
    pub actor_id: String,
    pub event_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub action: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

/// Audit log response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub id: String,
    pub actor_id: String,
    pub event_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub action: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(log: AuditLog) -> Self {
        Self {
            id: log.id.to_string(),
            actor_id: log.actor_id,
            event_type: log.event_type,
            resource_type: log.resource_type,
            resource_id: log.resource_id,
            action: log.action,
            old_value: log.old_value,
            new_value: log.new_value,
            metadata: log.metadata,
            ip_address: log.ip_address,
            created_at: log.created_at.to_rfc3339(),
        }
    }
}

/// Query parameters for audit logs
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditLogsQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    /// Filter by actor ID
    pub actor_id: Option<String>,

    /// Filter by event type
    pub event_type: Option<String>,

    /// Filter by resource type
    pub resource_type: Option<String>,

    /// Filter by resource ID
    pub resource_id: Option<String>,

    /// Filter by action
    pub action: Option<String>,

    /// Filter from date (ISO 8601)
    pub from_date: Option<String>,

    /// Filter to date (ISO 8601)
    pub to_date: Option<String>,
}

/// Audit logs service state
#[derive(Clone)]
pub struct AuditLogsState {
    pub audit_log_repo: Arc<AuditLogRepository>,
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, PlatformError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PlatformError::validation(format!("Invalid timestamp: {}", s)))
}

/// Append an audit log entry
#[utoipa::path(
    post,
    path = "",
    tag = "audit-logs",
    request_body = CreateAuditLogRequest,
    responses(
        (status = 201, description = "Entry recorded", body = AuditLogResponse)
    )
)]
pub async fn create_audit_log(
    State(state): State<AuditLogsState>,
    Json(req): Json<CreateAuditLogRequest>,
) -> Result<(StatusCode, Json<AuditLogResponse>), PlatformError> {
    let mut log = AuditLog::new(
        &req.actor_id,
        &req.event_type,
        &req.resource_type,
        &req.resource_id,
        &req.action,
    )
    .with_change(req.old_value, req.new_value);
    log.metadata = req.metadata;
    log.ip_address = req.ip_address;

    state.audit_log_repo.insert(&log).await?;
    Ok((StatusCode::CREATED, Json(log.into())))
}

/// List audit logs with filters
#[utoipa::path(
    get,
    path = "",
    tag = "audit-logs",
    params(AuditLogsQuery),
    responses(
        (status = 200, description = "Matching entries, newest first", body = Vec<AuditLogResponse>)
    )
)]
pub async fn list_audit_logs(
    State(state): State<AuditLogsState>,
    Query(query): Query<AuditLogsQuery>,
) -> Result<Json<Vec<AuditLogResponse>>, PlatformError> {
    let filter = AuditLogFilter {
        actor_id: query.actor_id,
        event_type: query.event_type,
        resource_type: query.resource_type,
        resource_id: query.resource_id,
        action: query.action,
        from_date: query.from_date.as_deref().map(parse_datetime).transpose()?,
        to_date: query.to_date.as_deref().map(parse_datetime).transpose()?,
    };

    let logs = state
        .audit_log_repo
        .search(&filter, query.pagination.offset(), query.pagination.limit())
        .await?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

/// Get an audit log entry by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "audit-logs",
    params(("id" = String, Path, description = "Audit log ID")),
    responses(
        (status = 200, description = "Entry found", body = AuditLogResponse),
        (status = 404, description = "Entry not found")
    )
)]
pub async fn get_audit_log(
    State(state): State<AuditLogsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditLogResponse>, PlatformError> {
    let log = state
        .audit_log_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| PlatformError::not_found("AuditLog", id.to_string()))?;
    Ok(Json(log.into()))
}

/// Create audit logs router
pub fn audit_logs_router(state: AuditLogsState) -> Router {
    Router::new()
        .route("/", post(create_audit_log).get(list_audit_logs))
        .route("/:id", get(get_audit_log))
        .with_state(state)
}
