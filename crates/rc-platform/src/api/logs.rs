//! Structured Logs API
//!
//! Ingest, query, and aggregate structured log entries.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::common::PaginationParams;
use crate::domain::{LogEntry, LogLevel, LogStatistics};
use crate::error::PlatformError;
use crate::repository::log_entry::LogFilter;
use crate::repository::LogEntryRepository;

/// Create log entry request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLogRequest {
    pub level: String,
    pub source: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

/// Log entry response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub id: String,
    pub level: String,
    pub source: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

impl From<LogEntry> for LogResponse {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            level: entry.level.as_str().to_string(),
            source: entry.source,
            message: entry.message,
            context: entry.context,
            trace_id: entry.trace_id,
            span_id: entry.span_id,
            user_id: entry.user_id,
            ip_address: entry.ip_address,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Log statistics response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogStatsResponse {
    pub total_count: i64,
    pub level_counts: HashMap<String, i64>,
    pub source_counts: HashMap<String, i64>,
}

impl From<LogStatistics> for LogStatsResponse {
    fn from(stats: LogStatistics) -> Self {
        Self {
            total_count: stats.total_count,
            level_counts: stats.level_counts,
            source_counts: stats.source_counts,
        }
    }
}

/// Query parameters for log search
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LogsQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    /// Filter by level
    pub level: Option<String>,

    /// Filter by source
    pub source: Option<String>,

    /// Filter by trace ID
    pub trace_id: Option<String>,

    /// Filter by user ID
    pub user_id: Option<String>,

    /// Window start (ISO 8601)
    pub start_time: Option<String>,

    /// Window end (ISO 8601)
    pub end_time: Option<String>,
}

/// Query parameters for log statistics
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LogStatsQuery {
    /// Window start (ISO 8601)
    pub start_time: Option<String>,

    /// Window end (ISO 8601)
    pub end_time: Option<String>,
}

/// Logs service state
#[derive(Clone)]
pub struct LogsState {
    pub log_repo: Arc<LogEntryRepository>,
}

fn parse_level(s: &str) -> Result<LogLevel, PlatformError> {
    LogLevel::parse(s).ok_or_else(|| PlatformError::validation(format!("Invalid log level: {}", s)))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, PlatformError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PlatformError::validation(format!("Invalid timestamp: {}", s)))
}

/// Ingest a log entry
#[utoipa::path(
    post,
    path = "",
    tag = "logs",
    request_body = CreateLogRequest,
    responses(
        (status = 201, description = "Entry stored", body = LogResponse),
        (status = 400, description = "Invalid log level")
    )
)]
pub async fn create_log(
    State(state): State<LogsState>,
    Json(req): Json<CreateLogRequest>,
) -> Result<(StatusCode, Json<LogResponse>), PlatformError> {
    let level = parse_level(&req.level)?;

    let mut entry = LogEntry::new(level, &req.source, &req.message);
    entry.context = req.context;
    entry.trace_id = req.trace_id;
    entry.span_id = req.span_id;
    entry.user_id = req.user_id;
    entry.ip_address = req.ip_address;

    state.log_repo.insert(&entry).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// Query log entries
#[utoipa::path(
    get,
    path = "",
    tag = "logs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Matching entries, newest first", body = Vec<LogResponse>)
    )
)]
pub async fn list_logs(
    State(state): State<LogsState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogResponse>>, PlatformError> {
    let filter = LogFilter {
        level: query.level.as_deref().map(parse_level).transpose()?,
        source: query.source,
        trace_id: query.trace_id,
        user_id: query.user_id,
        start_time: query.start_time.as_deref().map(parse_datetime).transpose()?,
        end_time: query.end_time.as_deref().map(parse_datetime).transpose()?,
    };

    let entries = state
        .log_repo
        .search(&filter, query.pagination.offset(), query.pagination.limit())
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Aggregate counts by level and source
#[utoipa::path(
    get,
    path = "/stats",
    tag = "logs",
    params(LogStatsQuery),
    responses(
        (status = 200, description = "Counts over the window", body = LogStatsResponse)
    )
)]
pub async fn log_stats(
    State(state): State<LogsState>,
    Query(query): Query<LogStatsQuery>,
) -> Result<Json<LogStatsResponse>, PlatformError> {
    let start = query.start_time.as_deref().map(parse_datetime).transpose()?;
    let end = query.end_time.as_deref().map(parse_datetime).transpose()?;
    let stats = state.log_repo.statistics(start, end).await?;
    Ok(Json(stats.into()))
}

/// Get a log entry by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "logs",
    params(("id" = String, Path, description = "Log entry ID")),
    responses(
        (status = 200, description = "Entry found", body = LogResponse),
        (status = 404, description = "Entry not found")
    )
)]
pub async fn get_log(
    State(state): State<LogsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LogResponse>, PlatformError> {
    let entry = state
        .log_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| PlatformError::not_found("LogEntry", id.to_string()))?;
    Ok(Json(entry.into()))
}

/// Create logs router
pub fn logs_router(state: LogsState) -> Router {
    Router::new()
        .route("/", post(create_log).get(list_logs))
        .route("/stats", get(log_stats))
        .route("/:id", get(get_log))
        .with_state(state)
}
