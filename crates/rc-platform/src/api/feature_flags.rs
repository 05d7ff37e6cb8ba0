//! Feature Flags Admin API
//!
//! CRUD for flags plus per-user evaluation. Flag mutations emit
//! `feature_flag.*` webhook events.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use rc_webhooks::WebhookEventType;

use crate::api::common::{PaginationParams, SuccessResponse};
use crate::domain::{FeatureFlag, FlagCheckRequest};
use crate::error::PlatformError;
use crate::repository::FeatureFlagRepository;
use crate::service::{AuditService, EventEmitter};

/// Create feature flag request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlagRequest {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    pub rules: Option<serde_json::Value>,
}

/// Update feature flag request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlagRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub rules: Option<serde_json::Value>,
}

/// Feature flag response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlagResponse {
    pub id: String,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub rules: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<FeatureFlag> for FlagResponse {
    fn from(f: FeatureFlag) -> Self {
        Self {
            id: f.id.to_string(),
            key: f.key,
            name: f.name,
            description: f.description,
            enabled: f.enabled,
            rules: f.rules,
            created_at: f.created_at.to_rfc3339(),
            updated_at: f.updated_at.to_rfc3339(),
        }
    }
}

/// Flag check request body
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub user_id: Option<String>,
    pub groups: Option<Vec<String>>,
    pub attributes: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Flag check response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub key: String,
    pub enabled: bool,
}

/// Query parameters for flag list
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct FlagsQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Feature flags service state
#[derive(Clone)]
pub struct FeatureFlagsState {
    pub flag_repo: Arc<FeatureFlagRepository>,
    pub audit: AuditService,
    pub events: EventEmitter,
}

/// Create a feature flag
#[utoipa::path(
    post,
    path = "",
    tag = "feature-flags",
    request_body = CreateFlagRequest,
    responses(
        (status = 201, description = "Flag created", body = FlagResponse),
        (status = 409, description = "Duplicate flag key")
    )
)]
pub async fn create_flag(
    State(state): State<FeatureFlagsState>,
    Json(req): Json<CreateFlagRequest>,
) -> Result<(StatusCode, Json<FlagResponse>), PlatformError> {
    if req.key.trim().is_empty() {
        return Err(PlatformError::validation("Flag key must not be empty"));
    }
    if state.flag_repo.find_by_key(&req.key).await?.is_some() {
        return Err(PlatformError::duplicate("FeatureFlag", "key", &req.key));
    }

    let mut flag = FeatureFlag::new(&req.key, &req.name).with_enabled(req.enabled);
    flag.description = req.description;
    flag.rules = req.rules;
    state.flag_repo.insert(&flag).await?;

    state.audit.record_create("system", "feature_flag", &flag.key).await;
    state.events.emit(
        WebhookEventType::FeatureFlagCreated,
        json!({"key": flag.key, "enabled": flag.enabled}),
    );

    Ok((StatusCode::CREATED, Json(flag.into())))
}

/// List feature flags
#[utoipa::path(
    get,
    path = "",
    tag = "feature-flags",
    params(FlagsQuery),
    responses(
        (status = 200, description = "List of flags", body = Vec<FlagResponse>)
    )
)]
pub async fn list_flags(
    State(state): State<FeatureFlagsState>,
    Query(query): Query<FlagsQuery>,
) -> Result<Json<Vec<FlagResponse>>, PlatformError> {
    let flags = state
        .flag_repo
        .list(query.pagination.offset(), query.pagination.limit())
        .await?;
    Ok(Json(flags.into_iter().map(Into::into).collect()))
}

/// Get a feature flag by key
#[utoipa::path(
    get,
    path = "/{key}",
    tag = "feature-flags",
    params(("key" = String, Path, description = "Flag key")),
    responses(
        (status = 200, description = "Flag found", body = FlagResponse),
        (status = 404, description = "Flag not found")
    )
)]
pub async fn get_flag(
    State(state): State<FeatureFlagsState>,
    Path(key): Path<String>,
) -> Result<Json<FlagResponse>, PlatformError> {
    let flag = state
        .flag_repo
        .find_by_key(&key)
        .await?
        .ok_or_else(|| PlatformError::not_found("FeatureFlag", &key))?;
    Ok(Json(flag.into()))
}

/// Update a feature flag
#[utoipa::path(
    put,
    path = "/{key}",
    tag = "feature-flags",
    params(("key" = String, Path, description = "Flag key")),
    request_body = UpdateFlagRequest,
    responses(
        (status = 200, description = "Flag updated", body = FlagResponse),
        (status = 404, description = "Flag not found")
    )
)]
pub async fn update_flag(
    State(state): State<FeatureFlagsState>,
    Path(key): Path<String>,
    Json(req): Json<UpdateFlagRequest>,
) -> Result<Json<FlagResponse>, PlatformError> {
    let mut flag = state
        .flag_repo
        .find_by_key(&key)
        .await?
        .ok_or_else(|| PlatformError::not_found("FeatureFlag", &key))?;

    let was_enabled = flag.enabled;
    if let Some(name) = req.name {
        flag.name = name;
    }
    if let Some(description) = req.description {
        flag.description = Some(description);
    }
    if let Some(enabled) = req.enabled {
        flag.enabled = enabled;
    }
    if let Some(rules) = req.rules {
        flag.rules = Some(rules);
    }
    flag.updated_at = chrono::Utc::now();
    state.flag_repo.update(&flag).await?;

    state
        .audit
        .record_update(
            "system",
            "feature_flag",
            &flag.key,
            Some(format!("enabled={}", was_enabled)),
            Some(format!("enabled={}", flag.enabled)),
        )
        .await;
    state.events.emit(
        WebhookEventType::FeatureFlagUpdated,
        json!({"key": flag.key, "enabled": flag.enabled}),
    );

    Ok(Json(flag.into()))
}

/// Delete a feature flag
#[utoipa::path(
    delete,
    path = "/{key}",
    tag = "feature-flags",
    params(("key" = String, Path, description = "Flag key")),
    responses(
        (status = 200, description = "Flag deleted", body = SuccessResponse),
        (status = 404, description = "Flag not found")
    )
)]
pub async fn delete_flag(
    State(state): State<FeatureFlagsState>,
    Path(key): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    if !state.flag_repo.delete_by_key(&key).await? {
        return Err(PlatformError::not_found("FeatureFlag", &key));
    }

    state.audit.record_delete("system", "feature_flag", &key).await;
    state
        .events
        .emit(WebhookEventType::FeatureFlagDeleted, json!({"key": key}));

    Ok(Json(SuccessResponse::ok()))
}

/// Evaluate a flag for a user context
#[utoipa::path(
    post,
    path = "/{key}/check",
    tag = "feature-flags",
    params(("key" = String, Path, description = "Flag key")),
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Evaluation result", body = CheckResponse)
    )
)]
pub async fn check_flag(
    State(state): State<FeatureFlagsState>,
    Path(key): Path<String>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, PlatformError> {
    // An unknown flag evaluates to disabled rather than erroring, so
    // callers can ship checks before the flag exists.
    let enabled = match state.flag_repo.find_by_key(&key).await? {
        Some(flag) => {
            let check = FlagCheckRequest {
                user_id: req.user_id,
                groups: req.groups,
                attributes: req.attributes,
            };
            flag.is_enabled_for(&check)
        }
        None => false,
    };
    Ok(Json(CheckResponse { key, enabled }))
}

/// Create feature flags router
pub fn feature_flags_router(state: FeatureFlagsState) -> Router {
    Router::new()
        .route("/", post(create_flag).get(list_flags))
        .route("/:key", get(get_flag).put(update_flag).delete(delete_flag))
        .route("/:key/check", post(check_flag))
        .with_state(state)
}
