//! Configuration Admin API
//!
//! REST endpoints for config scopes, items, and change history. Item
//! mutations append history rows, audit-log the action, and emit
//! `config.*` webhook events.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use rc_webhooks::WebhookEventType;

use crate::api::common::SuccessResponse;
use crate::domain::{ConfigHistory, ConfigItem, ConfigScope};
use crate::error::PlatformError;
use crate::repository::ConfigRepository;
use crate::service::{AuditService, EventEmitter};

const SECRET_MASK: &str = "********";

/// Create scope request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateScopeRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Update scope request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScopeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Scope response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScopeResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ConfigScope> for ScopeResponse {
    fn from(s: ConfigScope) -> Self {
        Self {
            id: s.id.to_string(),
            name: s.name,
            description: s.description,
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

/// Create config item request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
}

/// Update config item request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub value: String,
    pub description: Option<String>,
    pub is_secret: Option<bool>,
}

/// Config item response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: String,
    pub scope_id: String,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub version: i32,
    pub is_secret: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ItemResponse {
    /// Secret values are masked; everything else passes through.
    fn masked(item: ConfigItem) -> Self {
        let value = if item.is_secret {
            SECRET_MASK.to_string()
        } else {
            item.value
        };
        Self {
            id: item.id.to_string(),
            scope_id: item.scope_id.to_string(),
            key: item.key,
            value,
            description: item.description,
            version: item.version,
            is_secret: item.is_secret,
            created_at: item.created_at.to_rfc3339(),
            updated_at: item.updated_at.to_rfc3339(),
        }
    }
}

/// Config history response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub id: String,
    pub config_id: String,
    pub value: String,
    pub version: i32,
    pub changed_by: Option<String>,
    pub created_at: String,
}

impl HistoryResponse {
    fn masked(history: ConfigHistory, is_secret: bool) -> Self {
        let value = if is_secret {
            SECRET_MASK.to_string()
        } else {
            history.value
        };
        Self {
            id: history.id.to_string(),
            config_id: history.config_id.to_string(),
            value,
            version: history.version,
            changed_by: history.changed_by,
            created_at: history.created_at.to_rfc3339(),
        }
    }
}

/// Config service state
#[derive(Clone)]
pub struct ConfigState {
    pub config_repo: Arc<ConfigRepository>,
    pub audit: AuditService,
    pub events: EventEmitter,
}

/// Create a config scope
#[utoipa::path(
    post,
    path = "",
    tag = "config",
    request_body = CreateScopeRequest,
    responses(
        (status = 201, description = "Scope created", body = ScopeResponse),
        (status = 409, description = "Duplicate scope name")
    )
)]
pub async fn create_scope(
    State(state): State<ConfigState>,
    Json(req): Json<CreateScopeRequest>,
) -> Result<(StatusCode, Json<ScopeResponse>), PlatformError> {
    if req.name.trim().is_empty() {
        return Err(PlatformError::validation("Scope name must not be empty"));
    }
    if state.config_repo.find_scope_by_name(&req.name).await?.is_some() {
        return Err(PlatformError::duplicate("ConfigScope", "name", &req.name));
    }

    let mut scope = ConfigScope::new(&req.name);
    scope.description = req.description;
    state.config_repo.insert_scope(&scope).await?;

    state.audit.record_create("system", "config_scope", &scope.id.to_string()).await;

    Ok((StatusCode::CREATED, Json(scope.into())))
}

/// List config scopes
#[utoipa::path(
    get,
    path = "",
    tag = "config",
    responses(
        (status = 200, description = "List of scopes", body = Vec<ScopeResponse>)
    )
)]
pub async fn list_scopes(
    State(state): State<ConfigState>,
) -> Result<Json<Vec<ScopeResponse>>, PlatformError> {
    let scopes = state.config_repo.list_scopes().await?;
    Ok(Json(scopes.into_iter().map(Into::into).collect()))
}

/// Get a config scope
#[utoipa::path(
    get,
    path = "/{scope_id}",
    tag = "config",
    params(("scope_id" = String, Path, description = "Scope ID")),
    responses(
        (status = 200, description = "Scope found", body = ScopeResponse),
        (status = 404, description = "Scope not found")
    )
)]
pub async fn get_scope(
    State(state): State<ConfigState>,
    Path(scope_id): Path<Uuid>,
) -> Result<Json<ScopeResponse>, PlatformError> {
    let scope = state
        .config_repo
        .find_scope(scope_id)
        .await?
        .ok_or_else(|| PlatformError::not_found("ConfigScope", scope_id.to_string()))?;
    Ok(Json(scope.into()))
}

/// Update a config scope
#[utoipa::path(
    put,
    path = "/{scope_id}",
    tag = "config",
    params(("scope_id" = String, Path, description = "Scope ID")),
    request_body = UpdateScopeRequest,
    responses(
        (status = 200, description = "Scope updated", body = ScopeResponse),
        (status = 404, description = "Scope not found")
    )
)]
pub async fn update_scope(
    State(state): State<ConfigState>,
    Path(scope_id): Path<Uuid>,
    Json(req): Json<UpdateScopeRequest>,
) -> Result<Json<ScopeResponse>, PlatformError> {
    let mut scope = state
        .config_repo
        .find_scope(scope_id)
        .await?
        .ok_or_else(|| PlatformError::not_found("ConfigScope", scope_id.to_string()))?;

    if let Some(name) = req.name {
        if name != scope.name && state.config_repo.find_scope_by_name(&name).await?.is_some() {
            return Err(PlatformError::duplicate("ConfigScope", "name", &name));
        }
        scope.name = name;
    }
    if let Some(description) = req.description {
        scope.description = Some(description);
    }
    scope.updated_at = chrono::Utc::now();
    state.config_repo.update_scope(&scope).await?;

    state.audit.record_update("system", "config_scope", &scope.id.to_string(), None, None).await;

    Ok(Json(scope.into()))
}

/// Delete a config scope and its items
#[utoipa::path(
    delete,
    path = "/{scope_id}",
    tag = "config",
    params(("scope_id" = String, Path, description = "Scope ID")),
    responses(
        (status = 200, description = "Scope deleted", body = SuccessResponse),
        (status = 404, description = "Scope not found")
    )
)]
pub async fn delete_scope(
    State(state): State<ConfigState>,
    Path(scope_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    if !state.config_repo.delete_scope(scope_id).await? {
        return Err(PlatformError::not_found("ConfigScope", scope_id.to_string()));
    }
    state.audit.record_delete("system", "config_scope", &scope_id.to_string()).await;
    Ok(Json(SuccessResponse::ok()))
}

/// Create a config item in a scope
#[utoipa::path(
    post,
    path = "/{scope_id}/items",
    tag = "config",
    params(("scope_id" = String, Path, description = "Scope ID")),
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = ItemResponse),
        (status = 404, description = "Scope not found"),
        (status = 409, description = "Duplicate key in scope")
    )
)]
pub async fn create_item(
    State(state): State<ConfigState>,
    Path(scope_id): Path<Uuid>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), PlatformError> {
    let scope = state
        .config_repo
        .find_scope(scope_id)
        .await?
        .ok_or_else(|| PlatformError::not_found("ConfigScope", scope_id.to_string()))?;

    if req.key.trim().is_empty() {
        return Err(PlatformError::validation("Config key must not be empty"));
    }
    if state.config_repo.find_item_by_key(scope_id, &req.key).await?.is_some() {
        return Err(PlatformError::duplicate("ConfigItem", "key", &req.key));
    }

    let mut item = ConfigItem::new(scope_id, &req.key, &req.value).with_secret(req.is_secret);
    item.description = req.description;
    state.config_repo.insert_item(&item).await?;
    state
        .config_repo
        .insert_history(&ConfigHistory::snapshot(&item, None))
        .await?;

    state.audit.record_create("system", "config_item", &item.id.to_string()).await;
    state.events.emit(
        WebhookEventType::ConfigCreated,
        json!({
            "scope": scope.name,
            "key": item.key,
            "version": item.version,
            "is_secret": item.is_secret,
        }),
    );

    Ok((StatusCode::CREATED, Json(ItemResponse::masked(item))))
}

/// List config items in a scope
#[utoipa::path(
    get,
    path = "/{scope_id}/items",
    tag = "config",
    params(("scope_id" = String, Path, description = "Scope ID")),
    responses(
        (status = 200, description = "List of items", body = Vec<ItemResponse>),
        (status = 404, description = "Scope not found")
    )
)]
pub async fn list_items(
    State(state): State<ConfigState>,
    Path(scope_id): Path<Uuid>,
) -> Result<Json<Vec<ItemResponse>>, PlatformError> {
    if state.config_repo.find_scope(scope_id).await?.is_none() {
        return Err(PlatformError::not_found("ConfigScope", scope_id.to_string()));
    }
    let items = state.config_repo.list_items(scope_id).await?;
    Ok(Json(items.into_iter().map(ItemResponse::masked).collect()))
}

/// Get a config item
#[utoipa::path(
    get,
    path = "/{scope_id}/items/{item_id}",
    tag = "config",
    params(
        ("scope_id" = String, Path, description = "Scope ID"),
        ("item_id" = String, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item found", body = ItemResponse),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<ConfigState>,
    Path((scope_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ItemResponse>, PlatformError> {
    let item = state
        .config_repo
        .find_item(item_id)
        .await?
        .filter(|i| i.scope_id == scope_id)
        .ok_or_else(|| PlatformError::not_found("ConfigItem", item_id.to_string()))?;
    Ok(Json(ItemResponse::masked(item)))
}

/// Update a config item's value
#[utoipa::path(
    put,
    path = "/{scope_id}/items/{item_id}",
    tag = "config",
    params(
        ("scope_id" = String, Path, description = "Scope ID"),
        ("item_id" = String, Path, description = "Item ID")
    ),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ItemResponse),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    State(state): State<ConfigState>,
    Path((scope_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, PlatformError> {
    let scope = state
        .config_repo
        .find_scope(scope_id)
        .await?
        .ok_or_else(|| PlatformError::not_found("ConfigScope", scope_id.to_string()))?;
    let mut item = state
        .config_repo
        .find_item(item_id)
        .await?
        .filter(|i| i.scope_id == scope_id)
        .ok_or_else(|| PlatformError::not_found("ConfigItem", item_id.to_string()))?;

    let old_version = item.version;
    item.apply_value(req.value);
    if let Some(description) = req.description {
        item.description = Some(description);
    }
    if let Some(is_secret) = req.is_secret {
        item.is_secret = is_secret;
    }

    state.config_repo.update_item(&item).await?;
    state
        .config_repo
        .insert_history(&ConfigHistory::snapshot(&item, None))
        .await?;

    state
        .audit
        .record_update(
            "system",
            "config_item",
            &item.id.to_string(),
            Some(format!("version {}", old_version)),
            Some(format!("version {}", item.version)),
        )
        .await;
    state.events.emit(
        WebhookEventType::ConfigUpdated,
        json!({
            "scope": scope.name,
            "key": item.key,
            "version": item.version,
            "is_secret": item.is_secret,
        }),
    );

    Ok(Json(ItemResponse::masked(item)))
}

/// Delete a config item
#[utoipa::path(
    delete,
    path = "/{scope_id}/items/{item_id}",
    tag = "config",
    params(
        ("scope_id" = String, Path, description = "Scope ID"),
        ("item_id" = String, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item deleted", body = SuccessResponse),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    State(state): State<ConfigState>,
    Path((scope_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    let scope = state
        .config_repo
        .find_scope(scope_id)
        .await?
        .ok_or_else(|| PlatformError::not_found("ConfigScope", scope_id.to_string()))?;
    let item = state
        .config_repo
        .find_item(item_id)
        .await?
        .filter(|i| i.scope_id == scope_id)
        .ok_or_else(|| PlatformError::not_found("ConfigItem", item_id.to_string()))?;

    state.config_repo.delete_item(item.id).await?;
    state.audit.record_delete("system", "config_item", &item.id.to_string()).await;
    state.events.emit(
        WebhookEventType::ConfigDeleted,
        json!({"scope": scope.name, "key": item.key}),
    );

    Ok(Json(SuccessResponse::ok()))
}

/// Get a config item's change history
#[utoipa::path(
    get,
    path = "/{scope_id}/items/{item_id}/history",
    tag = "config",
    params(
        ("scope_id" = String, Path, description = "Scope ID"),
        ("item_id" = String, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Change history, newest first", body = Vec<HistoryResponse>),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item_history(
    State(state): State<ConfigState>,
    Path((scope_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<HistoryResponse>>, PlatformError> {
    let item = state
        .config_repo
        .find_item(item_id)
        .await?
        .filter(|i| i.scope_id == scope_id)
        .ok_or_else(|| PlatformError::not_found("ConfigItem", item_id.to_string()))?;

    let history = state.config_repo.item_history(item.id).await?;
    Ok(Json(
        history
            .into_iter()
            .map(|h| HistoryResponse::masked(h, item.is_secret))
            .collect(),
    ))
}

/// Create config router
pub fn config_router(state: ConfigState) -> Router {
    Router::new()
        .route("/", post(create_scope).get(list_scopes))
        .route(
            "/:scope_id",
            get(get_scope).put(update_scope).delete(delete_scope),
        )
        .route("/:scope_id/items", post(create_item).get(list_items))
        .route(
            "/:scope_id/items/:item_id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/:scope_id/items/:item_id/history", get(get_item_history))
        .with_state(state)
}
