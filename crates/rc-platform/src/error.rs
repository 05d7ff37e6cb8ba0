//! Platform Error Types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::api::common::ApiError;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Duplicate entity: {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Webhook error: {0}")]
    Webhook(#[from] rc_webhooks::WebhookError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            Self::Duplicate { .. } => (StatusCode::CONFLICT, "duplicate", self.to_string()),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error", self.to_string()),
            Self::Webhook(rc_webhooks::WebhookError::EndpointNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found", self.to_string())
            }
            Self::Webhook(rc_webhooks::WebhookError::InvalidFilter { .. })
            | Self::Webhook(rc_webhooks::WebhookError::InvalidEventType { .. })
            | Self::Webhook(rc_webhooks::WebhookError::InvalidUrl { .. }) => {
                (StatusCode::BAD_REQUEST, "validation_error", self.to_string())
            }
            Self::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            Self::Json(_) | Self::Webhook(_) | Self::Internal { .. } => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiError {
            error: error.to_string(),
            message,
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
