//! Webhook Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Endpoint not found: {id}")]
    EndpointNotFound { id: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidUrl { url: String },

    #[error("Invalid filter condition: {message}")]
    InvalidFilter { message: String },

    #[error("Invalid event type: {value}")]
    InvalidEventType { value: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {message}")]
    Client { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WebhookError {
    pub fn endpoint_not_found(id: impl Into<String>) -> Self {
        Self::EndpointNotFound { id: id.into() }
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, WebhookError>;
