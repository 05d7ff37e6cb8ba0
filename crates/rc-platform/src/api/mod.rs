//! API Layer
//!
//! REST API endpoints for the platform.

pub mod common;

pub mod audit_logs;
pub mod config;
pub mod feature_flags;
pub mod health;
pub mod logs;
pub mod notifications;
pub mod openapi;
pub mod webhook_deliveries;
pub mod webhook_endpoints;
pub mod webhook_subscriptions;

pub use common::*;

pub use audit_logs::{audit_logs_router, AuditLogsState};
pub use config::{config_router, ConfigState};
pub use feature_flags::{feature_flags_router, FeatureFlagsState};
pub use health::{health_router, HealthState};
pub use logs::{logs_router, LogsState};
pub use notifications::{notifications_router, NotificationsState};
pub use openapi::ApiDoc;
pub use webhook_deliveries::{webhook_deliveries_router, WebhookDeliveriesState};
pub use webhook_endpoints::{webhook_endpoints_router, WebhookEndpointsState};
pub use webhook_subscriptions::{webhook_subscriptions_router, WebhookSubscriptionsState};
