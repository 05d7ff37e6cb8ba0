//! OpenAPI Documentation
//!
//! Central OpenAPI specification for all platform APIs.

use utoipa::OpenApi;

/// Platform API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "RelayCore Platform API",
        version = "1.0.0",
        description = "REST APIs for configuration, feature flags, webhooks, and observability"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "config", description = "Configuration scopes and items"),
        (name = "feature-flags", description = "Feature flag management and evaluation"),
        (name = "webhook-endpoints", description = "Webhook endpoint registration"),
        (name = "webhook-subscriptions", description = "Event subscriptions per endpoint"),
        (name = "webhook-deliveries", description = "Delivery history and test dispatch"),
        (name = "audit-logs", description = "Audit trail"),
        (name = "logs", description = "Structured log ingestion and search"),
        (name = "notifications", description = "User and group notifications"),
        (name = "health", description = "Liveness and readiness probes")
    ),
    paths(
        // Configuration API
        super::config::create_scope,
        super::config::list_scopes,
        super::config::get_scope,
        super::config::update_scope,
        super::config::delete_scope,
        super::config::create_item,
        super::config::list_items,
        super::config::get_item,
        super::config::update_item,
        super::config::delete_item,
        super::config::get_item_history,
        // Feature Flags API
        super::feature_flags::create_flag,
        super::feature_flags::list_flags,
        super::feature_flags::get_flag,
        super::feature_flags::update_flag,
        super::feature_flags::delete_flag,
        super::feature_flags::check_flag,
        // Webhook Endpoints API
        super::webhook_endpoints::create_endpoint,
        super::webhook_endpoints::list_endpoints,
        super::webhook_endpoints::get_endpoint,
        super::webhook_endpoints::update_endpoint,
        super::webhook_endpoints::delete_endpoint,
        // Webhook Subscriptions API
        super::webhook_subscriptions::create_subscription,
        super::webhook_subscriptions::list_subscriptions,
        super::webhook_subscriptions::list_event_types,
        super::webhook_subscriptions::get_subscription,
        super::webhook_subscriptions::delete_subscription,
        // Webhook Deliveries API
        super::webhook_deliveries::list_deliveries,
        super::webhook_deliveries::get_delivery,
        super::webhook_deliveries::send_test_delivery,
        // Audit Logs API
        super::audit_logs::create_audit_log,
        super::audit_logs::list_audit_logs,
        super::audit_logs::get_audit_log,
        // Logs API
        super::logs::create_log,
        super::logs::list_logs,
        super::logs::log_stats,
        super::logs::get_log,
        // Notifications API
        super::notifications::create_notification,
        super::notifications::list_notifications,
        super::notifications::get_notification,
        super::notifications::mark_delivered,
        super::notifications::mark_read,
        // Health probes
        super::health::healthz,
        super::health::readyz
    )
)]
pub struct ApiDoc;
