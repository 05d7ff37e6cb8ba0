//! Postgres Repositories
//!
//! Runtime-bound sqlx queries with manual row mapping; the schema is
//! created idempotently at startup.

pub mod audit_log;
pub mod config;
pub mod feature_flag;
pub mod log_entry;
pub mod notification;

pub use audit_log::AuditLogRepository;
pub use config::ConfigRepository;
pub use feature_flag::FeatureFlagRepository;
pub use log_entry::LogEntryRepository;
pub use notification::NotificationRepository;

use sqlx::PgPool;
use tracing::info;

use crate::domain::{ConfigScope, FeatureFlag};
use crate::error::Result;

/// Create all platform tables if they do not exist.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    // Multi-statement DDL needs the simple query protocol.
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS config_scopes (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config_items (
            id UUID PRIMARY KEY,
            scope_id UUID NOT NULL REFERENCES config_scopes(id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            description TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            is_secret BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            UNIQUE (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS config_history (
            id UUID PRIMARY KEY,
            config_id UUID NOT NULL REFERENCES config_items(id) ON DELETE CASCADE,
            value TEXT NOT NULL,
            version INTEGER NOT NULL,
            changed_by TEXT,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_config_history_config_id
            ON config_history(config_id);

        CREATE TABLE IF NOT EXISTS feature_flags (
            id UUID PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            enabled BOOLEAN NOT NULL DEFAULT FALSE,
            rules JSONB,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_logs (
            id UUID PRIMARY KEY,
            actor_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            action TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT,
            metadata JSONB,
            ip_address TEXT,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_actor ON audit_logs(actor_id);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_resource
            ON audit_logs(resource_type, resource_id);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs(created_at);

        CREATE TABLE IF NOT EXISTS log_entries (
            id UUID PRIMARY KEY,
            level TEXT NOT NULL,
            source TEXT NOT NULL,
            message TEXT NOT NULL,
            context JSONB,
            trace_id TEXT,
            span_id TEXT,
            user_id TEXT,
            ip_address TEXT,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_log_entries_level_created_at
            ON log_entries(level, created_at);
        CREATE INDEX IF NOT EXISTS idx_log_entries_source_created_at
            ON log_entries(source, created_at);
        CREATE INDEX IF NOT EXISTS idx_log_entries_trace_id ON log_entries(trace_id);

        CREATE TABLE IF NOT EXISTS notifications (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            notification_type TEXT NOT NULL,
            priority TEXT NOT NULL,
            status TEXT NOT NULL,
            recipient_id TEXT NOT NULL,
            recipient_type TEXT NOT NULL,
            sender_id TEXT,
            data JSONB,
            action_url TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            delivered_at TIMESTAMPTZ,
            read_at TIMESTAMPTZ,
            expires_at TIMESTAMPTZ
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_recipient_status
            ON notifications(recipient_id, status);
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Seed default config scopes and feature flags, skipping any that
/// already exist.
pub async fn seed_defaults(pool: &PgPool) -> Result<()> {
    let config_repo = ConfigRepository::new(pool.clone());
    for name in ["system", "auth", "logging", "notifications"] {
        if config_repo.find_scope_by_name(name).await?.is_none() {
            let scope = ConfigScope::new(name)
                .with_description(format!("Default {} configuration scope", name));
            config_repo.insert_scope(&scope).await?;
        }
    }

    let flag_repo = FeatureFlagRepository::new(pool.clone());
    let defaults = [
        ("enable_webhooks", "Enable Webhooks", "Enable webhook dispatching functionality"),
        (
            "enable_notifications",
            "Enable Notifications",
            "Enable notification triggering functionality",
        ),
        (
            "enable_audit_logging",
            "Enable Audit Logging",
            "Enable audit logging for sensitive actions",
        ),
    ];
    for (key, name, description) in defaults {
        if flag_repo.find_by_key(key).await?.is_none() {
            let flag = FeatureFlag::new(key, name)
                .with_description(description)
                .with_enabled(true);
            flag_repo.insert(&flag).await?;
        }
    }

    info!("Default data initialized");
    Ok(())
}
