//! Audit Log Repository

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::AuditLog;
use crate::error::Result;

pub struct AuditLogRepository {
    pool: PgPool,
}

/// Optional filters for audit log queries.
#[derive(Debug, Default, Clone)]
pub struct AuditLogFilter {
    pub actor_id: Option<String>,
    pub event_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub action: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

fn log_from_row(row: &sqlx::postgres::PgRow) -> AuditLog {
    AuditLog {
        id: row.get("id"),
        actor_id: row.get("actor_id"),
        event_type: row.get("event_type"),
        resource_type: row.get("resource_type"),
        resource_id: row.get("resource_id"),
        action: row.get("action"),
        old_value: row.get("old_value"),
        new_value: row.get("new_value"),
        metadata: row.get("metadata"),
        ip_address: row.get("ip_address"),
        created_at: row.get("created_at"),
    }
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, log: &AuditLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_logs \
             (id, actor_id, event_type, resource_type, resource_id, action, \
              old_value, new_value, metadata, ip_address, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(log.id)
        .bind(&log.actor_id)
        .bind(&log.event_type)
        .bind(&log.resource_type)
        .bind(&log.resource_id)
        .bind(&log.action)
        .bind(&log.old_value)
        .bind(&log.new_value)
        .bind(&log.metadata)
        .bind(&log.ip_address)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AuditLog>> {
        let row = sqlx::query("SELECT * FROM audit_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| log_from_row(&r)))
    }

    /// Filtered search, newest first. All filters are conjunctive.
    pub async fn search(
        &self,
        filter: &AuditLogFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query(
            "SELECT * FROM audit_logs WHERE \
             ($1::TEXT IS NULL OR actor_id = $1) AND \
             ($2::TEXT IS NULL OR event_type = $2) AND \
             ($3::TEXT IS NULL OR resource_type = $3) AND \
             ($4::TEXT IS NULL OR resource_id = $4) AND \
             ($5::TEXT IS NULL OR action = $5) AND \
             ($6::TIMESTAMPTZ IS NULL OR created_at >= $6) AND \
             ($7::TIMESTAMPTZ IS NULL OR created_at <= $7) \
             ORDER BY created_at DESC OFFSET $8 LIMIT $9",
        )
        .bind(&filter.actor_id)
        .bind(&filter.event_type)
        .bind(&filter.resource_type)
        .bind(&filter.resource_id)
        .bind(&filter.action)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(log_from_row).collect())
    }
}
