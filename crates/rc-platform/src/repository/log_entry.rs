//! Structured Log Repository

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{LogEntry, LogLevel, LogStatistics};
use crate::error::{PlatformError, Result};

pub struct LogEntryRepository {
    pool: PgPool,
}

/// Optional filters for log queries.
#[derive(Debug, Default, Clone)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub source: Option<String>,
    pub trace_id: Option<String>,
    pub user_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> Result<LogEntry> {
    let level_str: String = row.get("level");
    let level = LogLevel::parse(&level_str)
        .ok_or_else(|| PlatformError::internal(format!("unknown log level: {}", level_str)))?;

    Ok(LogEntry {
        id: row.get("id"),
        level,
        source: row.get("source"),
        message: row.get("message"),
        context: row.get("context"),
        trace_id: row.get("trace_id"),
        span_id: row.get("span_id"),
        user_id: row.get("user_id"),
        ip_address: row.get("ip_address"),
        created_at: row.get("created_at"),
    })
}

impl LogEntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &LogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO log_entries \
             (id, level, source, message, context, trace_id, span_id, user_id, ip_address, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(entry.id)
        .bind(entry.level.as_str())
        .bind(&entry.source)
        .bind(&entry.message)
        .bind(&entry.context)
        .bind(&entry.trace_id)
        .bind(&entry.span_id)
        .bind(&entry.user_id)
        .bind(&entry.ip_address)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<LogEntry>> {
        let row = sqlx::query("SELECT * FROM log_entries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| entry_from_row(&r)).transpose()
    }

    /// Filtered query, newest first.
    pub async fn search(&self, filter: &LogFilter, offset: i64, limit: i64) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM log_entries WHERE \
             ($1::TEXT IS NULL OR level = $1) AND \
             ($2::TEXT IS NULL OR source = $2) AND \
             ($3::TEXT IS NULL OR trace_id = $3) AND \
             ($4::TEXT IS NULL OR user_id = $4) AND \
             ($5::TIMESTAMPTZ IS NULL OR created_at >= $5) AND \
             ($6::TIMESTAMPTZ IS NULL OR created_at <= $6) \
             ORDER BY created_at DESC OFFSET $7 LIMIT $8",
        )
        .bind(filter.level.map(|l| l.as_str()))
        .bind(&filter.source)
        .bind(&filter.trace_id)
        .bind(&filter.user_id)
        .bind(filter.start_time)
        .bind(filter.end_time)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }

    /// Total, per-level, and per-source counts over a time window.
    pub async fn statistics(
        &self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<LogStatistics> {
        let level_rows = sqlx::query(
            "SELECT level, COUNT(*) AS count FROM log_entries WHERE \
             ($1::TIMESTAMPTZ IS NULL OR created_at >= $1) AND \
             ($2::TIMESTAMPTZ IS NULL OR created_at <= $2) \
             GROUP BY level",
        )
        .bind(start_time)
        .bind(end_time)
        .fetch_all(&self.pool)
        .await?;

        let source_rows = sqlx::query(
            "SELECT source, COUNT(*) AS count FROM log_entries WHERE \
             ($1::TIMESTAMPTZ IS NULL OR created_at >= $1) AND \
             ($2::TIMESTAMPTZ IS NULL OR created_at <= $2) \
             GROUP BY source",
        )
        .bind(start_time)
        .bind(end_time)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = LogStatistics {
            total_count: 0,
            level_counts: Default::default(),
            source_counts: Default::default(),
        };
        for row in &level_rows {
            let count: i64 = row.get("count");
            stats.total_count += count;
            stats.level_counts.insert(row.get("level"), count);
        }
        for row in &source_rows {
            stats.source_counts.insert(row.get("source"), row.get("count"));
        }
        Ok(stats)
    }
}
