//! Postgres-backed webhook store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{Result, WebhookError};
use crate::model::{DeliveryAttempt, DeliveryStatus, Endpoint, EndpointStatus, Subscription};
use crate::store::WebhookStore;

pub struct PostgresWebhookStore {
    pool: PgPool,
}

impl PostgresWebhookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<()> {
        // Multi-statement DDL needs the simple query protocol.
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS webhook_endpoints (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                secret TEXT,
                headers JSONB,
                retry_count INTEGER NOT NULL DEFAULT 3,
                timeout_seconds INTEGER NOT NULL DEFAULT 5,
                status TEXT NOT NULL DEFAULT 'active',
                failure_streak INTEGER NOT NULL DEFAULT 0,
                created_by TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_webhook_endpoints_status
                ON webhook_endpoints(status);

            CREATE TABLE IF NOT EXISTS webhook_subscriptions (
                id UUID PRIMARY KEY,
                endpoint_id UUID NOT NULL
                    REFERENCES webhook_endpoints(id) ON DELETE CASCADE,
                event_type TEXT NOT NULL,
                filter_condition JSONB,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (endpoint_id, event_type)
            );
            CREATE INDEX IF NOT EXISTS idx_webhook_subscriptions_event_type
                ON webhook_subscriptions(event_type);

            CREATE TABLE IF NOT EXISTS webhook_deliveries (
                id UUID PRIMARY KEY,
                endpoint_id UUID NOT NULL
                    REFERENCES webhook_endpoints(id) ON DELETE CASCADE,
                event_type TEXT NOT NULL,
                payload JSONB NOT NULL,
                status TEXT NOT NULL,
                attempt_count INTEGER NOT NULL,
                response_status INTEGER,
                response_body TEXT,
                error_message TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                last_attempt_at TIMESTAMPTZ,
                next_retry_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ
            );
            CREATE INDEX IF NOT EXISTS idx_webhook_deliveries_status
                ON webhook_deliveries(status);
            CREATE INDEX IF NOT EXISTS idx_webhook_deliveries_next_retry
                ON webhook_deliveries(next_retry_at);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn endpoint_from_row(row: &sqlx::postgres::PgRow, prefix: &str) -> Result<Endpoint> {
    let col = |name: &str| format!("{}{}", prefix, name);
    let status_str: String = row.get(col("status").as_str());
    let status = EndpointStatus::parse(&status_str)
        .ok_or_else(|| WebhookError::internal(format!("unknown endpoint status: {}", status_str)))?;

    Ok(Endpoint {
        id: row.get(col("id").as_str()),
        name: row.get(col("name").as_str()),
        url: row.get(col("url").as_str()),
        description: row.get(col("description").as_str()),
        secret: row.get(col("secret").as_str()),
        headers: row.get(col("headers").as_str()),
        retry_count: row.get(col("retry_count").as_str()),
        timeout_seconds: row.get(col("timeout_seconds").as_str()),
        status,
        failure_streak: row.get(col("failure_streak").as_str()),
        created_by: row.get(col("created_by").as_str()),
        created_at: row.get(col("created_at").as_str()),
        updated_at: row.get(col("updated_at").as_str()),
    })
}

fn delivery_from_row(row: &sqlx::postgres::PgRow) -> Result<DeliveryAttempt> {
    let status_str: String = row.get("status");
    let status = DeliveryStatus::parse(&status_str)
        .ok_or_else(|| WebhookError::internal(format!("unknown delivery status: {}", status_str)))?;

    Ok(DeliveryAttempt {
        id: row.get("id"),
        endpoint_id: row.get("endpoint_id"),
        event_type: row.get("event_type"),
        payload: row.get("payload"),
        status,
        attempt_count: row.get("attempt_count"),
        response_status: row.get("response_status"),
        response_body: row.get("response_body"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        last_attempt_at: row.get("last_attempt_at"),
        next_retry_at: row.get("next_retry_at"),
        completed_at: row.get("completed_at"),
    })
}

fn subscription_from_row(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        endpoint_id: row.get("endpoint_id"),
        event_type: row.get("event_type"),
        filter_condition: row.get("filter_condition"),
        created_at: row.get("created_at"),
    }
}

const DELIVERY_COLUMNS: &str = "id, endpoint_id, event_type, payload, status, attempt_count, \
     response_status, response_body, error_message, created_at, last_attempt_at, \
     next_retry_at, completed_at";

/// Admin surface used by the management APIs. These sit outside the
/// [`WebhookStore`] trait because only the delivery core needs to be
/// swappable.
impl PostgresWebhookStore {
    pub async fn insert_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook_endpoints \
             (id, name, url, description, secret, headers, retry_count, timeout_seconds, \
              status, failure_streak, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(endpoint.id)
        .bind(&endpoint.name)
        .bind(&endpoint.url)
        .bind(&endpoint.description)
        .bind(&endpoint.secret)
        .bind(&endpoint.headers)
        .bind(endpoint.retry_count)
        .bind(endpoint.timeout_seconds)
        .bind(endpoint.status.as_str())
        .bind(endpoint.failure_streak)
        .bind(&endpoint.created_by)
        .bind(endpoint.created_at)
        .bind(endpoint.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_endpoints SET name = $2, url = $3, description = $4, \
             secret = $5, headers = $6, retry_count = $7, timeout_seconds = $8, \
             status = $9, failure_streak = $10, updated_at = $11 \
             WHERE id = $1",
        )
        .bind(endpoint.id)
        .bind(&endpoint.name)
        .bind(&endpoint.url)
        .bind(&endpoint.description)
        .bind(&endpoint.secret)
        .bind(&endpoint.headers)
        .bind(endpoint.retry_count)
        .bind(endpoint.timeout_seconds)
        .bind(endpoint.status.as_str())
        .bind(endpoint.failure_streak)
        .bind(endpoint.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete an endpoint; subscriptions and deliveries cascade.
    pub async fn delete_endpoint(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhook_endpoints WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_endpoints(&self, offset: i64, limit: i64) -> Result<Vec<Endpoint>> {
        let rows = sqlx::query(
            "SELECT * FROM webhook_endpoints ORDER BY created_at DESC OFFSET $1 LIMIT $2",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| endpoint_from_row(r, "")).collect()
    }

    pub async fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook_subscriptions \
             (id, endpoint_id, event_type, filter_condition, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(subscription.id)
        .bind(subscription.endpoint_id)
        .bind(&subscription.event_type)
        .bind(&subscription.filter_condition)
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query("SELECT * FROM webhook_subscriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| subscription_from_row(&r)))
    }

    pub async fn list_subscriptions(&self, endpoint_id: Uuid) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(
            "SELECT * FROM webhook_subscriptions WHERE endpoint_id = $1 ORDER BY event_type",
        )
        .bind(endpoint_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(subscription_from_row).collect())
    }

    pub async fn subscription_exists(&self, endpoint_id: Uuid, event_type: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 AS present FROM webhook_subscriptions \
             WHERE endpoint_id = $1 AND event_type = $2",
        )
        .bind(endpoint_id)
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn delete_subscription(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_delivery(&self, id: Uuid) -> Result<Option<DeliveryAttempt>> {
        let row = sqlx::query("SELECT * FROM webhook_deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| delivery_from_row(&r)).transpose()
    }

    /// Delivery history for one endpoint, newest first.
    pub async fn deliveries_for_endpoint(
        &self,
        endpoint_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>> {
        let rows = sqlx::query(
            "SELECT * FROM webhook_deliveries WHERE endpoint_id = $1 \
             ORDER BY created_at DESC OFFSET $2 LIMIT $3",
        )
        .bind(endpoint_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(delivery_from_row).collect()
    }
}

#[async_trait]
impl WebhookStore for PostgresWebhookStore {
    async fn subscriptions_for_event(
        &self,
        event_type: &str,
    ) -> Result<Vec<(Endpoint, Subscription)>> {
        let rows = sqlx::query(
            r#"
            SELECT
                e.id AS e_id, e.name AS e_name, e.url AS e_url,
                e.description AS e_description, e.secret AS e_secret,
                e.headers AS e_headers, e.retry_count AS e_retry_count,
                e.timeout_seconds AS e_timeout_seconds, e.status AS e_status,
                e.failure_streak AS e_failure_streak, e.created_by AS e_created_by,
                e.created_at AS e_created_at, e.updated_at AS e_updated_at,
                s.id AS s_id, s.endpoint_id AS s_endpoint_id,
                s.event_type AS s_event_type, s.filter_condition AS s_filter_condition,
                s.created_at AS s_created_at
            FROM webhook_subscriptions s
            JOIN webhook_endpoints e ON e.id = s.endpoint_id
            WHERE s.event_type = $1 AND e.status = 'active'
            "#,
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            let endpoint = endpoint_from_row(&row, "e_")?;
            let subscription = Subscription {
                id: row.get("s_id"),
                endpoint_id: row.get("s_endpoint_id"),
                event_type: row.get("s_event_type"),
                filter_condition: row.get("s_filter_condition"),
                created_at: row.get("s_created_at"),
            };
            matches.push((endpoint, subscription));
        }
        Ok(matches)
    }

    async fn find_endpoint(&self, id: Uuid) -> Result<Option<Endpoint>> {
        let row = sqlx::query(
            "SELECT id, name, url, description, secret, headers, retry_count, \
             timeout_seconds, status, failure_streak, created_by, created_at, updated_at \
             FROM webhook_endpoints WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| endpoint_from_row(&r, "")).transpose()
    }

    async fn insert_delivery(&self, delivery: &DeliveryAttempt) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook_deliveries \
             (id, endpoint_id, event_type, payload, status, attempt_count, response_status, \
              response_body, error_message, created_at, last_attempt_at, next_retry_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(delivery.id)
        .bind(delivery.endpoint_id)
        .bind(&delivery.event_type)
        .bind(&delivery.payload)
        .bind(delivery.status.as_str())
        .bind(delivery.attempt_count)
        .bind(delivery.response_status)
        .bind(&delivery.response_body)
        .bind(&delivery.error_message)
        .bind(delivery.created_at)
        .bind(delivery.last_attempt_at)
        .bind(delivery.next_retry_at)
        .bind(delivery.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_delivery(&self, delivery: &DeliveryAttempt) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_deliveries SET \
             status = $2, attempt_count = $3, response_status = $4, response_body = $5, \
             error_message = $6, last_attempt_at = $7, next_retry_at = $8, completed_at = $9 \
             WHERE id = $1",
        )
        .bind(delivery.id)
        .bind(delivery.status.as_str())
        .bind(delivery.attempt_count)
        .bind(delivery.response_status)
        .bind(&delivery.response_body)
        .bind(&delivery.error_message)
        .bind(delivery.last_attempt_at)
        .bind(delivery.next_retry_at)
        .bind(delivery.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>> {
        // Claim-then-process: the conditional UPDATE with SKIP LOCKED is
        // what keeps two sweep workers from double-sending one attempt.
        let rows = sqlx::query(&format!(
            "UPDATE webhook_deliveries SET status = 'pending', next_retry_at = NULL \
             WHERE id IN ( \
                 SELECT id FROM webhook_deliveries \
                 WHERE status = 'retrying' AND next_retry_at <= $1 \
                 ORDER BY next_retry_at \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {DELIVERY_COLUMNS}"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(delivery_from_row).collect()
    }

    async fn recover_stuck_deliveries(&self, timeout: std::time::Duration) -> Result<u64> {
        let grace = chrono::Duration::from_std(timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000));
        let cutoff = Utc::now() - grace;

        // A pending row is either a claimed retry or a first send in
        // flight; both carry no next_retry_at. Past the grace period the
        // owning worker is gone, so hand the row back to the sweep.
        let result = sqlx::query(
            "UPDATE webhook_deliveries SET status = 'retrying', next_retry_at = $2 \
             WHERE status = 'pending' \
             AND COALESCE(last_attempt_at, created_at) <= $1",
        )
        .bind(cutoff)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn record_terminal_failure(&self, endpoint_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            "UPDATE webhook_endpoints \
             SET failure_streak = failure_streak + 1, updated_at = $2 \
             WHERE id = $1 \
             RETURNING failure_streak",
        )
        .bind(endpoint_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        // The endpoint may have been deleted while the delivery was in
        // flight; a missing row is a zero streak, not an error.
        Ok(row.map(|r| r.get::<i32, _>("failure_streak") as i64).unwrap_or(0))
    }

    async fn reset_failure_streak(&self, endpoint_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_endpoints SET failure_streak = 0, updated_at = $2 \
             WHERE id = $1 AND failure_streak <> 0",
        )
        .bind(endpoint_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_endpoint_failed(&self, endpoint_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_endpoints SET status = 'failed', updated_at = $2 \
             WHERE id = $1 AND status = 'active'",
        )
        .bind(endpoint_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
