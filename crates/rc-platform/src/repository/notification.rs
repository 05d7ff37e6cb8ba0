//! Notification Repository

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{
    Notification, NotificationPriority, NotificationStatus, NotificationType,
};
use crate::error::{PlatformError, Result};

pub struct NotificationRepository {
    pool: PgPool,
}

fn notification_from_row(row: &sqlx::postgres::PgRow) -> Result<Notification> {
    let type_str: String = row.get("notification_type");
    let priority_str: String = row.get("priority");
    let status_str: String = row.get("status");

    Ok(Notification {
        id: row.get("id"),
        title: row.get("title"),
        message: row.get("message"),
        notification_type: NotificationType::parse(&type_str).ok_or_else(|| {
            PlatformError::internal(format!("unknown notification type: {}", type_str))
        })?,
        priority: NotificationPriority::parse(&priority_str).ok_or_else(|| {
            PlatformError::internal(format!("unknown notification priority: {}", priority_str))
        })?,
        status: NotificationStatus::parse(&status_str).ok_or_else(|| {
            PlatformError::internal(format!("unknown notification status: {}", status_str))
        })?,
        recipient_id: row.get("recipient_id"),
        recipient_type: row.get("recipient_type"),
        sender_id: row.get("sender_id"),
        data: row.get("data"),
        action_url: row.get("action_url"),
        created_at: row.get("created_at"),
        delivered_at: row.get("delivered_at"),
        read_at: row.get("read_at"),
        expires_at: row.get("expires_at"),
    })
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            "INSERT INTO notifications \
             (id, title, message, notification_type, priority, status, recipient_id, \
              recipient_type, sender_id, data, action_url, created_at, delivered_at, \
              read_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(notification.id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.notification_type.as_str())
        .bind(notification.priority.as_str())
        .bind(notification.status.as_str())
        .bind(&notification.recipient_id)
        .bind(&notification.recipient_type)
        .bind(&notification.sender_id)
        .bind(&notification.data)
        .bind(&notification.action_url)
        .bind(notification.created_at)
        .bind(notification.delivered_at)
        .bind(notification.read_at)
        .bind(notification.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| notification_from_row(&r)).transpose()
    }

    /// Notifications for a recipient, newest first, optionally filtered
    /// by status.
    pub async fn list_for_recipient(
        &self,
        recipient_id: &str,
        status: Option<NotificationStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT * FROM notifications WHERE recipient_id = $1 AND \
             ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC OFFSET $3 LIMIT $4",
        )
        .bind(recipient_id)
        .bind(status.map(|s| s.as_str()))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(notification_from_row).collect()
    }

    pub async fn update(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            "UPDATE notifications SET status = $2, delivered_at = $3, read_at = $4 \
             WHERE id = $1",
        )
        .bind(notification.id)
        .bind(notification.status.as_str())
        .bind(notification.delivered_at)
        .bind(notification.read_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
