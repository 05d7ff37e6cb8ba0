//! Feature Flag Repository

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::FeatureFlag;
use crate::error::Result;

pub struct FeatureFlagRepository {
    pool: PgPool,
}

fn flag_from_row(row: &sqlx::postgres::PgRow) -> FeatureFlag {
    FeatureFlag {
        id: row.get("id"),
        key: row.get("key"),
        name: row.get("name"),
        description: row.get("description"),
        enabled: row.get("enabled"),
        rules: row.get("rules"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl FeatureFlagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, flag: &FeatureFlag) -> Result<()> {
        sqlx::query(
            "INSERT INTO feature_flags \
             (id, key, name, description, enabled, rules, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(flag.id)
        .bind(&flag.key)
        .bind(&flag.name)
        .bind(&flag.description)
        .bind(flag.enabled)
        .bind(&flag.rules)
        .bind(flag.created_at)
        .bind(flag.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FeatureFlag>> {
        let row = sqlx::query("SELECT * FROM feature_flags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| flag_from_row(&r)))
    }

    pub async fn find_by_key(&self, key: &str) -> Result<Option<FeatureFlag>> {
        let row = sqlx::query("SELECT * FROM feature_flags WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| flag_from_row(&r)))
    }

    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<FeatureFlag>> {
        let rows = sqlx::query("SELECT * FROM feature_flags ORDER BY key OFFSET $1 LIMIT $2")
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(flag_from_row).collect())
    }

    pub async fn update(&self, flag: &FeatureFlag) -> Result<()> {
        sqlx::query(
            "UPDATE feature_flags SET name = $2, description = $3, enabled = $4, \
             rules = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(flag.id)
        .bind(&flag.name)
        .bind(&flag.description)
        .bind(flag.enabled)
        .bind(&flag.rules)
        .bind(flag.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_by_key(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feature_flags WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
