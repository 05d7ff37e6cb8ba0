//! Configuration Repository

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{ConfigHistory, ConfigItem, ConfigScope};
use crate::error::Result;

pub struct ConfigRepository {
    pool: PgPool,
}

fn scope_from_row(row: &sqlx::postgres::PgRow) -> ConfigScope {
    ConfigScope {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn item_from_row(row: &sqlx::postgres::PgRow) -> ConfigItem {
    ConfigItem {
        id: row.get("id"),
        scope_id: row.get("scope_id"),
        key: row.get("key"),
        value: row.get("value"),
        description: row.get("description"),
        version: row.get("version"),
        is_secret: row.get("is_secret"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn history_from_row(row: &sqlx::postgres::PgRow) -> ConfigHistory {
    ConfigHistory {
        id: row.get("id"),
        config_id: row.get("config_id"),
        value: row.get("value"),
        version: row.get("version"),
        changed_by: row.get("changed_by"),
        created_at: row.get("created_at"),
    }
}

impl ConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_scope(&self, scope: &ConfigScope) -> Result<()> {
        sqlx::query(
            "INSERT INTO config_scopes (id, name, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(scope.id)
        .bind(&scope.name)
        .bind(&scope.description)
        .bind(scope.created_at)
        .bind(scope.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_scope(&self, id: Uuid) -> Result<Option<ConfigScope>> {
        let row = sqlx::query("SELECT * FROM config_scopes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| scope_from_row(&r)))
    }

    pub async fn find_scope_by_name(&self, name: &str) -> Result<Option<ConfigScope>> {
        let row = sqlx::query("SELECT * FROM config_scopes WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| scope_from_row(&r)))
    }

    pub async fn list_scopes(&self) -> Result<Vec<ConfigScope>> {
        let rows = sqlx::query("SELECT * FROM config_scopes ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(scope_from_row).collect())
    }

    pub async fn update_scope(&self, scope: &ConfigScope) -> Result<()> {
        sqlx::query(
            "UPDATE config_scopes SET name = $2, description = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(scope.id)
        .bind(&scope.name)
        .bind(&scope.description)
        .bind(scope.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a scope; items and history cascade.
    pub async fn delete_scope(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM config_scopes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_item(&self, item: &ConfigItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO config_items \
             (id, scope_id, key, value, description, version, is_secret, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(item.id)
        .bind(item.scope_id)
        .bind(&item.key)
        .bind(&item.value)
        .bind(&item.description)
        .bind(item.version)
        .bind(item.is_secret)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_item(&self, id: Uuid) -> Result<Option<ConfigItem>> {
        let row = sqlx::query("SELECT * FROM config_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| item_from_row(&r)))
    }

    pub async fn find_item_by_key(&self, scope_id: Uuid, key: &str) -> Result<Option<ConfigItem>> {
        let row = sqlx::query("SELECT * FROM config_items WHERE scope_id = $1 AND key = $2")
            .bind(scope_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| item_from_row(&r)))
    }

    pub async fn list_items(&self, scope_id: Uuid) -> Result<Vec<ConfigItem>> {
        let rows = sqlx::query("SELECT * FROM config_items WHERE scope_id = $1 ORDER BY key")
            .bind(scope_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    pub async fn update_item(&self, item: &ConfigItem) -> Result<()> {
        sqlx::query(
            "UPDATE config_items SET value = $2, description = $3, version = $4, \
             is_secret = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(item.id)
        .bind(&item.value)
        .bind(&item.description)
        .bind(item.version)
        .bind(item.is_secret)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_item(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM config_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_history(&self, history: &ConfigHistory) -> Result<()> {
        sqlx::query(
            "INSERT INTO config_history (id, config_id, value, version, changed_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(history.id)
        .bind(history.config_id)
        .bind(&history.value)
        .bind(history.version)
        .bind(&history.changed_by)
        .bind(history.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// History rows for one item, newest version first.
    pub async fn item_history(&self, config_id: Uuid) -> Result<Vec<ConfigHistory>> {
        let rows = sqlx::query(
            "SELECT * FROM config_history WHERE config_id = $1 ORDER BY version DESC",
        )
        .bind(config_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(history_from_row).collect())
    }
}
