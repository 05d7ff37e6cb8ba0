//! Configuration Entities
//!
//! Scopes group related configuration items; every create or update of
//! an item appends a history row carrying the value and version it
//! replaced, so the full change trail is reconstructable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named configuration namespace (e.g. "auth", "billing").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigScope {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigScope {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One configuration key within a scope.
///
/// `version` starts at 1 and advances on every value change. Keys are
/// unique per scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigItem {
    pub id: Uuid,
    pub scope_id: Uuid,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub version: i32,
    /// Secret values are masked in list responses.
    pub is_secret: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigItem {
    pub fn new(scope_id: Uuid, key: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            scope_id,
            key: key.into(),
            value: value.into(),
            description: None,
            version: 1,
            is_secret: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_secret(mut self, is_secret: bool) -> Self {
        self.is_secret = is_secret;
        self
    }

    /// Replace the value, advancing the version counter.
    pub fn apply_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// A snapshot of a config item at one version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigHistory {
    pub id: Uuid,
    pub config_id: Uuid,
    pub value: String,
    pub version: i32,
    pub changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConfigHistory {
    pub fn snapshot(item: &ConfigItem, changed_by: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config_id: item.id,
            value: item.value.clone(),
            version: item.version,
            changed_by,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_value_advances_version() {
        let mut item = ConfigItem::new(Uuid::new_v4(), "app.timeout", "30");
        assert_eq!(item.version, 1);
        item.apply_value("60");
        assert_eq!(item.version, 2);
        assert_eq!(item.value, "60");
    }

    #[test]
    fn test_snapshot_captures_current_version() {
        let mut item = ConfigItem::new(Uuid::new_v4(), "app.timeout", "30");
        item.apply_value("60");
        let snap = ConfigHistory::snapshot(&item, Some("alice".to_string()));
        assert_eq!(snap.version, 2);
        assert_eq!(snap.value, "60");
        assert_eq!(snap.config_id, item.id);
    }
}
