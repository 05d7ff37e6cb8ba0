//! Feature Flag Entity
//!
//! A flag is globally enabled or disabled; optional JSON targeting
//! rules narrow an enabled flag to specific users, groups, attribute
//! values, or a deterministic percentage of users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub id: Uuid,
    /// Stable lookup key, unique across flags.
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// Targeting rules object: `users` (ids), `groups` (names),
    /// `attributes` (required equalities), `percentage` (0..100 rollout).
    pub rules: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Evaluation context for one flag check.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlagCheckRequest {
    pub user_id: Option<String>,
    pub groups: Option<Vec<String>>,
    pub attributes: Option<serde_json::Map<String, Value>>,
}

impl FeatureFlag {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            name: name.into(),
            description: None,
            enabled: false,
            rules: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_rules(mut self, rules: Value) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Evaluate the flag for one user context.
    ///
    /// A disabled flag is off for everyone. An enabled flag without
    /// rules is on for everyone. With rules, user, group, and attribute
    /// targeting each grant access on match; a `percentage` rule then
    /// decides by a stable hash of the user id; otherwise the global
    /// value stands.
    pub fn is_enabled_for(&self, check: &FlagCheckRequest) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(rules) = self.rules.as_ref().and_then(|r| r.as_object()) else {
            return true;
        };
        if rules.is_empty() {
            return true;
        }

        if let (Some(user_id), Some(users)) =
            (check.user_id.as_deref(), rules.get("users").and_then(|u| u.as_array()))
        {
            if users.iter().any(|u| u.as_str() == Some(user_id)) {
                return true;
            }
        }

        if let (Some(groups), Some(targeted)) =
            (check.groups.as_ref(), rules.get("groups").and_then(|g| g.as_array()))
        {
            if groups
                .iter()
                .any(|g| targeted.iter().any(|t| t.as_str() == Some(g.as_str())))
            {
                return true;
            }
        }

        if let (Some(attributes), Some(targeted)) =
            (check.attributes.as_ref(), rules.get("attributes").and_then(|a| a.as_object()))
        {
            if targeted
                .iter()
                .any(|(key, value)| attributes.get(key) == Some(value))
            {
                return true;
            }
        }

        if let (Some(user_id), Some(percentage)) =
            (check.user_id.as_deref(), rules.get("percentage").and_then(|p| p.as_f64()))
        {
            if percentage >= 100.0 {
                return true;
            }
            if percentage <= 0.0 {
                return false;
            }
            // The percentage rule is decisive when present.
            return (rollout_bucket(user_id) as f64) < percentage;
        }

        self.enabled
    }
}

/// Stable bucket in 0..100 for percentage rollout. The same user id
/// always lands in the same bucket across processes and restarts.
fn rollout_bucket(user_id: &str) -> u64 {
    let digest = Sha256::digest(user_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check_for_user(user_id: &str) -> FlagCheckRequest {
        FlagCheckRequest {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_flag_is_off_for_everyone() {
        let flag = FeatureFlag::new("dark-mode", "Dark Mode")
            .with_rules(json!({"users": ["alice"]}));
        assert!(!flag.is_enabled_for(&check_for_user("alice")));
    }

    #[test]
    fn test_enabled_flag_without_rules_is_on_for_everyone() {
        let flag = FeatureFlag::new("dark-mode", "Dark Mode").with_enabled(true);
        assert!(flag.is_enabled_for(&FlagCheckRequest::default()));
    }

    #[test]
    fn test_user_targeting() {
        let flag = FeatureFlag::new("beta", "Beta")
            .with_enabled(true)
            .with_rules(json!({"users": ["alice", "bob"]}));
        assert!(flag.is_enabled_for(&check_for_user("alice")));
        assert!(flag.is_enabled_for(&check_for_user("bob")));
        // No targeting matched and no percentage rule: global value stands.
        assert!(flag.is_enabled_for(&check_for_user("carol")));
    }

    #[test]
    fn test_group_targeting() {
        let flag = FeatureFlag::new("beta", "Beta")
            .with_enabled(true)
            .with_rules(json!({"groups": ["staff"], "percentage": 0}));
        let staff = FlagCheckRequest {
            user_id: Some("dave".to_string()),
            groups: Some(vec!["staff".to_string()]),
            ..Default::default()
        };
        assert!(flag.is_enabled_for(&staff));

        let outsider = check_for_user("dave");
        assert!(!flag.is_enabled_for(&outsider));
    }

    #[test]
    fn test_attribute_targeting() {
        let flag = FeatureFlag::new("beta", "Beta")
            .with_enabled(true)
            .with_rules(json!({"attributes": {"country": "US"}, "percentage": 0}));
        let us_user = FlagCheckRequest {
            user_id: Some("erin".to_string()),
            attributes: Some(
                json!({"country": "US", "role": "admin"}).as_object().unwrap().clone(),
            ),
            ..Default::default()
        };
        assert!(flag.is_enabled_for(&us_user));

        let eu_user = FlagCheckRequest {
            user_id: Some("erin".to_string()),
            attributes: Some(json!({"country": "DE"}).as_object().unwrap().clone()),
            ..Default::default()
        };
        assert!(!flag.is_enabled_for(&eu_user));
    }

    #[test]
    fn test_percentage_rollout_is_deterministic_and_bounded() {
        let all = FeatureFlag::new("beta", "Beta")
            .with_enabled(true)
            .with_rules(json!({"percentage": 100}));
        let none = FeatureFlag::new("beta", "Beta")
            .with_enabled(true)
            .with_rules(json!({"percentage": 0}));
        let half = FeatureFlag::new("beta", "Beta")
            .with_enabled(true)
            .with_rules(json!({"percentage": 50}));

        for user in ["alice", "bob", "carol", "dave"] {
            let check = check_for_user(user);
            assert!(all.is_enabled_for(&check));
            assert!(!none.is_enabled_for(&check));
            // Deterministic: the same user always gets the same answer.
            assert_eq!(half.is_enabled_for(&check), half.is_enabled_for(&check));
        }
    }

    #[test]
    fn test_rollout_bucket_range() {
        for user in ["a", "b", "c", "user-12345", ""] {
            assert!(rollout_bucket(user) < 100);
        }
    }
}
