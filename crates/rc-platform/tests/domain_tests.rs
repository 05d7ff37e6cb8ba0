//! Domain behavior tests that need no database.

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use rc_platform::domain::{
    AuditLog, ConfigHistory, ConfigItem, FeatureFlag, FlagCheckRequest, LogLevel, Notification,
    NotificationStatus,
};

#[test]
fn test_config_history_trail_across_updates() {
    let mut item = ConfigItem::new(Uuid::new_v4(), "auth.session_ttl", "3600");
    let mut trail = vec![ConfigHistory::snapshot(&item, None)];

    item.apply_value("7200");
    trail.push(ConfigHistory::snapshot(&item, Some("alice".to_string())));
    item.apply_value("1800");
    trail.push(ConfigHistory::snapshot(&item, Some("bob".to_string())));

    let versions: Vec<i32> = trail.iter().map(|h| h.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert_eq!(trail[2].value, "1800");
    assert_eq!(item.version, 3);
    assert!(trail.iter().all(|h| h.config_id == item.id));
}

#[test]
fn test_user_targeting_beats_percentage_rule() {
    // A targeted user is granted even when the rollout excludes everyone.
    let flag = FeatureFlag::new("new-checkout", "New Checkout")
        .with_enabled(true)
        .with_rules(json!({"users": ["alice"], "percentage": 0}));

    let alice = FlagCheckRequest {
        user_id: Some("alice".to_string()),
        ..Default::default()
    };
    let bob = FlagCheckRequest {
        user_id: Some("bob".to_string()),
        ..Default::default()
    };
    assert!(flag.is_enabled_for(&alice));
    assert!(!flag.is_enabled_for(&bob));
}

#[test]
fn test_percentage_rule_ignored_without_user_id() {
    let flag = FeatureFlag::new("new-checkout", "New Checkout")
        .with_enabled(true)
        .with_rules(json!({"percentage": 0}));

    // Anonymous checks fall through to the global enabled value.
    assert!(flag.is_enabled_for(&FlagCheckRequest::default()));
}

#[test]
fn test_notification_expiry_boundary() {
    let now = Utc::now();
    let mut n = Notification::new("Maintenance", "Tonight 22:00", "user-1", "user");
    assert!(!n.is_expired(now));

    n.expires_at = Some(now - Duration::seconds(1));
    assert!(n.is_expired(now));
    n.expires_at = Some(now + Duration::seconds(1));
    assert!(!n.is_expired(now));
}

#[test]
fn test_notification_delivered_then_read_keeps_first_delivery_time() {
    let mut n = Notification::new("Hi", "Body", "user-1", "user");
    n.mark_delivered();
    let delivered_at = n.delivered_at;
    n.mark_read();
    assert_eq!(n.status, NotificationStatus::Read);
    assert_eq!(n.delivered_at, delivered_at);
}

#[test]
fn test_audit_log_builders() {
    let log = AuditLog::new("alice", "config_updated", "config", "cfg-1", "update")
        .with_change(Some("30".to_string()), Some("60".to_string()))
        .with_metadata(json!({"scope": "auth"}))
        .with_ip_address("10.0.0.1");
    assert_eq!(log.actor_id, "alice");
    assert_eq!(log.old_value.as_deref(), Some("30"));
    assert_eq!(log.new_value.as_deref(), Some("60"));
    assert_eq!(log.ip_address.as_deref(), Some("10.0.0.1"));
}

#[test]
fn test_log_level_round_trip() {
    for level in LogLevel::all() {
        assert_eq!(LogLevel::parse(level.as_str()), Some(*level));
    }
    assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warning));
    assert_eq!(LogLevel::parse("nonsense"), None);
}
