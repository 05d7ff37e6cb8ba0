//! Platform Domain Entities

pub mod audit_log;
pub mod config;
pub mod feature_flag;
pub mod log_entry;
pub mod notification;

pub use audit_log::AuditLog;
pub use config::{ConfigHistory, ConfigItem, ConfigScope};
pub use feature_flag::{FeatureFlag, FlagCheckRequest};
pub use log_entry::{LogEntry, LogLevel, LogStatistics};
pub use notification::{
    Notification, NotificationPriority, NotificationStatus, NotificationType,
};
