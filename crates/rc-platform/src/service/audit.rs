//! Audit Service
//!
//! Centralized audit logging for platform mutations. Recording is
//! best-effort: a failed insert is logged and never fails the mutation
//! that triggered it.

use std::sync::Arc;

use tracing::error;

use crate::domain::AuditLog;
use crate::repository::AuditLogRepository;

#[derive(Clone)]
pub struct AuditService {
    repo: Arc<AuditLogRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<AuditLogRepository>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, log: AuditLog) {
        if let Err(e) = self.repo.insert(&log).await {
            error!(
                "Failed to record audit log for {} {}: {}",
                log.resource_type, log.resource_id, e
            );
        }
    }

    pub async fn record_create(&self, actor_id: &str, resource_type: &str, resource_id: &str) {
        let log = AuditLog::new(
            actor_id,
            format!("{}_created", resource_type),
            resource_type,
            resource_id,
            "create",
        );
        self.record(log).await;
    }

    pub async fn record_update(
        &self,
        actor_id: &str,
        resource_type: &str,
        resource_id: &str,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        let log = AuditLog::new(
            actor_id,
            format!("{}_updated", resource_type),
            resource_type,
            resource_id,
            "update",
        )
        .with_change(old_value, new_value);
        self.record(log).await;
    }

    pub async fn record_delete(&self, actor_id: &str, resource_type: &str, resource_id: &str) {
        let log = AuditLog::new(
            actor_id,
            format!("{}_deleted", resource_type),
            resource_type,
            resource_id,
            "delete",
        );
        self.record(log).await;
    }
}
