//! Endpoint health tracking.
//!
//! Aggregates terminal delivery outcomes per endpoint and demotes an
//! endpoint to `failed` after sustained failure. The streak lives on the
//! endpoint row and is advanced atomically in the store, so concurrent
//! workers agree on the count and it survives restarts.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::model::Endpoint;
use crate::store::WebhookStore;

#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    /// Consecutive terminal failures before an endpoint is demoted.
    pub failure_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { failure_threshold: 5 }
    }
}

#[derive(Clone)]
pub struct HealthTracker {
    store: Arc<dyn WebhookStore>,
    config: HealthConfig,
}

impl HealthTracker {
    pub fn new(store: Arc<dyn WebhookStore>, config: HealthConfig) -> Self {
        Self { store, config }
    }

    /// Record the final outcome of a delivery lifecycle.
    ///
    /// Success resets the streak; a terminal failure advances it and, at
    /// the threshold, demotes the endpoint. Demotion is one-directional -
    /// reactivation is an explicit admin update, never automatic.
    pub async fn record_outcome(&self, endpoint: &Endpoint, success: bool) -> Result<()> {
        if success {
            self.store.reset_failure_streak(endpoint.id).await?;
            return Ok(());
        }

        let streak = self.store.record_terminal_failure(endpoint.id).await?;
        if streak >= self.config.failure_threshold as i64 {
            warn!(
                "Endpoint {} reached {} consecutive terminal failures, marking failed",
                endpoint.id, streak
            );
            self.store.mark_endpoint_failed(endpoint.id).await?;
        } else {
            info!(
                "Endpoint {} terminal failure {}/{}",
                endpoint.id, streak, self.config.failure_threshold
            );
        }
        Ok(())
    }
}
