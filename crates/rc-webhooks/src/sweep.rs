//! Retry sweep.
//!
//! A background loop that periodically claims due retries from the
//! store and redispatches them. The claim flips each row out of
//! `retrying` before any send, so a crash mid-batch never produces a
//! double send and overlapping sweeps never share a row.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::model::DeliveryAttempt;
use crate::store::WebhookStore;

#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// Pause between sweep passes.
    pub poll_interval: Duration,
    /// Maximum rows claimed per pass.
    pub batch_size: i64,
    /// How long a delivery may sit in `pending` before it is considered
    /// abandoned by a dead worker and re-queued.
    pub stuck_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_size: 100,
            stuck_timeout: Duration::from_secs(300),
        }
    }
}

pub struct RetrySweeper {
    store: Arc<dyn WebhookStore>,
    dispatcher: Dispatcher,
    config: SweepConfig,
}

impl RetrySweeper {
    pub fn new(store: Arc<dyn WebhookStore>, dispatcher: Dispatcher, config: SweepConfig) -> Self {
        Self { store, dispatcher, config }
    }

    /// Run the sweep loop forever. Intended for `tokio::spawn`.
    pub async fn start(self) {
        info!(
            "Retry sweeper started (interval: {:?}, batch size: {})",
            self.config.poll_interval, self.config.batch_size
        );
        loop {
            if let Err(e) = self.sweep_once().await {
                error!("Retry sweep failed: {}", e);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// One claim-and-redispatch pass. Returns the number of attempts
    /// claimed.
    ///
    /// Before claiming, deliveries left in `pending` by a crashed worker
    /// past the stuck timeout are moved back to `retrying` so they
    /// re-enter the claim below instead of sitting stranded.
    pub async fn sweep_once(&self) -> Result<usize> {
        let recovered = self
            .store
            .recover_stuck_deliveries(self.config.stuck_timeout)
            .await?;
        if recovered > 0 {
            warn!("Recovered {} stuck deliveries", recovered);
        }

        let claimed = self
            .store
            .claim_due_retries(Utc::now(), self.config.batch_size)
            .await?;

        if claimed.is_empty() {
            return Ok(0);
        }

        debug!("Claimed {} due retries", claimed.len());
        let count = claimed.len();
        for attempt in claimed {
            self.redispatch(attempt).await?;
        }
        Ok(count)
    }

    async fn redispatch(&self, mut attempt: DeliveryAttempt) -> Result<()> {
        match self.store.find_endpoint(attempt.endpoint_id).await? {
            Some(endpoint) if endpoint.is_active() => {
                self.dispatcher.execute_retry(&endpoint, &mut attempt).await;
            }
            Some(endpoint) => {
                // The endpoint was disabled between the schedule and the
                // claim. Close the record without touching health: the
                // endpoint did not fail, it went away.
                debug!(
                    "Dropping retry {}: endpoint {} is {}",
                    attempt.id,
                    endpoint.id,
                    endpoint.status.as_str()
                );
                attempt.mark_terminal_failure(
                    format!("endpoint is {}", endpoint.status.as_str()),
                    None,
                    None,
                );
                self.store.update_delivery(&attempt).await?;
            }
            None => {
                attempt.mark_terminal_failure("endpoint no longer exists", None, None);
                self.store.update_delivery(&attempt).await?;
            }
        }
        Ok(())
    }
}
