//! Webhook Event Emission
//!
//! Bridges platform mutations to the webhook dispatcher. Dispatch runs
//! on a spawned task so API requests never block on receiver network
//! I/O; delivery state is persisted by the dispatcher itself.

use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use rc_webhooks::{Dispatcher, WebhookEventType};

#[derive(Clone)]
pub struct EventEmitter {
    dispatcher: Arc<Dispatcher>,
}

impl EventEmitter {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Fire-and-forget dispatch of one platform event.
    pub fn emit(&self, event_type: WebhookEventType, payload: Value) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(event_type.as_str(), &payload).await {
                error!("Failed to dispatch {} event: {}", event_type, e);
            }
        });
    }
}
