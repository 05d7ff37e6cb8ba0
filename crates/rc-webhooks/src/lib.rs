//! RelayCore webhook delivery.
//!
//! Store-backed dispatch of platform events to registered HTTP
//! endpoints: subscription matching with payload filters, HMAC-SHA256
//! request signing, exponential-backoff retries driven by a
//! claim-then-process sweep, and per-endpoint health tracking with
//! automatic disablement.

pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod health;
pub mod model;
pub mod retry;
pub mod signature;
pub mod store;
pub mod sweep;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{Result, WebhookError};
pub use health::{HealthConfig, HealthTracker};
pub use model::{
    DeliveryAttempt, DeliveryPayload, DeliveryStatus, Endpoint, EndpointStatus, Subscription,
    WebhookEventType,
};
pub use retry::{RetryDisposition, RetryPolicy, RetryScheduler};
pub use store::{MemoryWebhookStore, PostgresWebhookStore, WebhookStore};
pub use sweep::{RetrySweeper, SweepConfig};
