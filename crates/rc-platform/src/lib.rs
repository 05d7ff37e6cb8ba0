//! RelayCore platform services.
//!
//! Configuration scopes and items with change history, feature flags
//! with targeting rules, audit trail, structured log storage, and
//! notifications, exposed over an axum REST API. Mutations emit
//! webhook events through [`rc_webhooks`].

pub mod api;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

pub use error::{PlatformError, Result};
