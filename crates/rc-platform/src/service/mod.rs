//! Platform Services

pub mod audit;
pub mod events;

pub use audit::AuditService;
pub use events::EventEmitter;
