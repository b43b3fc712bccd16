//! Server middleware
//!
//! Provides the shared audit log and connection admission.

pub mod admission;
pub mod logging;

pub use admission::Admission;
pub use logging::{AuditEntry, AuditLog, AuditStats, Direction};
