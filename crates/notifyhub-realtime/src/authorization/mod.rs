//! Role-based authorization and namespace routing.

pub mod audit;
pub mod policy;

pub use audit::{AuditEntry, SecurityAuditLog};
pub use policy::AuthorizationPolicy;
