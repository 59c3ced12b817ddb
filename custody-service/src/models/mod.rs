pub mod access;
pub mod account;
pub mod audit_log;
pub mod identity;
pub mod request_meta;

pub use access::{AccessAction, ResourceKind, ResourceRef};
pub use account::{Account, AccountResponse, CredentialRecord, HashAlgorithm};
pub use audit_log::{
    AuditAction, AuditFilter, AuditLogEntry, AuditLogInput, AuditStats, AuditStatsQuery, Severity,
};
pub use identity::{Identity, Permission, Role};
pub use request_meta::RequestMeta;
