//! Services layer: the audit and access-control core.

pub mod audit;
pub mod audit_query;
pub mod audit_store;
pub mod auth;
pub mod authorization;
pub mod error;
pub mod guard;
pub mod identity_repository;
pub mod metrics;
pub mod password;
pub mod password_policy;
pub mod revocation;
pub mod session;
pub mod tenant_users;

pub use audit::{AuditActor, AuditLogger};
pub use audit_query::AuditQuery;
pub use audit_store::{AuditStore, InMemoryAuditStore, PgAuditStore};
pub use auth::{AuthService, LoginOutcome};
pub use authorization::{AuthorizationPolicy, Decision, DenyReason};
pub use error::ServiceError;
pub use guard::AccessGuard;
pub use identity_repository::{IdentityRepository, InMemoryIdentityRepository, PgIdentityRepository};
pub use password::PasswordService;
pub use password_policy::{validate_strength, StrengthRating, StrengthReport};
pub use revocation::{MockRevocationList, RedisService, SessionRevocationList};
pub use session::SessionStore;
pub use tenant_users::{NewTenantUser, TenantUserService};
