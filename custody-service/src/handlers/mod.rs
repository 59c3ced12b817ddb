//! HTTP handlers for the custody service.

pub mod audit;
pub mod auth;
pub mod authz;
pub mod metrics;
pub mod tenant_users;

pub use audit::*;
pub use auth::*;
pub use authz::*;
pub use tenant_users::*;
