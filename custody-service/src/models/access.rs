//! Access model - requested actions and the resources they target.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Action an identity asks to perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    Read,
    Create,
    Update,
    Delete,
    Export,
    ManageUsers,
    ViewAudit,
    ManageTenants,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Read => "read",
            AccessAction::Create => "create",
            AccessAction::Update => "update",
            AccessAction::Delete => "delete",
            AccessAction::Export => "export",
            AccessAction::ManageUsers => "manage_users",
            AccessAction::ViewAudit => "view_audit",
            AccessAction::ManageTenants => "manage_tenants",
        }
    }
}

/// Kind of resource guarded by the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Evidence,
    Item,
    Case,
    User,
    Tenant,
    AuditLog,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Evidence => "evidence",
            ResourceKind::Item => "item",
            ResourceKind::Case => "case",
            ResourceKind::User => "user",
            ResourceKind::Tenant => "tenant",
            ResourceKind::AuditLog => "audit_log",
        }
    }
}

/// Reference to a guarded resource. `tenant_id == None` marks a
/// platform-level entity such as the tenant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: Option<String>,
    pub tenant_id: Option<String>,
    pub owner_id: Option<String>,
}

impl ResourceRef {
    /// A resource that belongs to a tenant.
    pub fn in_tenant(kind: ResourceKind, id: Option<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            tenant_id: Some(tenant_id.into()),
            owner_id: None,
        }
    }

    /// A platform-level resource with no tenant scope.
    pub fn platform(kind: ResourceKind, id: Option<String>) -> Self {
        Self {
            kind,
            id,
            tenant_id: None,
            owner_id: None,
        }
    }

    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn is_platform_level(&self) -> bool {
        self.tenant_id.is_none()
    }
}
