//! Tenant- and role-scoped access decisions.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. no identity: deny
//! 2. platform grant from the cross-tenant allow-list (untenanted identities only): permit
//! 3. platform-level resource without an `admin:*` permission: deny
//! 4. resource tenant differs from the identity's tenant: deny
//! 5. role rules within the tenant
//! 6. deny
//!
//! The policy never records anything. Callers go through
//! [`AccessGuard`](super::guard::AccessGuard) so that every denial is audited.

use serde::Serialize;

use super::error::ServiceError;
use crate::models::{AccessAction, Identity, Permission, ResourceKind, ResourceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Unauthenticated,
    PlatformResource,
    TenantMismatch,
    SelfModification,
    MissingPermission,
    NotOwner,
    NotGrantable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Permit,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Decision::Permit)
    }
}

/// Platform permission that grants `action` across tenants, if any.
/// No platform permission grants `delete`.
pub fn cross_tenant_grant(action: AccessAction) -> Option<Permission> {
    match action {
        AccessAction::Read | AccessAction::Export => Some(Permission::ReadAll),
        AccessAction::Create | AccessAction::Update => Some(Permission::WriteAll),
        AccessAction::ViewAudit | AccessAction::ManageTenants | AccessAction::ManageUsers => {
            Some(Permission::AdminSystem)
        }
        AccessAction::Delete => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    pub fn evaluate(
        identity: Option<&Identity>,
        action: AccessAction,
        resource: &ResourceRef,
    ) -> Decision {
        let Some(identity) = identity else {
            return Decision::Deny(DenyReason::Unauthenticated);
        };

        if identity.tenant_id().is_none() {
            if let Some(permission) = cross_tenant_grant(action) {
                if identity.has_permission(permission) {
                    return Decision::Permit;
                }
            }
        }

        if resource.is_platform_level() && !identity.has_admin_permission() {
            return Decision::Deny(DenyReason::PlatformResource);
        }

        if let Some(resource_tenant) = resource.tenant_id.as_deref() {
            if identity.tenant_id() != Some(resource_tenant) {
                return Decision::Deny(DenyReason::TenantMismatch);
            }
        }

        // Tenant-scoped role rules only ever apply inside a tenant
        if resource.is_platform_level() {
            return Decision::Deny(DenyReason::PlatformResource);
        }

        Self::role_rule(identity, action, resource)
    }

    fn role_rule(identity: &Identity, action: AccessAction, resource: &ResourceRef) -> Decision {
        let targets_self = resource.kind == ResourceKind::User
            && resource.id.as_deref() == Some(identity.id());
        if targets_self
            && matches!(
                action,
                AccessAction::ManageUsers | AccessAction::Update | AccessAction::Delete
            )
        {
            return Decision::Deny(DenyReason::SelfModification);
        }

        let required = match action {
            AccessAction::Read => Permission::ReadOwn,
            AccessAction::Create | AccessAction::Update | AccessAction::Delete => {
                Permission::WriteOwn
            }
            AccessAction::Export => Permission::ExportOwn,
            AccessAction::ManageUsers => Permission::AdminUsers,
            AccessAction::ViewAudit => Permission::AuditRead,
            AccessAction::ManageTenants => return Decision::Deny(DenyReason::NotGrantable),
        };
        if !identity.has_permission(required) {
            return Decision::Deny(DenyReason::MissingPermission);
        }

        if action == AccessAction::Delete {
            let owns = resource.owner_id.as_deref() == Some(identity.id());
            if !owns && !identity.role().may_delete_tenant_records() {
                return Decision::Deny(DenyReason::NotOwner);
            }
        }

        Decision::Permit
    }

    pub fn can_access(
        identity: Option<&Identity>,
        action: AccessAction,
        resource: &ResourceRef,
    ) -> bool {
        Self::evaluate(identity, action, resource).is_permitted()
    }

    /// `Err(Forbidden)` on denial. Callers must pair a denial with an audit entry.
    pub fn require_access(
        identity: Option<&Identity>,
        action: AccessAction,
        resource: &ResourceRef,
    ) -> Result<(), ServiceError> {
        match Self::evaluate(identity, action, resource) {
            Decision::Permit => Ok(()),
            Decision::Deny(reason) => {
                tracing::debug!(
                    action = action.as_str(),
                    resource_type = resource.kind.as_str(),
                    ?reason,
                    "Access denied"
                );
                Err(ServiceError::Forbidden)
            }
        }
    }
}
