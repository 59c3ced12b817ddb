//! Identity model - roles, permissions and the authenticated actor.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use utoipa::ToSchema;

/// Closed set of platform roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PropertyOwner,
    LawEnforcement,
    InsuranceAgent,
    Broker,
    Banker,
    AssetManager,
    Assistant,
    Secretary,
    Manager,
    ExecutiveAssistant,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::PropertyOwner,
        Role::LawEnforcement,
        Role::InsuranceAgent,
        Role::Broker,
        Role::Banker,
        Role::AssetManager,
        Role::Assistant,
        Role::Secretary,
        Role::Manager,
        Role::ExecutiveAssistant,
        Role::SuperAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::PropertyOwner => "property_owner",
            Role::LawEnforcement => "law_enforcement",
            Role::InsuranceAgent => "insurance_agent",
            Role::Broker => "broker",
            Role::Banker => "banker",
            Role::AssetManager => "asset_manager",
            Role::Assistant => "assistant",
            Role::Secretary => "secretary",
            Role::Manager => "manager",
            Role::ExecutiveAssistant => "executive_assistant",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Roles that are not bound to a tenant.
    pub fn is_platform_wide(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::LawEnforcement)
    }

    /// Roles allowed to delete records they do not own within their tenant.
    pub fn may_delete_tenant_records(&self) -> bool {
        matches!(self, Role::PropertyOwner | Role::Manager)
    }

    /// Permission set granted to this role.
    pub fn permissions(&self) -> &'static BTreeSet<Permission> {
        ROLE_PERMISSIONS
            .get(self)
            .unwrap_or(&NO_PERMISSIONS)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Invalid role: {}", s))
    }
}

/// Capability granted by a role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum Permission {
    #[serde(rename = "read:all")]
    ReadAll,
    #[serde(rename = "write:all")]
    WriteAll,
    #[serde(rename = "read:own")]
    ReadOwn,
    #[serde(rename = "write:own")]
    WriteOwn,
    #[serde(rename = "export:own")]
    ExportOwn,
    #[serde(rename = "audit:read")]
    AuditRead,
    #[serde(rename = "admin:users")]
    AdminUsers,
    #[serde(rename = "admin:system")]
    AdminSystem,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadAll => "read:all",
            Permission::WriteAll => "write:all",
            Permission::ReadOwn => "read:own",
            Permission::WriteOwn => "write:own",
            Permission::ExportOwn => "export:own",
            Permission::AuditRead => "audit:read",
            Permission::AdminUsers => "admin:users",
            Permission::AdminSystem => "admin:system",
        }
    }

    /// `admin:*` permissions.
    pub fn is_admin(&self) -> bool {
        matches!(self, Permission::AdminUsers | Permission::AdminSystem)
    }
}

static NO_PERMISSIONS: Lazy<BTreeSet<Permission>> = Lazy::new(BTreeSet::new);

static ROLE_PERMISSIONS: Lazy<HashMap<Role, BTreeSet<Permission>>> = Lazy::new(|| {
    use Permission::*;

    let table: [(Role, &[Permission]); 11] = [
        (
            Role::SuperAdmin,
            &[ReadAll, WriteAll, AuditRead, AdminUsers, AdminSystem],
        ),
        (Role::LawEnforcement, &[ReadAll, WriteAll, AuditRead]),
        (
            Role::PropertyOwner,
            &[ReadOwn, WriteOwn, ExportOwn, AuditRead, AdminUsers],
        ),
        (Role::Manager, &[ReadOwn, WriteOwn, ExportOwn, AuditRead]),
        (Role::ExecutiveAssistant, &[ReadOwn, WriteOwn]),
        (Role::Assistant, &[ReadOwn, WriteOwn]),
        (Role::Secretary, &[ReadOwn, WriteOwn]),
        (Role::InsuranceAgent, &[ReadOwn, ExportOwn]),
        (Role::Broker, &[ReadOwn]),
        (Role::Banker, &[ReadOwn]),
        (Role::AssetManager, &[ReadOwn, ExportOwn]),
    ];

    table
        .into_iter()
        .map(|(role, perms)| (role, perms.iter().copied().collect()))
        .collect()
});

/// An authenticated actor as carried by a session.
///
/// `permissions` is computed from `role` when the identity is built and is
/// never mutated afterwards; a role change requires a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    id: String,
    display_name: String,
    email: String,
    role: Role,
    tenant_id: Option<String>,
    #[schema(value_type = Vec<String>)]
    permissions: BTreeSet<Permission>,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        tenant_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: email.into(),
            role,
            tenant_id,
            permissions: role.permissions().clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn has_admin_permission(&self) -> bool {
        self.permissions.iter().any(Permission::is_admin)
    }
}
