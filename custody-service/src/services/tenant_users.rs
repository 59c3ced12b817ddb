//! Tenant user administration, guarded and audited.

use serde_json::json;
use std::sync::Arc;

use super::audit::{admin_action, AdminAction};
use super::error::ServiceError;
use super::guard::AccessGuard;
use super::identity_repository::IdentityRepository;
use super::password::PasswordService;
use super::password_policy::validate_strength;
use crate::models::{AccessAction, Account, Identity, RequestMeta, ResourceKind, ResourceRef, Role};
use crate::utils::Password;

#[derive(Debug, Clone)]
pub struct NewTenantUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub initial_password: Password,
}

#[derive(Clone)]
pub struct TenantUserService {
    repository: Arc<dyn IdentityRepository>,
    passwords: PasswordService,
    guard: AccessGuard,
}

fn reject_platform_role(role: Role) -> Result<(), ServiceError> {
    if role.is_platform_wide() {
        return Err(ServiceError::Validation(format!(
            "Role {} cannot be assigned within a tenant",
            role
        )));
    }
    Ok(())
}

impl TenantUserService {
    pub fn new(
        repository: Arc<dyn IdentityRepository>,
        passwords: PasswordService,
        guard: AccessGuard,
    ) -> Self {
        Self {
            repository,
            passwords,
            guard,
        }
    }

    /// Account in `tenant_id`, or `NotFound` when it belongs elsewhere.
    async fn tenant_account(&self, tenant_id: &str, user_id: &str) -> Result<Account, ServiceError> {
        self.repository
            .find_by_id(user_id)
            .await?
            .filter(|a| a.tenant_id.as_deref() == Some(tenant_id))
            .ok_or(ServiceError::NotFound("User"))
    }

    pub async fn invite(
        &self,
        actor: &Identity,
        tenant_id: &str,
        user: NewTenantUser,
        meta: &RequestMeta,
    ) -> Result<Account, ServiceError> {
        let resource = ResourceRef::in_tenant(ResourceKind::User, None, tenant_id);
        let entry = admin_action(
            actor,
            AdminAction::UserCreated,
            None,
            Some(json!({ "username": user.username, "role": user.role })),
        )
        .in_tenant(Some(tenant_id.to_string()))
        .request(meta);

        self.guard
            .run(Some(actor), AccessAction::ManageUsers, &resource, entry, move || async move {
                reject_platform_role(user.role)?;
                let report = validate_strength(user.initial_password.as_str());
                if !report.is_valid {
                    return Err(ServiceError::Validation(report.messages().join("; ")));
                }

                let hashed = self.passwords.hash(&user.initial_password).await?;
                let account = Account::new(
                    Some(tenant_id.to_string()),
                    user.username.clone(),
                    user.email.clone(),
                    user.display_name.clone(),
                    user.role,
                    hashed,
                );
                self.repository.create_account(&account).await?;

                tracing::info!(
                    user_id = %account.user_id,
                    tenant_id = %tenant_id,
                    role = %account.role,
                    "Tenant user created"
                );
                Ok(account)
            })
            .await
    }

    /// Takes effect at the user's next login; live sessions keep their role.
    pub async fn change_role(
        &self,
        actor: &Identity,
        tenant_id: &str,
        user_id: &str,
        role: Role,
        meta: &RequestMeta,
    ) -> Result<Account, ServiceError> {
        let resource =
            ResourceRef::in_tenant(ResourceKind::User, Some(user_id.to_string()), tenant_id);
        let entry = admin_action(
            actor,
            AdminAction::PermissionsChanged,
            Some(user_id),
            Some(json!({ "role": role })),
        )
        .request(meta);

        self.guard
            .run(Some(actor), AccessAction::ManageUsers, &resource, entry, move || async move {
                reject_platform_role(role)?;
                let mut account = self.tenant_account(tenant_id, user_id).await?;
                self.repository.update_role(user_id, role).await?;
                account.role = role;
                Ok(account)
            })
            .await
    }

    pub async fn deactivate(
        &self,
        actor: &Identity,
        tenant_id: &str,
        user_id: &str,
        meta: &RequestMeta,
    ) -> Result<(), ServiceError> {
        let resource =
            ResourceRef::in_tenant(ResourceKind::User, Some(user_id.to_string()), tenant_id);
        let entry = admin_action(actor, AdminAction::UserDeactivated, Some(user_id), None)
            .request(meta);

        self.guard
            .run(Some(actor), AccessAction::ManageUsers, &resource, entry, move || async move {
                self.tenant_account(tenant_id, user_id).await?;
                self.repository.deactivate(user_id).await
            })
            .await
    }
}
