//! Tenant user administration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::tenant_users::{ChangeRoleRequest, InviteUserRequest},
    middleware::AuthIdentity,
    models::{AccountResponse, RequestMeta},
    services::NewTenantUser,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Create a user inside a tenant
#[utoipa::path(
    post,
    path = "/tenants/{tenant_id}/users",
    params(("tenant_id" = String, Path, description = "Tenant the user joins")),
    request_body = InviteUserRequest,
    responses(
        (status = 201, description = "User created", body = AccountResponse),
        (status = 400, description = "Weak password or platform role", body = ErrorResponse),
        (status = 401, description = "No session", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse)
    ),
    tag = "Tenant Users"
)]
pub async fn invite_user(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    meta: RequestMeta,
    AuthIdentity(actor): AuthIdentity,
    ValidatedJson(req): ValidatedJson<InviteUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = NewTenantUser {
        username: req.username,
        email: req.email,
        display_name: req.display_name,
        role: req.role,
        initial_password: Password::new(req.initial_password),
    };
    let account = state
        .tenant_users
        .invite(&actor, &tenant_id, user, &meta)
        .await?;

    Ok((StatusCode::CREATED, Json(account.sanitized())))
}

/// Change a tenant user's role
///
/// Applies from the user's next login.
#[utoipa::path(
    patch,
    path = "/tenants/{tenant_id}/users/{user_id}/role",
    params(
        ("tenant_id" = String, Path, description = "Tenant of the user"),
        ("user_id" = String, Path, description = "User to update")
    ),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = AccountResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Tenant Users"
)]
pub async fn change_user_role(
    State(state): State<AppState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    meta: RequestMeta,
    AuthIdentity(actor): AuthIdentity,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state
        .tenant_users
        .change_role(&actor, &tenant_id, &user_id, req.role, &meta)
        .await?;
    Ok(Json(account.sanitized()))
}

/// Deactivate a tenant user
#[utoipa::path(
    delete,
    path = "/tenants/{tenant_id}/users/{user_id}",
    params(
        ("tenant_id" = String, Path, description = "Tenant of the user"),
        ("user_id" = String, Path, description = "User to deactivate")
    ),
    responses(
        (status = 204, description = "User deactivated"),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Tenant Users"
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    meta: RequestMeta,
    AuthIdentity(actor): AuthIdentity,
) -> Result<StatusCode, AppError> {
    state
        .tenant_users
        .deactivate(&actor, &tenant_id, &user_id, &meta)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
