//! Session handlers: login, logout, session lookup and password management.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::auth::{
        ChangePasswordRequest, LoginRequest, MessageResponse, SessionResponse, StrengthRequest,
        StrengthResponse,
    },
    middleware::{AuthIdentity, MaybeIdentity},
    models::{Identity, RequestMeta},
    services::validate_strength,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    meta: RequestMeta,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let password = Password::new(req.password);
    let outcome = state.auth.login(&req.username, &password, &meta).await?;

    let jar = jar.add(state.session_cookie.issue(outcome.session.token));
    Ok((
        jar,
        Json(SessionResponse {
            identity: outcome.identity,
            expires_at: outcome.session.expires_at,
        }),
    ))
}

/// Invalidate the current session
///
/// Succeeds with or without a live session.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    meta: RequestMeta,
    MaybeIdentity(identity): MaybeIdentity,
    jar: CookieJar,
) -> impl IntoResponse {
    let token = state.session_cookie.token(&jar).map(str::to_string);
    state
        .auth
        .logout(identity.as_ref(), token.as_deref(), &meta)
        .await;

    let jar = jar.remove(state.session_cookie.removal());
    (
        jar,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// Identity behind the current session
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Active session", body = Identity),
        (status = 401, description = "No session", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn current_session(AuthIdentity(identity): AuthIdentity) -> Json<Identity> {
    Json(identity)
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password too weak", body = ErrorResponse),
        (status = 401, description = "Current password incorrect", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn change_password(
    State(state): State<AppState>,
    meta: RequestMeta,
    AuthIdentity(identity): AuthIdentity,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current = Password::new(req.current_password);
    let new = Password::new(req.new_password);
    state
        .auth
        .change_password(&identity, &current, &new, &meta)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password changed".to_string(),
        }),
    ))
}

/// Rate a candidate password against the strength rules
#[utoipa::path(
    post,
    path = "/auth/password/strength",
    request_body = StrengthRequest,
    responses(
        (status = 200, description = "Strength report", body = StrengthResponse)
    ),
    tag = "Authentication"
)]
pub async fn password_strength(Json(req): Json<StrengthRequest>) -> Json<StrengthResponse> {
    Json(validate_strength(&req.password).into())
}
