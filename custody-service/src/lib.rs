pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::config::CustodyConfig;
use crate::middleware::{metrics_middleware, session_middleware, SessionCookie};
use crate::services::{
    AccessGuard, AuditLogger, AuditQuery, AuditStore, AuthService, IdentityRepository,
    PasswordService, ServiceError, SessionRevocationList, SessionStore, TenantUserService,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::current_session,
        handlers::auth::change_password,
        handlers::auth::password_strength,
        handlers::tenant_users::invite_user,
        handlers::tenant_users::change_user_role,
        handlers::tenant_users::deactivate_user,
        handlers::audit::list_audit_logs,
        handlers::audit::audit_stats,
        handlers::audit::record_custody_event,
        handlers::authz::evaluate,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::LoginRequest,
            dtos::auth::SessionResponse,
            dtos::auth::ChangePasswordRequest,
            dtos::auth::StrengthRequest,
            dtos::auth::StrengthResponse,
            dtos::auth::MessageResponse,
            dtos::tenant_users::InviteUserRequest,
            dtos::tenant_users::ChangeRoleRequest,
            dtos::audit::AuditLogPage,
            dtos::audit::CustodyEvent,
            services::audit::EvidenceAction,
            services::audit::MutationAction,
            services::audit::MutationTarget,
            handlers::authz::EvaluateRequest,
            handlers::authz::EvaluateResponse,
            models::Identity,
            models::Role,
            models::Permission,
            models::AccountResponse,
            models::AccessAction,
            models::ResourceKind,
            models::ResourceRef,
            models::AuditAction,
            models::AuditLogEntry,
            models::AuditStats,
            models::Severity,
            services::StrengthRating,
        )
    ),
    tags(
        (name = "Authentication", description = "Sessions and credentials"),
        (name = "Tenant Users", description = "User administration within a tenant"),
        (name = "Audit", description = "Chain-of-custody audit trail"),
        (name = "Authorization", description = "Access decisions"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

/// Storage the service runs against.
#[derive(Clone)]
pub struct Backends {
    pub identities: Arc<dyn IdentityRepository>,
    pub audit: Arc<dyn AuditStore>,
    pub revocations: Arc<dyn SessionRevocationList>,
    /// Absent when running on in-memory stores.
    pub db: Option<PgPool>,
}

#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub service_version: String,
    pub allowed_origins: Vec<String>,
    pub session_cookie: SessionCookie,
    pub auth: AuthService,
    pub tenant_users: TenantUserService,
    pub audit_query: AuditQuery,
    pub guard: AccessGuard,
    pub revocations: Arc<dyn SessionRevocationList>,
    pub db: Option<PgPool>,
    pub login_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(config: &CustodyConfig, backends: Backends) -> Result<Self, ServiceError> {
        let sessions = SessionStore::new(
            &config.session.secret,
            config.session.ttl_days,
            backends.revocations.clone(),
        )?;
        let logger = AuditLogger::new(
            backends.audit.clone(),
            Duration::from_millis(config.audit.write_timeout_ms),
        );
        let passwords = PasswordService::new(backends.identities.clone());
        let guard = AccessGuard::new(logger.clone());

        Ok(Self {
            service_name: config.service_name.clone(),
            service_version: config.service_version.clone(),
            allowed_origins: config.security.allowed_origins.clone(),
            session_cookie: SessionCookie::from_config(&config.session),
            auth: AuthService::new(
                backends.identities.clone(),
                passwords.clone(),
                sessions,
                logger,
            ),
            tenant_users: TenantUserService::new(backends.identities, passwords, guard.clone()),
            audit_query: AuditQuery::new(backends.audit),
            guard,
            revocations: backends.revocations,
            db: backends.db,
            login_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            ip_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.global_ip_limit,
                config.rate_limit.global_ip_window_seconds,
            ),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let session_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/session", get(handlers::auth::current_session))
        .route("/auth/password", post(handlers::auth::change_password))
        .route("/tenants/:tenant_id/users", post(handlers::invite_user))
        .route(
            "/tenants/:tenant_id/users/:user_id/role",
            patch(handlers::change_user_role),
        )
        .route(
            "/tenants/:tenant_id/users/:user_id",
            delete(handlers::deactivate_user),
        )
        .route("/audit/logs", get(handlers::list_audit_logs))
        .route("/audit/stats", get(handlers::audit_stats))
        .route("/audit/events", post(handlers::record_custody_event))
        .route("/authz/evaluate", post(handlers::evaluate))
        .layer(from_fn_with_state(state.clone(), session_middleware));

    let origins: Vec<HeaderValue> = state
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route(
            "/auth/password/strength",
            post(handlers::auth::password_strength),
        )
        .merge(login_route)
        .merge(session_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_credentials(true)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static(REQUEST_ID_HEADER),
                ]),
        )
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "A dependency is down")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let postgres = match &state.db {
        Some(pool) => {
            db::health_check(pool).await.map_err(|e| {
                tracing::error!(error = %e, "PostgreSQL health check failed");
                AppError::from(e)
            })?;
            "up"
        }
        None => "in_memory",
    };

    state.revocations.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Revocation list health check failed");
        AppError::InternalError(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.service_name,
        "version": state.service_version,
        "checks": {
            "postgres": postgres,
            "revocation_list": "up"
        }
    })))
}
