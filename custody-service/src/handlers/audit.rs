//! Audit trail handlers.
//!
//! Reading the trail is itself an auditable event: every query is recorded
//! as `audit_log_viewed` with its outcome, and a refused one as a denial.
//! Custody events performed elsewhere are reported through `/audit/events`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::audit::{AuditLogPage, AuditLogQueryParams, AuditStatsParams, CustodyEvent},
    middleware::AuthIdentity,
    models::{
        AccessAction, AuditFilter, AuditStats, AuditStatsQuery, Identity, RequestMeta,
        ResourceKind, ResourceRef,
    },
    services::audit::{evidence_access, export, resource_mutation, ExportAction},
    AppState,
};

/// Audit log scope the viewer asks to read.
///
/// Tenant-bound viewers are always pinned to their own tenant; platform
/// viewers target the requested tenant, or the whole platform.
fn audit_scope(viewer: &Identity, requested_tenant: Option<&str>) -> ResourceRef {
    match viewer.tenant_id().or(requested_tenant) {
        Some(tenant_id) => ResourceRef::in_tenant(ResourceKind::AuditLog, None, tenant_id),
        None => ResourceRef::platform(ResourceKind::AuditLog, None),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Query audit entries, newest first
#[utoipa::path(
    get,
    path = "/audit/logs",
    params(AuditLogQueryParams),
    responses(
        (status = 200, description = "Matching audit entries", body = AuditLogPage),
        (status = 400, description = "Invalid date range", body = ErrorResponse),
        (status = 401, description = "No session", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse)
    ),
    tag = "Audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    meta: RequestMeta,
    AuthIdentity(viewer): AuthIdentity,
    Query(params): Query<AuditLogQueryParams>,
) -> Result<Json<AuditLogPage>, AppError> {
    let resource = audit_scope(&viewer, params.tenant_id.as_deref());
    let attempt = export(&viewer, ExportAction::AuditLogViewed, "audit_log", None).request(&meta);
    state
        .guard
        .authorize(Some(&viewer), AccessAction::ViewAudit, &resource, attempt.clone())
        .await?;

    let result = state
        .audit_query
        .find_for(&viewer, AuditFilter::from(params))
        .await;

    let entry = match &result {
        Ok(entries) => attempt.detail("recordCount", entries.len()),
        Err(_) => attempt,
    };
    state
        .guard
        .record_outcome(Some(&viewer), &resource, entry, &result)
        .await;

    let entries = result?;
    Ok(Json(AuditLogPage {
        count: entries.len(),
        entries,
    }))
}

/// Aggregate counts over the audit trail
#[utoipa::path(
    get,
    path = "/audit/stats",
    params(AuditStatsParams),
    responses(
        (status = 200, description = "Audit statistics", body = AuditStats),
        (status = 400, description = "Invalid date range", body = ErrorResponse),
        (status = 401, description = "No session", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse)
    ),
    tag = "Audit"
)]
pub async fn audit_stats(
    State(state): State<AppState>,
    meta: RequestMeta,
    AuthIdentity(viewer): AuthIdentity,
    Query(params): Query<AuditStatsParams>,
) -> Result<Json<AuditStats>, AppError> {
    let resource = audit_scope(&viewer, params.tenant_id.as_deref());
    let attempt = export(&viewer, ExportAction::AuditLogViewed, "audit_stats", None).request(&meta);
    state
        .guard
        .authorize(Some(&viewer), AccessAction::ViewAudit, &resource, attempt.clone())
        .await?;

    let result = state
        .audit_query
        .get_stats_for(&viewer, AuditStatsQuery::from(params))
        .await;
    state
        .guard
        .record_outcome(Some(&viewer), &resource, attempt, &result)
        .await;

    Ok(Json(result?))
}

/// Record an evidence access or record mutation performed by the caller
#[utoipa::path(
    post,
    path = "/audit/events",
    request_body = CustodyEvent,
    responses(
        (status = 204, description = "Event recorded"),
        (status = 400, description = "Resource kind does not match the event", body = ErrorResponse),
        (status = 401, description = "No session", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse)
    ),
    tag = "Audit"
)]
pub async fn record_custody_event(
    State(state): State<AppState>,
    meta: RequestMeta,
    AuthIdentity(actor): AuthIdentity,
    Json(event): Json<CustodyEvent>,
) -> Result<StatusCode, AppError> {
    let resource = event.resource().clone();
    if resource.kind != event.expected_kind() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Resource kind {} does not match a {} event",
            resource.kind.as_str(),
            event.expected_kind().as_str()
        )));
    }

    let attempt = match &event {
        CustodyEvent::Evidence { action, resource } => evidence_access(&actor, *action, resource),
        CustodyEvent::Mutation {
            target,
            action,
            resource,
            ..
        } => resource_mutation(&actor, *target, *action, resource, None, None),
    };
    state
        .guard
        .authorize(
            Some(&actor),
            event.access_action(),
            &resource,
            attempt.request(&meta),
        )
        .await?;

    let logger = state.guard.logger();
    match event {
        CustodyEvent::Evidence { action, resource } => {
            logger
                .record_evidence_access(&actor, action, &resource, &meta)
                .await
        }
        CustodyEvent::Mutation {
            target,
            action,
            resource,
            before,
            after,
        } => {
            logger
                .record_resource_mutation(&actor, target, action, &resource, before, after, &meta)
                .await
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
