use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::models::{
    AccessAction, AuditAction, AuditFilter, AuditLogEntry, AuditStatsQuery, ResourceKind,
    ResourceRef,
};
use crate::services::audit::{EvidenceAction, MutationAction, MutationTarget};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditLogQueryParams {
    pub user_id: Option<String>,
    /// Ignored for tenant-bound viewers.
    pub tenant_id: Option<String>,
    #[param(value_type = Option<String>, example = "evidence_viewed")]
    pub action: Option<AuditAction>,
    pub resource: Option<String>,
    pub resource_type: Option<String>,
    pub success: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Defaults to 100, capped at 1000.
    pub limit: Option<i64>,
}

impl From<AuditLogQueryParams> for AuditFilter {
    fn from(p: AuditLogQueryParams) -> Self {
        Self {
            user_id: p.user_id,
            tenant_id: p.tenant_id,
            action: p.action,
            resource: p.resource,
            resource_type: p.resource_type,
            success: p.success,
            start_date: p.start_date,
            end_date: p.end_date,
            limit: p.limit,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditStatsParams {
    pub tenant_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<AuditStatsParams> for AuditStatsQuery {
    fn from(p: AuditStatsParams) -> Self {
        Self {
            tenant_id: p.tenant_id,
            start_date: p.start_date,
            end_date: p.end_date,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogPage {
    pub entries: Vec<AuditLogEntry>,
    pub count: usize,
}

/// Custody event reported by the service that performed it.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustodyEvent {
    Evidence {
        action: EvidenceAction,
        resource: ResourceRef,
    },
    Mutation {
        target: MutationTarget,
        action: MutationAction,
        resource: ResourceRef,
        #[schema(value_type = Option<Object>)]
        before: Option<Value>,
        #[schema(value_type = Option<Object>)]
        after: Option<Value>,
    },
}

impl CustodyEvent {
    pub fn resource(&self) -> &ResourceRef {
        match self {
            CustodyEvent::Evidence { resource, .. } | CustodyEvent::Mutation { resource, .. } => {
                resource
            }
        }
    }

    /// Access the reporting identity must hold for the event.
    pub fn access_action(&self) -> AccessAction {
        match self {
            CustodyEvent::Evidence { action, .. } => action.access_action(),
            CustodyEvent::Mutation { action, .. } => action.access_action(),
        }
    }

    pub fn expected_kind(&self) -> ResourceKind {
        match self {
            CustodyEvent::Evidence { .. } => ResourceKind::Evidence,
            CustodyEvent::Mutation { target, .. } => target.kind(),
        }
    }
}
