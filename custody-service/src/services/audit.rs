//! Audit logger for the chain-of-custody trail.
//!
//! `record` is awaited by callers but never fails: an entry the store cannot
//! take is written to the `audit_recovery` log target in full, so it can be
//! replayed by hand, and counted in `audit_write_failures_total`.
//!
//! The shape helpers (`auth_attempt`, `evidence_access`, ...) fix the action,
//! resource type and severity for each kind of event so that call sites
//! cannot drift from one another.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

use super::audit_store::AuditStore;
use super::error::ServiceError;
use super::metrics;
use crate::models::{
    AccessAction, AuditAction, AuditLogEntry, AuditLogInput, Identity, RequestMeta, ResourceKind,
    ResourceRef,
};

pub const RECOVERY_TARGET: &str = "audit_recovery";
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why an entry did not reach the store. Never leaves this module.
#[derive(Debug, Error)]
enum AuditWriteError {
    #[error("audit store rejected entry: {0}")]
    Store(#[from] ServiceError),

    #[error("audit write timed out after {0:?}")]
    Timeout(Duration),
}

impl AuditWriteError {
    fn reason(&self) -> &'static str {
        match self {
            AuditWriteError::Store(_) => "store_error",
            AuditWriteError::Timeout(_) => "timeout",
        }
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone, Copy)]
pub enum AuditActor<'a> {
    Identity(&'a Identity),
    /// Unauthenticated caller known only by the name they supplied.
    Anonymous(&'a str),
}

impl AuditActor<'_> {
    fn attribute(self, input: AuditLogInput) -> AuditLogInput {
        match self {
            AuditActor::Identity(identity) => input.actor(identity),
            AuditActor::Anonymous(username) => input.anonymous(username),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceAction {
    Viewed,
    Uploaded,
    Downloaded,
    Modified,
    Deleted,
}

impl EvidenceAction {
    pub fn audit_action(self) -> AuditAction {
        match self {
            EvidenceAction::Viewed => AuditAction::EvidenceViewed,
            EvidenceAction::Uploaded => AuditAction::EvidenceUploaded,
            EvidenceAction::Downloaded => AuditAction::EvidenceDownloaded,
            EvidenceAction::Modified => AuditAction::EvidenceModified,
            EvidenceAction::Deleted => AuditAction::EvidenceDeleted,
        }
    }

    pub fn access_action(self) -> AccessAction {
        match self {
            EvidenceAction::Viewed | EvidenceAction::Downloaded => AccessAction::Read,
            EvidenceAction::Uploaded => AccessAction::Create,
            EvidenceAction::Modified => AccessAction::Update,
            EvidenceAction::Deleted => AccessAction::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    Created,
    Modified,
    Deleted,
}

impl MutationAction {
    pub fn access_action(self) -> AccessAction {
        match self {
            MutationAction::Created => AccessAction::Create,
            MutationAction::Modified => AccessAction::Update,
            MutationAction::Deleted => AccessAction::Delete,
        }
    }
}

/// Record types whose mutations are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MutationTarget {
    Item,
    Case,
    User,
}

impl MutationTarget {
    pub fn kind(self) -> ResourceKind {
        match self {
            MutationTarget::Item => ResourceKind::Item,
            MutationTarget::Case => ResourceKind::Case,
            MutationTarget::User => ResourceKind::User,
        }
    }

    /// Cases are closed rather than deleted, users deactivated.
    pub fn audit_action(self, action: MutationAction) -> AuditAction {
        match (self, action) {
            (MutationTarget::Item, MutationAction::Created) => AuditAction::ItemCreated,
            (MutationTarget::Item, MutationAction::Modified) => AuditAction::ItemModified,
            (MutationTarget::Item, MutationAction::Deleted) => AuditAction::ItemDeleted,
            (MutationTarget::Case, MutationAction::Created) => AuditAction::CaseCreated,
            (MutationTarget::Case, MutationAction::Modified) => AuditAction::CaseModified,
            (MutationTarget::Case, MutationAction::Deleted) => AuditAction::CaseClosed,
            (MutationTarget::User, MutationAction::Created) => AuditAction::UserCreated,
            (MutationTarget::User, MutationAction::Modified) => AuditAction::UserModified,
            (MutationTarget::User, MutationAction::Deleted) => AuditAction::UserDeactivated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    UserCreated,
    UserModified,
    UserDeactivated,
    PermissionsChanged,
    TenantAccessed,
}

impl AdminAction {
    pub fn audit_action(self) -> AuditAction {
        match self {
            AdminAction::UserCreated => AuditAction::UserCreated,
            AdminAction::UserModified => AuditAction::UserModified,
            AdminAction::UserDeactivated => AuditAction::UserDeactivated,
            AdminAction::PermissionsChanged => AuditAction::PermissionsChanged,
            AdminAction::TenantAccessed => AuditAction::TenantAccessed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExportAction {
    ReportGenerated,
    DataExported,
    AuditLogViewed,
}

impl ExportAction {
    pub fn audit_action(self) -> AuditAction {
        match self {
            ExportAction::ReportGenerated => AuditAction::ReportGenerated,
            ExportAction::DataExported => AuditAction::DataExported,
            ExportAction::AuditLogViewed => AuditAction::AuditLogViewed,
        }
    }
}

/// Severity of every entry built here comes from
/// [`AuditAction::conventional_severity`].
fn shaped(action: AuditAction) -> AuditLogInput {
    AuditLogInput::new(action).severity(action.conventional_severity())
}

/// Login attempt: `info` on success, `warning` on failure.
pub fn auth_attempt(actor: AuditActor<'_>, success: bool, reason: Option<&str>) -> AuditLogInput {
    let action = if success {
        AuditAction::Login
    } else {
        AuditAction::LoginFailed
    };

    let mut input = actor
        .attribute(shaped(action))
        .resource(ResourceKind::User.as_str(), None)
        .success(success);
    if let Some(reason) = reason {
        input = input.detail("reason", reason);
    }
    input
}

/// Evidence access: `warning` for deletion, else `info`.
pub fn evidence_access(
    actor: &Identity,
    action: EvidenceAction,
    evidence: &ResourceRef,
) -> AuditLogInput {
    shaped(action.audit_action())
        .actor(actor)
        .resource_ref(evidence)
        .resource(ResourceKind::Evidence.as_str(), evidence.id.clone())
}

/// Record mutation with optional before/after snapshots. Deleting an item
/// or closing a case is `warning`; user mutations are administrative.
pub fn resource_mutation(
    actor: &Identity,
    target: MutationTarget,
    action: MutationAction,
    resource: &ResourceRef,
    before: Option<Value>,
    after: Option<Value>,
) -> AuditLogInput {
    let mut input = shaped(target.audit_action(action))
        .actor(actor)
        .resource_ref(resource)
        .resource(target.kind().as_str(), resource.id.clone());
    if let Some(before) = before {
        input = input.detail("before", before);
    }
    if let Some(after) = after {
        input = input.detail("after", after);
    }
    input
}

/// Administrative action, always `warning`.
pub fn admin_action(
    actor: &Identity,
    action: AdminAction,
    target_identity: Option<&str>,
    details: Option<Value>,
) -> AuditLogInput {
    let kind = match action {
        AdminAction::TenantAccessed => ResourceKind::Tenant,
        _ => ResourceKind::User,
    };
    let mut input = shaped(action.audit_action())
        .actor(actor)
        .resource(kind.as_str(), target_identity.map(str::to_string));
    if let Some(details) = details {
        input = input.details(details);
    }
    input
}

/// Export or report access, always `info`.
pub fn export(
    actor: &Identity,
    action: ExportAction,
    export_type: &str,
    record_count: Option<usize>,
) -> AuditLogInput {
    let mut input = shaped(action.audit_action())
        .actor(actor)
        .resource(export_type, None)
        .detail("exportType", export_type);
    if let Some(count) = record_count {
        input = input.detail("recordCount", count);
    }
    input
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
    write_timeout: Duration,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>, write_timeout: Duration) -> Self {
        Self {
            store,
            write_timeout,
        }
    }

    /// Append one entry. Never fails; see the module docs for what happens
    /// when the store is unavailable.
    pub async fn record(&self, input: AuditLogInput) {
        self.commit(input.into_entry()).await
    }

    async fn commit(&self, entry: AuditLogEntry) {
        if let Err(e) = self.write(&entry).await {
            escalate(&entry, &e);
        }
    }

    async fn write(&self, entry: &AuditLogEntry) -> Result<(), AuditWriteError> {
        tokio::time::timeout(self.write_timeout, self.store.append(entry))
            .await
            .map_err(|_| AuditWriteError::Timeout(self.write_timeout))??;

        tracing::debug!(
            audit_id = %entry.id,
            action = entry.action.as_str(),
            success = entry.success,
            "Audit entry recorded"
        );
        Ok(())
    }

    pub async fn record_auth_attempt(
        &self,
        actor: AuditActor<'_>,
        success: bool,
        reason: Option<&str>,
        meta: &RequestMeta,
    ) {
        self.record(auth_attempt(actor, success, reason).request(meta))
            .await
    }

    pub async fn record_evidence_access(
        &self,
        actor: &Identity,
        action: EvidenceAction,
        evidence: &ResourceRef,
        meta: &RequestMeta,
    ) {
        self.record(evidence_access(actor, action, evidence).request(meta))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record_resource_mutation(
        &self,
        actor: &Identity,
        target: MutationTarget,
        action: MutationAction,
        resource: &ResourceRef,
        before: Option<Value>,
        after: Option<Value>,
        meta: &RequestMeta,
    ) {
        let input = resource_mutation(actor, target, action, resource, before, after);
        self.record(input.request(meta)).await
    }
}

/// Secondary channel for entries the store did not accept.
fn escalate(entry: &AuditLogEntry, error: &AuditWriteError) {
    let payload = serde_json::to_string(entry)
        .unwrap_or_else(|e| json!({ "id": entry.id, "serializationError": e.to_string() }).to_string());

    tracing::error!(
        target: RECOVERY_TARGET,
        error = %error,
        audit_id = %entry.id,
        action = entry.action.as_str(),
        entry = %payload,
        "Audit entry could not be persisted"
    );
    metrics::inc_audit_write_failure(error.reason());
}
