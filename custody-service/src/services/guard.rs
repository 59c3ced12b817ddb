//! The one place where access decisions meet the audit trail.
//!
//! Every guarded call site goes through [`AccessGuard`]: a denial always
//! produces exactly one `success = false` entry before `Forbidden` is
//! returned, and a permitted operation is recorded with its outcome.

use serde_json::Value;
use std::future::Future;

use super::audit::AuditLogger;
use super::authorization::{AuthorizationPolicy, Decision};
use super::error::ServiceError;
use super::metrics;
use crate::models::{AccessAction, AuditLogInput, Identity, ResourceRef};

#[derive(Clone)]
pub struct AccessGuard {
    logger: AuditLogger,
}

impl AccessGuard {
    pub fn new(logger: AuditLogger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &AuditLogger {
        &self.logger
    }

    /// Check access; on denial record `entry` as a failure and return `Forbidden`.
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        action: AccessAction,
        resource: &ResourceRef,
        entry: AuditLogInput,
    ) -> Result<(), ServiceError> {
        let reason = match AuthorizationPolicy::evaluate(identity, action, resource) {
            Decision::Permit => return Ok(()),
            Decision::Deny(reason) => reason,
        };

        tracing::warn!(
            user_id = identity.map(Identity::id).unwrap_or("anonymous"),
            action = action.as_str(),
            resource_type = resource.kind.as_str(),
            resource_tenant = resource.tenant_id.as_deref().unwrap_or("platform"),
            ?reason,
            "Access denied"
        );
        metrics::inc_access_denied(action.as_str());

        let entry = prepare(entry, identity, resource)
            .detail(
                "denyReason",
                serde_json::to_value(reason).unwrap_or(Value::Null),
            )
            .denied();
        self.logger.record(entry).await;

        Err(ServiceError::Forbidden)
    }

    /// Authorize, run `op`, then record its outcome. `op` is never started
    /// when access is denied.
    pub async fn run<T, F, Fut>(
        &self,
        identity: Option<&Identity>,
        action: AccessAction,
        resource: &ResourceRef,
        entry: AuditLogInput,
        op: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.authorize(identity, action, resource, entry.clone())
            .await?;

        let result = op().await;
        self.record_outcome(identity, resource, entry, &result).await;
        result
    }

    /// Record the outcome of an operation that already passed
    /// [`authorize`](Self::authorize). A failure is recorded with
    /// `success = false` and the error text.
    pub async fn record_outcome<T>(
        &self,
        identity: Option<&Identity>,
        resource: &ResourceRef,
        entry: AuditLogInput,
        result: &Result<T, ServiceError>,
    ) {
        let mut outcome = prepare(entry, identity, resource).outcome(result.is_ok());
        if let Err(e) = result {
            outcome = outcome.detail("error", e.to_string());
        }
        self.logger.record(outcome).await;
    }
}

/// Fill attribution, target and severity the caller left unset.
fn prepare(
    mut entry: AuditLogInput,
    identity: Option<&Identity>,
    resource: &ResourceRef,
) -> AuditLogInput {
    if entry.user_id.is_none() && entry.username.is_none() {
        if let Some(identity) = identity {
            entry = entry.actor(identity);
        }
    }
    if entry.resource_type.is_none() {
        entry = entry.resource_ref(resource);
    } else if entry.resource_tenant_id.is_none() {
        entry.resource_tenant_id = resource.tenant_id.clone();
    }
    if entry.severity.is_none() {
        let severity = entry.action.conventional_severity();
        entry = entry.severity(severity);
    }
    entry
}
