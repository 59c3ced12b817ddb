//! Read side of the audit trail for compliance review.

use std::sync::Arc;

use super::audit_store::AuditStore;
use super::error::ServiceError;
use crate::models::{AuditFilter, AuditLogEntry, AuditStats, AuditStatsQuery, Identity};

#[derive(Clone)]
pub struct AuditQuery {
    store: Arc<dyn AuditStore>,
}

impl AuditQuery {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Newest first, at most `limit` entries (default 100, max 1000).
    pub async fn find(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, ServiceError> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(ServiceError::Validation(
                    "startDate must not be after endDate".to_string(),
                ));
            }
        }
        self.store.query(filter).await
    }

    pub async fn get_stats(&self, query: &AuditStatsQuery) -> Result<AuditStats, ServiceError> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                return Err(ServiceError::Validation(
                    "startDate must not be after endDate".to_string(),
                ));
            }
        }
        self.store.stats(query).await
    }

    /// `find` confined to the viewer's tenant when the viewer has one.
    pub async fn find_for(
        &self,
        viewer: &Identity,
        mut filter: AuditFilter,
    ) -> Result<Vec<AuditLogEntry>, ServiceError> {
        if let Some(tenant_id) = viewer.tenant_id() {
            filter.tenant_id = Some(tenant_id.to_string());
        }
        self.find(&filter).await
    }

    /// `get_stats` confined to the viewer's tenant when the viewer has one.
    pub async fn get_stats_for(
        &self,
        viewer: &Identity,
        mut query: AuditStatsQuery,
    ) -> Result<AuditStats, ServiceError> {
        if let Some(tenant_id) = viewer.tenant_id() {
            query.tenant_id = Some(tenant_id.to_string());
        }
        self.get_stats(&query).await
    }
}
