//! Persistent storage for audit entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow};
use std::sync::Mutex;
use uuid::Uuid;

use super::error::ServiceError;
use crate::models::{AuditFilter, AuditLogEntry, AuditStats, AuditStatsQuery};

/// Append-only audit storage. There is deliberately no update or delete.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), ServiceError>;
    /// Matching entries, newest first, at most `filter.effective_limit()`.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, ServiceError>;
    async fn stats(&self, query: &AuditStatsQuery) -> Result<AuditStats, ServiceError>;
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    user_id: Option<String>,
    username: Option<String>,
    tenant_id: Option<String>,
    action: String,
    resource: Option<String>,
    resource_type: Option<String>,
    details: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    success: bool,
    severity: String,
    created_utc: DateTime<Utc>,
}

impl TryFrom<AuditLogRow> for AuditLogEntry {
    type Error = ServiceError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        Ok(AuditLogEntry {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            tenant_id: row.tenant_id,
            action: row.action.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            resource: row.resource,
            resource_type: row.resource_type,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            success: row.success,
            severity: row.severity.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            timestamp: row.created_utc,
        })
    }
}

#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, user_id, username, tenant_id, action, resource, resource_type, details, ip_address, user_agent, success, severity, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(&entry.username)
        .bind(&entry.tenant_id)
        .bind(entry.action.as_str())
        .bind(&entry.resource)
        .bind(&entry.resource_type)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.success)
        .bind(entry.severity.as_str())
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, ServiceError> {
        // Build dynamic WHERE clause
        let mut conditions = vec!["TRUE".to_string()];
        let mut param_idx = 1;

        if filter.user_id.is_some() {
            conditions.push(format!("user_id = ${}", param_idx));
            param_idx += 1;
        }
        if filter.tenant_id.is_some() {
            conditions.push(format!("tenant_id = ${}", param_idx));
            param_idx += 1;
        }
        if filter.action.is_some() {
            conditions.push(format!("action = ${}", param_idx));
            param_idx += 1;
        }
        if filter.resource.is_some() {
            conditions.push(format!("resource = ${}", param_idx));
            param_idx += 1;
        }
        if filter.resource_type.is_some() {
            conditions.push(format!("resource_type = ${}", param_idx));
            param_idx += 1;
        }
        if filter.success.is_some() {
            conditions.push(format!("success = ${}", param_idx));
            param_idx += 1;
        }
        if filter.start_date.is_some() {
            conditions.push(format!("created_utc >= ${}", param_idx));
            param_idx += 1;
        }
        if filter.end_date.is_some() {
            conditions.push(format!("created_utc <= ${}", param_idx));
            param_idx += 1;
        }

        let data_query = format!(
            "SELECT * FROM audit_log WHERE {} ORDER BY created_utc DESC LIMIT ${}",
            conditions.join(" AND "),
            param_idx
        );

        let mut data_q = sqlx::query_as::<_, AuditLogRow>(&data_query);
        if let Some(user_id) = &filter.user_id {
            data_q = data_q.bind(user_id);
        }
        if let Some(tenant_id) = &filter.tenant_id {
            data_q = data_q.bind(tenant_id);
        }
        if let Some(action) = filter.action {
            data_q = data_q.bind(action.as_str());
        }
        if let Some(resource) = &filter.resource {
            data_q = data_q.bind(resource);
        }
        if let Some(resource_type) = &filter.resource_type {
            data_q = data_q.bind(resource_type);
        }
        if let Some(success) = filter.success {
            data_q = data_q.bind(success);
        }
        if let Some(from) = filter.start_date {
            data_q = data_q.bind(from);
        }
        if let Some(to) = filter.end_date {
            data_q = data_q.bind(to);
        }

        let rows = data_q
            .bind(filter.effective_limit())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }

    async fn stats(&self, query: &AuditStatsQuery) -> Result<AuditStats, ServiceError> {
        let mut conditions = vec!["TRUE".to_string()];
        let mut param_idx = 1;

        if query.tenant_id.is_some() {
            conditions.push(format!("tenant_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.start_date.is_some() {
            conditions.push(format!("created_utc >= ${}", param_idx));
            param_idx += 1;
        }
        if query.end_date.is_some() {
            conditions.push(format!("created_utc <= ${}", param_idx));
        }

        let stats_query = format!(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE NOT success),
                COUNT(*) FILTER (WHERE action LIKE 'evidence\_%'),
                COUNT(*) FILTER (WHERE severity = 'critical')
            FROM audit_log WHERE {}
            "#,
            conditions.join(" AND ")
        );

        let mut stats_q = sqlx::query_as::<_, (i64, i64, i64, i64)>(&stats_query);
        if let Some(tenant_id) = &query.tenant_id {
            stats_q = stats_q.bind(tenant_id);
        }
        if let Some(from) = query.start_date {
            stats_q = stats_q.bind(from);
        }
        if let Some(to) = query.end_date {
            stats_q = stats_q.bind(to);
        }

        let (total_entries, failed_attempts, evidence_actions, critical_events) =
            stats_q.fetch_one(&self.pool).await?;

        Ok(AuditStats {
            total_entries,
            failed_attempts,
            evidence_actions,
            critical_events,
        })
    }
}

/// In-memory audit store for tests and local runs.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: Mutex<Vec<AuditLogEntry>>,
    unavailable: bool,
    reads_unavailable: bool,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes and reads always fail.
    pub fn unavailable() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            unavailable: true,
            reads_unavailable: true,
        }
    }

    /// A store that accepts writes but fails every query.
    pub fn failing_reads() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            unavailable: false,
            reads_unavailable: true,
        }
    }

    /// Every stored entry in insertion order.
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<AuditLogEntry>>, ServiceError> {
        if self.unavailable {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Audit store unavailable"
            )));
        }
        self.entries
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Audit store mutex poisoned: {}", e)))
    }

    fn read_lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<AuditLogEntry>>, ServiceError> {
        if self.reads_unavailable {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Audit store unavailable for reads"
            )));
        }
        self.lock()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), ServiceError> {
        self.lock()?.push(entry.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, ServiceError> {
        let entries = self.read_lock()?;
        let mut matched: Vec<AuditLogEntry> = entries
            .iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        // Stable sort keeps later inserts first among equal timestamps
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(filter.effective_limit() as usize);
        Ok(matched)
    }

    async fn stats(&self, query: &AuditStatsQuery) -> Result<AuditStats, ServiceError> {
        let entries = self.read_lock()?;
        let mut stats = AuditStats::default();
        for entry in entries.iter().filter(|entry| query.matches(entry)) {
            stats.accumulate(entry);
        }
        Ok(stats)
    }
}
