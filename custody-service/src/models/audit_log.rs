//! Audit log model - the append-only chain-of-custody record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Identity, RequestMeta, ResourceRef};

/// Audited actions. Values may be added; existing ones must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    LoginFailed,
    Logout,
    PasswordReset,
    EmailVerified,
    AccountCreated,
    EvidenceViewed,
    EvidenceUploaded,
    EvidenceDownloaded,
    EvidenceModified,
    EvidenceDeleted,
    ItemCreated,
    ItemViewed,
    ItemModified,
    ItemDeleted,
    CaseCreated,
    CaseViewed,
    CaseModified,
    CaseClosed,
    UserCreated,
    UserModified,
    UserDeactivated,
    PermissionsChanged,
    TenantAccessed,
    ReportGenerated,
    DataExported,
    AuditLogViewed,
}

impl AuditAction {
    pub const ALL: [AuditAction; 27] = [
        AuditAction::Login,
        AuditAction::LoginFailed,
        AuditAction::Logout,
        AuditAction::PasswordReset,
        AuditAction::EmailVerified,
        AuditAction::AccountCreated,
        AuditAction::EvidenceViewed,
        AuditAction::EvidenceUploaded,
        AuditAction::EvidenceDownloaded,
        AuditAction::EvidenceModified,
        AuditAction::EvidenceDeleted,
        AuditAction::ItemCreated,
        AuditAction::ItemViewed,
        AuditAction::ItemModified,
        AuditAction::ItemDeleted,
        AuditAction::CaseCreated,
        AuditAction::CaseViewed,
        AuditAction::CaseModified,
        AuditAction::CaseClosed,
        AuditAction::UserCreated,
        AuditAction::UserModified,
        AuditAction::UserDeactivated,
        AuditAction::PermissionsChanged,
        AuditAction::TenantAccessed,
        AuditAction::ReportGenerated,
        AuditAction::DataExported,
        AuditAction::AuditLogViewed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::PasswordReset => "password_reset",
            AuditAction::EmailVerified => "email_verified",
            AuditAction::AccountCreated => "account_created",
            AuditAction::EvidenceViewed => "evidence_viewed",
            AuditAction::EvidenceUploaded => "evidence_uploaded",
            AuditAction::EvidenceDownloaded => "evidence_downloaded",
            AuditAction::EvidenceModified => "evidence_modified",
            AuditAction::EvidenceDeleted => "evidence_deleted",
            AuditAction::ItemCreated => "item_created",
            AuditAction::ItemViewed => "item_viewed",
            AuditAction::ItemModified => "item_modified",
            AuditAction::ItemDeleted => "item_deleted",
            AuditAction::CaseCreated => "case_created",
            AuditAction::CaseViewed => "case_viewed",
            AuditAction::CaseModified => "case_modified",
            AuditAction::CaseClosed => "case_closed",
            AuditAction::UserCreated => "user_created",
            AuditAction::UserModified => "user_modified",
            AuditAction::UserDeactivated => "user_deactivated",
            AuditAction::PermissionsChanged => "permissions_changed",
            AuditAction::TenantAccessed => "tenant_accessed",
            AuditAction::ReportGenerated => "report_generated",
            AuditAction::DataExported => "data_exported",
            AuditAction::AuditLogViewed => "audit_log_viewed",
        }
    }

    pub fn is_evidence_action(&self) -> bool {
        matches!(
            self,
            AuditAction::EvidenceViewed
                | AuditAction::EvidenceUploaded
                | AuditAction::EvidenceDownloaded
                | AuditAction::EvidenceModified
                | AuditAction::EvidenceDeleted
        )
    }

    pub fn is_admin_action(&self) -> bool {
        matches!(
            self,
            AuditAction::UserCreated
                | AuditAction::UserModified
                | AuditAction::UserDeactivated
                | AuditAction::PermissionsChanged
                | AuditAction::TenantAccessed
        )
    }

    /// Severity recorded when the action completes successfully. Every
    /// entry helper and guarded call reads it from here.
    pub fn conventional_severity(&self) -> Severity {
        match self {
            AuditAction::LoginFailed
            | AuditAction::EvidenceDeleted
            | AuditAction::ItemDeleted
            | AuditAction::CaseClosed => Severity::Warning,
            action if action.is_admin_action() => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("Invalid audit action: {}", s))
    }
}

/// Triage label attached to every entry.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

/// Immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Option<String>,
    /// Denormalized actor name, kept readable after the account is gone.
    pub username: Option<String>,
    pub tenant_id: Option<String>,
    pub action: AuditAction,
    pub resource: Option<String>,
    pub resource_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Input accepted by `AuditLogger::record`.
///
/// `success` defaults to `true` and `severity` to `info`. The entry's tenant
/// is the target resource's tenant when known, else the actor's.
#[derive(Debug, Clone)]
pub struct AuditLogInput {
    pub action: AuditAction,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub actor_tenant_id: Option<String>,
    pub resource_tenant_id: Option<String>,
    pub resource: Option<String>,
    pub resource_type: Option<String>,
    pub details: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: Option<bool>,
    pub severity: Option<Severity>,
}

impl AuditLogInput {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            user_id: None,
            username: None,
            actor_tenant_id: None,
            resource_tenant_id: None,
            resource: None,
            resource_type: None,
            details: None,
            ip_address: None,
            user_agent: None,
            success: None,
            severity: None,
        }
    }

    pub fn actor(mut self, identity: &Identity) -> Self {
        self.user_id = Some(identity.id().to_string());
        self.username = Some(identity.display_name().to_string());
        self.actor_tenant_id = identity.tenant_id().map(str::to_string);
        self
    }

    /// Attribute the entry to a name only, e.g. an unknown login username.
    pub fn anonymous(mut self, username: impl Into<String>) -> Self {
        self.user_id = None;
        self.username = Some(username.into());
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource: Option<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource = resource;
        self
    }

    pub fn resource_ref(mut self, resource: &ResourceRef) -> Self {
        self.resource_type = Some(resource.kind.as_str().to_string());
        self.resource = resource.id.clone();
        self.resource_tenant_id = resource.tenant_id.clone();
        self
    }

    /// Attribute the entry to a tenant other than the actor's.
    pub fn in_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.resource_tenant_id = tenant_id;
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Add one key to `details`, turning it into an object when needed.
    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        let mut map = match self.details.take() {
            Some(Value::Object(map)) => map,
            Some(other) => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                map
            }
            None => Map::new(),
        };
        map.insert(key.to_string(), value.into());
        self.details = Some(Value::Object(map));
        self
    }

    pub fn request(mut self, meta: &RequestMeta) -> Self {
        self.ip_address = Some(meta.ip_address.clone());
        self.user_agent = Some(meta.user_agent.clone());
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Shape the entry for an access-control denial.
    pub fn denied(self) -> Self {
        let severity = self.severity.unwrap_or_default().max(Severity::Warning);
        self.success(false)
            .severity(severity)
            .detail("outcome", "access_denied")
    }

    /// Shape the entry for the result of a permitted operation.
    pub fn outcome(self, succeeded: bool) -> Self {
        if succeeded {
            self.success(true)
        } else {
            let severity = self.severity.unwrap_or_default().max(Severity::Warning);
            self.success(false)
                .severity(severity)
                .detail("outcome", "operation_failed")
        }
    }

    pub fn into_entry(self) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            username: self.username,
            tenant_id: self.resource_tenant_id.or(self.actor_tenant_id),
            action: self.action,
            resource: self.resource,
            resource_type: self.resource_type,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            success: self.success.unwrap_or(true),
            severity: self.severity.unwrap_or_default(),
            timestamp: Utc::now(),
        }
    }
}

/// Filters for `AuditQuery::find`.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub action: Option<AuditAction>,
    pub resource: Option<String>,
    pub resource_type: Option<String>,
    pub success: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl AuditFilter {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;

    /// Caller-supplied limit clamped to `1..=MAX_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        fn eq_opt<T: PartialEq + ?Sized>(want: Option<&T>, have: Option<&T>) -> bool {
            want.map_or(true, |w| have == Some(w))
        }

        eq_opt(self.user_id.as_deref(), entry.user_id.as_deref())
            && eq_opt(self.tenant_id.as_deref(), entry.tenant_id.as_deref())
            && self.action.map_or(true, |a| a == entry.action)
            && eq_opt(self.resource.as_deref(), entry.resource.as_deref())
            && eq_opt(self.resource_type.as_deref(), entry.resource_type.as_deref())
            && self.success.map_or(true, |s| s == entry.success)
            && self.start_date.map_or(true, |d| entry.timestamp >= d)
            && self.end_date.map_or(true, |d| entry.timestamp <= d)
    }
}

/// Window for `AuditQuery::get_stats`.
#[derive(Debug, Clone, Default)]
pub struct AuditStatsQuery {
    pub tenant_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl AuditStatsQuery {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.tenant_id
            .as_deref()
            .map_or(true, |t| entry.tenant_id.as_deref() == Some(t))
            && self.start_date.map_or(true, |d| entry.timestamp >= d)
            && self.end_date.map_or(true, |d| entry.timestamp <= d)
    }
}

/// Aggregate counts over the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuditStats {
    pub total_entries: i64,
    pub failed_attempts: i64,
    pub evidence_actions: i64,
    pub critical_events: i64,
}

impl AuditStats {
    pub fn accumulate(&mut self, entry: &AuditLogEntry) {
        self.total_entries += 1;
        if !entry.success {
            self.failed_attempts += 1;
        }
        if entry.action.is_evidence_action() {
            self.evidence_actions += 1;
        }
        if entry.severity == Severity::Critical {
            self.critical_events += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceKind, Role};
    use serde_json::json;

    fn owner() -> Identity {
        Identity::new(
            "u-1",
            "Olive Owner",
            "olive@example.com",
            Role::PropertyOwner,
            Some("farm-A".to_string()),
        )
    }

    #[test]
    fn test_defaults_are_success_and_info() {
        let entry = AuditLogInput::new(AuditAction::ItemViewed).into_entry();
        assert!(entry.success);
        assert_eq!(entry.severity, Severity::Info);
        assert!(entry.user_id.is_none());
    }

    #[test]
    fn test_actions_round_trip_and_serialize_snake_case() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, json!(action.as_str()));
        }
    }

    #[test]
    fn test_resource_tenant_wins_over_actor_tenant() {
        let resource =
            ResourceRef::in_tenant(ResourceKind::Item, Some("item-9".to_string()), "farm-B");
        let entry = AuditLogInput::new(AuditAction::ItemDeleted)
            .actor(&owner())
            .resource_ref(&resource)
            .into_entry();
        assert_eq!(entry.tenant_id.as_deref(), Some("farm-B"));
        assert_eq!(entry.resource_type.as_deref(), Some("item"));
        assert_eq!(entry.resource.as_deref(), Some("item-9"));
    }

    #[test]
    fn test_denied_forces_failure_and_at_least_warning() {
        let entry = AuditLogInput::new(AuditAction::ItemViewed)
            .actor(&owner())
            .denied()
            .into_entry();
        assert!(!entry.success);
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.details.unwrap()["outcome"], "access_denied");

        let critical = AuditLogInput::new(AuditAction::EvidenceDeleted)
            .severity(Severity::Critical)
            .denied()
            .into_entry();
        assert_eq!(critical.severity, Severity::Critical);
    }

    #[test]
    fn test_detail_wraps_non_object_payload() {
        let entry = AuditLogInput::new(AuditAction::DataExported)
            .details(json!("csv"))
            .detail("recordCount", 3)
            .into_entry();
        let details = entry.details.unwrap();
        assert_eq!(details["payload"], "csv");
        assert_eq!(details["recordCount"], 3);
    }

    #[test]
    fn test_conventional_severity() {
        let warnings = [
            AuditAction::LoginFailed,
            AuditAction::EvidenceDeleted,
            AuditAction::ItemDeleted,
            AuditAction::CaseClosed,
            AuditAction::UserCreated,
            AuditAction::UserModified,
            AuditAction::UserDeactivated,
            AuditAction::PermissionsChanged,
            AuditAction::TenantAccessed,
        ];
        for action in AuditAction::ALL {
            let expected = if warnings.contains(&action) {
                Severity::Warning
            } else {
                Severity::Info
            };
            assert_eq!(action.conventional_severity(), expected, "{}", action);
        }
    }

    #[test]
    fn test_filter_limit_is_clamped() {
        assert_eq!(AuditFilter::default().effective_limit(), 100);
        let filter = AuditFilter {
            limit: Some(50_000),
            ..Default::default()
        };
        assert_eq!(filter.effective_limit(), 1000);
        let filter = AuditFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(filter.effective_limit(), 1);
    }

    #[test]
    fn test_stats_accumulate() {
        let mut stats = AuditStats::default();
        stats.accumulate(&AuditLogInput::new(AuditAction::EvidenceViewed).into_entry());
        stats.accumulate(
            &AuditLogInput::new(AuditAction::LoginFailed)
                .success(false)
                .severity(Severity::Critical)
                .into_entry(),
        );
        assert_eq!(
            stats,
            AuditStats {
                total_entries: 2,
                failed_attempts: 1,
                evidence_actions: 1,
                critical_events: 1,
            }
        );
    }
}
