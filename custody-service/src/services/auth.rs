use std::sync::Arc;

use super::audit::{auth_attempt, AuditActor, AuditLogger};
use super::error::ServiceError;
use super::identity_repository::IdentityRepository;
use super::password::PasswordService;
use super::password_policy::validate_strength;
use super::session::{IssuedSession, SessionStore};
use crate::models::{
    AuditAction, AuditLogInput, CredentialRecord, HashAlgorithm, Identity, RequestMeta,
    ResourceKind, Severity,
};
use crate::utils::Password;

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: Identity,
    pub session: IssuedSession,
}

#[derive(Clone)]
pub struct AuthService {
    repository: Arc<dyn IdentityRepository>,
    passwords: PasswordService,
    sessions: SessionStore,
    audit: AuditLogger,
}

impl AuthService {
    pub fn new(
        repository: Arc<dyn IdentityRepository>,
        passwords: PasswordService,
        sessions: SessionStore,
        audit: AuditLogger,
    ) -> Self {
        Self {
            repository,
            passwords,
            sessions,
            audit,
        }
    }

    /// Verify credentials and issue a session.
    ///
    /// Every failure returns the same `InvalidCredentials` error; the audit
    /// entry carries the actual reason.
    pub async fn login(
        &self,
        username: &str,
        password: &Password,
        meta: &RequestMeta,
    ) -> Result<LoginOutcome, ServiceError> {
        if password.is_empty() {
            self.audit
                .record_auth_attempt(
                    AuditActor::Anonymous(username),
                    false,
                    Some("empty_password"),
                    meta,
                )
                .await;
            return Err(ServiceError::InvalidCredentials);
        }

        let Some(account) = self.repository.find_by_username(username).await? else {
            self.passwords.verify_dummy(password).await;
            self.audit
                .record_auth_attempt(
                    AuditActor::Anonymous(username),
                    false,
                    Some("unknown_user"),
                    meta,
                )
                .await;
            return Err(ServiceError::InvalidCredentials);
        };

        let identity = account.identity();
        let stored = &account.credential.hashed_secret;
        let legacy = PasswordService::needs_migration(stored);
        let valid = self.passwords.verify(password, stored).await?;

        let failure = if !valid {
            Some("invalid_password")
        } else if !account.active {
            Some("account_inactive")
        } else {
            None
        };
        if let Some(reason) = failure {
            tracing::info!(user_id = %identity.id(), reason, "Login rejected");
            let mut entry = auth_attempt(AuditActor::Identity(&identity), false, Some(reason));
            if legacy {
                entry = entry.detail("legacyFormat", true);
            }
            self.audit.record(entry.request(meta)).await;
            return Err(ServiceError::InvalidCredentials);
        }

        if legacy {
            // Never deferred; a failed migration fails the login.
            if let Err(e) = self.passwords.migrate(identity.id(), password).await {
                tracing::error!(user_id = %identity.id(), error = %e, "Legacy credential migration failed");
                let entry = auth_attempt(
                    AuditActor::Identity(&identity),
                    false,
                    Some("credential_migration_failed"),
                )
                .severity(Severity::Error)
                .detail("legacyFormat", true);
                self.audit.record(entry.request(meta)).await;
                return Err(e);
            }
        }

        let session = self.sessions.issue(&identity)?;

        let mut entry = auth_attempt(AuditActor::Identity(&identity), true, None);
        if legacy {
            entry = entry.detail("legacyFormat", true);
        }
        self.audit.record(entry.request(meta)).await;

        tracing::info!(user_id = %identity.id(), role = %identity.role(), "Login succeeded");
        Ok(LoginOutcome { identity, session })
    }

    /// Revoke the session behind `token`. Safe to call repeatedly.
    pub async fn logout(&self, identity: Option<&Identity>, token: Option<&str>, meta: &RequestMeta) {
        self.sessions.invalidate(token).await;

        if let Some(identity) = identity {
            let entry = AuditLogInput::new(AuditAction::Logout)
                .actor(identity)
                .resource(ResourceKind::User.as_str(), Some(identity.id().to_string()))
                .request(meta);
            self.audit.record(entry).await;
        }
    }

    pub async fn resolve_session(&self, token: Option<&str>) -> Option<Identity> {
        self.sessions.resolve(token).await
    }

    /// Change the caller's own password after re-verifying the current one.
    pub async fn change_password(
        &self,
        identity: &Identity,
        current: &Password,
        new: &Password,
        meta: &RequestMeta,
    ) -> Result<(), ServiceError> {
        let report = validate_strength(new.as_str());
        if !report.is_valid {
            return Err(ServiceError::Validation(report.messages().join("; ")));
        }

        let account = self
            .repository
            .find_by_id(identity.id())
            .await?
            .ok_or(ServiceError::NotFound("Account"))?;

        let entry = AuditLogInput::new(AuditAction::PasswordReset)
            .actor(identity)
            .resource(ResourceKind::User.as_str(), Some(identity.id().to_string()))
            .request(meta);

        let valid = self
            .passwords
            .verify(current, &account.credential.hashed_secret)
            .await?;
        if !valid {
            let entry = entry
                .success(false)
                .severity(Severity::Warning)
                .detail("reason", "invalid_current_password");
            self.audit.record(entry).await;
            return Err(ServiceError::InvalidCredentials);
        }

        let hashed = self.passwords.hash(new).await?;
        let record = CredentialRecord::new(identity.id(), hashed, HashAlgorithm::CURRENT);
        self.repository.update_credential(&record).await?;

        self.audit.record(entry).await;
        tracing::info!(user_id = %identity.id(), "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AuditLogEntry, Role};
    use crate::services::audit::DEFAULT_WRITE_TIMEOUT;
    use crate::services::audit_store::InMemoryAuditStore;
    use crate::services::identity_repository::InMemoryIdentityRepository;
    use crate::services::revocation::MockRevocationList;
    use crate::utils::hash_password;

    const SECRET: &str = "test-session-secret-0123456789abcdef";

    struct Harness {
        auth: AuthService,
        repo: Arc<InMemoryIdentityRepository>,
        store: Arc<InMemoryAuditStore>,
    }

    fn harness_with(repo: InMemoryIdentityRepository) -> Harness {
        let repo = Arc::new(repo);
        let store = Arc::new(InMemoryAuditStore::new());
        let audit = AuditLogger::new(store.clone(), DEFAULT_WRITE_TIMEOUT);
        let sessions = SessionStore::new(SECRET, 7, Arc::new(MockRevocationList::new())).unwrap();
        let auth = AuthService::new(
            repo.clone(),
            PasswordService::new(repo.clone()),
            sessions,
            audit,
        );
        Harness { auth, repo, store }
    }

    fn harness() -> Harness {
        harness_with(InMemoryIdentityRepository::new())
    }

    fn account(username: &str, secret: &str, algorithm: HashAlgorithm) -> Account {
        let mut account = Account::new(
            Some("farm-A".to_string()),
            username.to_string(),
            format!("{}@example.com", username),
            "Olive Owner".to_string(),
            Role::PropertyOwner,
            secret.to_string(),
        );
        account.credential.hash_algorithm_version = algorithm;
        account
    }

    fn hashed(password: &str) -> String {
        hash_password(&Password::new(password.to_string())).unwrap()
    }

    fn pw(s: &str) -> Password {
        Password::new(s.to_string())
    }

    fn meta() -> RequestMeta {
        RequestMeta::new("198.51.100.4", "test-agent")
    }

    fn only_entry(store: &InMemoryAuditStore) -> AuditLogEntry {
        let entries = store.entries();
        assert_eq!(entries.len(), 1, "expected exactly one audit entry");
        entries.into_iter().next().unwrap()
    }

    #[tokio::test]
    async fn test_unknown_user_records_anonymous_failure() {
        let h = harness();
        let result = h.auth.login("admin", &pw("guess"), &meta()).await;

        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
        let entry = only_entry(&h.store);
        assert_eq!(entry.action, AuditAction::LoginFailed);
        assert!(!entry.success);
        assert_eq!(entry.severity, Severity::Warning);
        assert!(entry.user_id.is_none());
        assert_eq!(entry.username.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_empty_password_is_recorded_without_lookup() {
        let h = harness();
        h.repo
            .insert(account("olive", &hashed("Right-Pass-123"), HashAlgorithm::Argon2id));

        let result = h.auth.login("olive", &pw(""), &meta()).await;

        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
        let entry = only_entry(&h.store);
        assert_eq!(entry.action, AuditAction::LoginFailed);
        assert_eq!(entry.severity, Severity::Warning);
        assert!(entry.user_id.is_none());
        assert_eq!(entry.username.as_deref(), Some("olive"));
        assert_eq!(entry.details.unwrap()["reason"], "empty_password");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let h = harness();
        h.repo
            .insert(account("olive", &hashed("Right-Pass-123"), HashAlgorithm::Argon2id));

        let wrong = h.auth.login("olive", &pw("Wrong-Pass-123"), &meta()).await;
        let unknown = h.auth.login("nobody", &pw("Wrong-Pass-123"), &meta()).await;

        let wrong = wrong.unwrap_err().to_string();
        let unknown = unknown.unwrap_err().to_string();
        assert_eq!(wrong, unknown);
        assert_eq!(wrong, "Invalid credentials");
    }

    #[tokio::test]
    async fn test_successful_login_issues_resolvable_session() {
        let h = harness();
        h.repo
            .insert(account("olive", &hashed("Right-Pass-123"), HashAlgorithm::Argon2id));

        let outcome = h
            .auth
            .login("olive", &pw("Right-Pass-123"), &meta())
            .await
            .unwrap();
        let resolved = h.auth.resolve_session(Some(&outcome.session.token)).await;
        assert_eq!(resolved, Some(outcome.identity.clone()));

        let entry = only_entry(&h.store);
        assert_eq!(entry.action, AuditAction::Login);
        assert!(entry.success);
        assert_eq!(entry.tenant_id.as_deref(), Some("farm-A"));
    }

    #[tokio::test]
    async fn test_legacy_login_migrates_and_flags_entry() {
        let h = harness();
        let acct = account("olive", "letmein", HashAlgorithm::LegacyPlaintext);
        let user_id = acct.user_id.clone();
        h.repo.insert(acct);

        h.auth.login("olive", &pw("letmein"), &meta()).await.unwrap();

        let stored = h.repo.find_by_id(&user_id).await.unwrap().unwrap();
        assert!(!PasswordService::needs_migration(&stored.credential.hashed_secret));
        assert_eq!(stored.credential.hash_algorithm_version, HashAlgorithm::Argon2id);

        let entry = only_entry(&h.store);
        assert_eq!(entry.details.unwrap()["legacyFormat"], true);

        // Second login takes the hashed path
        h.auth.login("olive", &pw("letmein"), &meta()).await.unwrap();
        let latest = h.store.entries().pop().unwrap();
        assert!(latest.details.is_none());
    }

    #[tokio::test]
    async fn test_bcrypt_login_requires_real_password_then_migrates() {
        let h = harness();
        let stored = bcrypt::hash("Right-Pass-123", 4).unwrap();
        let acct = account("olive", &stored, HashAlgorithm::LegacyPlaintext);
        let user_id = acct.user_id.clone();
        h.repo.insert(acct);

        let replayed = h.auth.login("olive", &pw(&stored), &meta()).await;
        assert!(matches!(replayed, Err(ServiceError::InvalidCredentials)));
        let unchanged = h.repo.find_by_id(&user_id).await.unwrap().unwrap();
        assert_eq!(unchanged.credential.hashed_secret, stored);

        h.auth
            .login("olive", &pw("Right-Pass-123"), &meta())
            .await
            .unwrap();
        let migrated = h.repo.find_by_id(&user_id).await.unwrap().unwrap();
        assert!(!PasswordService::needs_migration(&migrated.credential.hashed_secret));

        let entries = h.store.entries();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].success);
        assert!(entries[1].success);
        assert_eq!(entries[1].details.as_ref().unwrap()["legacyFormat"], true);
    }

    #[tokio::test]
    async fn test_failed_migration_fails_login() {
        let h = harness_with(InMemoryIdentityRepository::rejecting_credential_updates());
        h.repo
            .insert(account("olive", "letmein", HashAlgorithm::LegacyPlaintext));

        let result = h.auth.login("olive", &pw("letmein"), &meta()).await;
        assert!(result.is_err());
        let entry = only_entry(&h.store);
        assert!(!entry.success);
        assert_eq!(entry.severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_inactive_account_is_rejected() {
        let h = harness();
        let mut acct = account("olive", &hashed("Right-Pass-123"), HashAlgorithm::Argon2id);
        acct.active = false;
        h.repo.insert(acct);

        let result = h.auth.login("olive", &pw("Right-Pass-123"), &meta()).await;
        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
        assert_eq!(only_entry(&h.store).details.unwrap()["reason"], "account_inactive");
    }

    #[tokio::test]
    async fn test_logout_twice_is_harmless() {
        let h = harness();
        h.repo
            .insert(account("olive", &hashed("Right-Pass-123"), HashAlgorithm::Argon2id));
        let outcome = h
            .auth
            .login("olive", &pw("Right-Pass-123"), &meta())
            .await
            .unwrap();
        let token = Some(outcome.session.token.as_str());

        h.auth.logout(Some(&outcome.identity), token, &meta()).await;
        h.auth.logout(None, token, &meta()).await;

        assert!(h.auth.resolve_session(token).await.is_none());
    }

    #[tokio::test]
    async fn test_change_password_requires_strength_and_current_password() {
        let h = harness();
        let acct = account("olive", &hashed("Right-Pass-123"), HashAlgorithm::Argon2id);
        let identity = acct.identity();
        h.repo.insert(acct);

        let weak = h
            .auth
            .change_password(&identity, &pw("Right-Pass-123"), &pw("password"), &meta())
            .await;
        assert!(matches!(weak, Err(ServiceError::Validation(_))));

        let wrong = h
            .auth
            .change_password(&identity, &pw("nope"), &pw("New-Strong-Pass-9"), &meta())
            .await;
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));

        h.auth
            .change_password(
                &identity,
                &pw("Right-Pass-123"),
                &pw("New-Strong-Pass-9"),
                &meta(),
            )
            .await
            .unwrap();
        h.auth
            .login("olive", &pw("New-Strong-Pass-9"), &meta())
            .await
            .unwrap();

        let resets: Vec<_> = h
            .store
            .entries()
            .into_iter()
            .filter(|e| e.action == AuditAction::PasswordReset)
            .collect();
        assert_eq!(resets.len(), 2);
        assert!(!resets[0].success);
        assert!(resets[1].success);
    }
}
