//! Credential hashing, verification and legacy migration.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::error::ServiceError;
use super::identity_repository::IdentityRepository;
use super::metrics;
use crate::models::{CredentialRecord, HashAlgorithm};
use crate::utils::{hash_password, verify_hashed, verify_password, CredentialFormat, Password};

/// Verified against when the username is unknown so both paths cost one hash.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password(&Password::new("custody-timing-equalizer".to_string())).ok());

#[derive(Clone)]
pub struct PasswordService {
    repository: Arc<dyn IdentityRepository>,
}

impl PasswordService {
    pub fn new(repository: Arc<dyn IdentityRepository>) -> Self {
        Self { repository }
    }

    /// Hash with Argon2id on the blocking pool.
    pub async fn hash(&self, plaintext: &Password) -> Result<String, ServiceError> {
        if plaintext.is_empty() {
            return Err(ServiceError::Validation(
                "Password must not be empty".to_string(),
            ));
        }

        let plaintext = plaintext.clone();
        tokio::task::spawn_blocking(move || hash_password(&plaintext))
            .await
            .map_err(|e| ServiceError::Hashing(e.to_string()))?
            .map_err(|e| ServiceError::Hashing(e.to_string()))
    }

    /// Whether `stored` is in any format other than the current Argon2id.
    pub fn needs_migration(stored: &str) -> bool {
        !CredentialFormat::detect(stored).is_current()
    }

    /// Check `plaintext` against `stored`.
    ///
    /// Only a value with no `$` prefix is compared directly as a legacy
    /// plaintext credential. Argon2 and bcrypt hashes are verified as hashes,
    /// and any other `$`-prefixed value never matches.
    pub async fn verify(&self, plaintext: &Password, stored: &str) -> Result<bool, ServiceError> {
        if plaintext.is_empty() {
            return Err(ServiceError::Validation(
                "Password must not be empty".to_string(),
            ));
        }

        let format = CredentialFormat::detect(stored);
        match format {
            CredentialFormat::Plaintext => {
                tracing::warn!("Verifying legacy plaintext credential; it must be migrated");
                metrics::inc_legacy_password_verification();
                return Ok(legacy_matches(plaintext.as_str(), stored));
            }
            CredentialFormat::Unrecognized => {
                tracing::error!("Stored credential has an unrecognized format");
                return Ok(false);
            }
            CredentialFormat::Argon2Other | CredentialFormat::Bcrypt => {
                tracing::info!(format = format.as_str(), "Verifying superseded credential hash");
            }
            CredentialFormat::Argon2id => {}
        }

        let plaintext = plaintext.clone();
        let stored = stored.to_string();
        let outcome = tokio::task::spawn_blocking(move || verify_hashed(&plaintext, &stored))
            .await
            .map_err(|e| ServiceError::Hashing(e.to_string()))?;

        match outcome {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::error!(error = %e, "Stored credential is not a valid hash");
                Ok(false)
            }
        }
    }

    /// Burn one verification for an unknown username.
    pub async fn verify_dummy(&self, plaintext: &Password) {
        let Some(dummy) = DUMMY_HASH.as_ref() else {
            return;
        };
        let plaintext = plaintext.clone();
        let _ = tokio::task::spawn_blocking(move || verify_password(&plaintext, dummy)).await;
    }

    /// Re-hash a verified legacy password and persist it.
    pub async fn migrate(
        &self,
        identity_id: &str,
        plaintext: &Password,
    ) -> Result<CredentialRecord, ServiceError> {
        let hashed = self.hash(plaintext).await?;
        let record = CredentialRecord::new(identity_id, hashed, HashAlgorithm::CURRENT);
        self.repository.update_credential(&record).await?;

        tracing::info!(user_id = %identity_id, "Legacy credential migrated");
        Ok(record)
    }
}

/// Digest both sides first so the comparison does not leak length.
fn legacy_matches(plaintext: &str, stored: &str) -> bool {
    let a = Sha256::digest(plaintext.as_bytes());
    let b = Sha256::digest(stored.as_bytes());
    a.ct_eq(&b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, Role};
    use crate::services::identity_repository::InMemoryIdentityRepository;

    fn service() -> (PasswordService, Arc<InMemoryIdentityRepository>) {
        let repo = Arc::new(InMemoryIdentityRepository::new());
        (PasswordService::new(repo.clone()), repo)
    }

    fn pw(s: &str) -> Password {
        Password::new(s.to_string())
    }

    #[tokio::test]
    async fn test_hash_then_verify() {
        let (svc, _) = service();
        let hashed = svc.hash(&pw("Correct-Horse-9")).await.unwrap();
        assert_ne!(hashed, "Correct-Horse-9");
        assert!(svc.verify(&pw("Correct-Horse-9"), &hashed).await.unwrap());
        assert!(!svc.verify(&pw("Wrong-Horse-9"), &hashed).await.unwrap());
        assert!(!PasswordService::needs_migration(&hashed));
    }

    #[tokio::test]
    async fn test_empty_password_is_rejected() {
        let (svc, _) = service();
        assert!(matches!(
            svc.hash(&pw("")).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.verify(&pw(""), "stored").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_value_compares_directly() {
        let (svc, _) = service();
        assert!(PasswordService::needs_migration("letmein"));
        assert!(svc.verify(&pw("letmein"), "letmein").await.unwrap());
        assert!(!svc.verify(&pw("letmein2"), "letmein").await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_persists_current_format() {
        let (svc, repo) = service();
        let mut account = Account::new(
            Some("farm-A".to_string()),
            "olive".to_string(),
            "olive@example.com".to_string(),
            "Olive".to_string(),
            Role::PropertyOwner,
            "letmein".to_string(),
        );
        account.credential.hash_algorithm_version = HashAlgorithm::LegacyPlaintext;
        repo.insert(account.clone());

        let record = svc.migrate(&account.user_id, &pw("letmein")).await.unwrap();
        assert!(!PasswordService::needs_migration(&record.hashed_secret));

        let stored = repo.find_by_id(&account.user_id).await.unwrap().unwrap();
        assert_eq!(stored.credential.hash_algorithm_version, HashAlgorithm::Argon2id);
        assert!(svc
            .verify(&pw("letmein"), &stored.credential.hashed_secret)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_bcrypt_hash_is_verified_not_compared() {
        let (svc, _) = service();
        let stored = bcrypt::hash("letmein", 4).unwrap();

        assert!(PasswordService::needs_migration(&stored));
        assert!(svc.verify(&pw("letmein"), &stored).await.unwrap());
        assert!(!svc.verify(&pw("letmein2"), &stored).await.unwrap());
        assert!(!svc.verify(&pw(&stored), &stored).await.unwrap());
    }

    #[tokio::test]
    async fn test_argon2i_hash_is_verified_not_compared() {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Algorithm, Argon2, Params, Version,
        };

        let (svc, _) = service();
        let salt = SaltString::generate(&mut OsRng);
        let stored = Argon2::new(Algorithm::Argon2i, Version::V0x13, Params::default())
            .hash_password(b"letmein", &salt)
            .unwrap()
            .to_string();

        assert!(PasswordService::needs_migration(&stored));
        assert!(svc.verify(&pw("letmein"), &stored).await.unwrap());
        assert!(!svc.verify(&pw("letmein2"), &stored).await.unwrap());
        assert!(!svc.verify(&pw(&stored), &stored).await.unwrap());
    }

    #[tokio::test]
    async fn test_unrecognized_scheme_never_matches() {
        let (svc, _) = service();
        let stored = "$1$saltsalt$qjXMvbEw8oaL.CzflDugX/";
        assert!(PasswordService::needs_migration(stored));
        assert!(!svc.verify(&pw(stored), stored).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_current_hash_does_not_verify() {
        let (svc, _) = service();
        assert!(!svc
            .verify(&pw("anything"), "$argon2id$garbage")
            .await
            .unwrap());
    }
}
