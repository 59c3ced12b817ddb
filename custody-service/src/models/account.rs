//! Account model - a persisted identity profile and its credential record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Identity, Role};

/// Format of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// Stored before hashing was introduced; compared directly and migrated on login.
    LegacyPlaintext,
    Argon2id,
}

impl HashAlgorithm {
    pub const CURRENT: HashAlgorithm = HashAlgorithm::Argon2id;

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::LegacyPlaintext => "legacy_plaintext",
            HashAlgorithm::Argon2id => "argon2id",
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy_plaintext" => Ok(HashAlgorithm::LegacyPlaintext),
            "argon2id" => Ok(HashAlgorithm::Argon2id),
            _ => Err(format!("Invalid hash algorithm: {}", s)),
        }
    }
}

/// Credential record. The secret is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub identity_id: String,
    pub hashed_secret: String,
    pub hash_algorithm_version: HashAlgorithm,
}

impl CredentialRecord {
    pub fn new(
        identity_id: impl Into<String>,
        hashed_secret: impl Into<String>,
        hash_algorithm_version: HashAlgorithm,
    ) -> Self {
        Self {
            identity_id: identity_id.into(),
            hashed_secret: hashed_secret.into(),
            hash_algorithm_version,
        }
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("identity_id", &self.identity_id)
            .field("hashed_secret", &"[REDACTED]")
            .field("hash_algorithm_version", &self.hash_algorithm_version)
            .finish()
    }
}

/// Persisted account.
#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: String,
    pub tenant_id: Option<String>,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub credential: CredentialRecord,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    /// Create a new active account with a freshly generated id.
    pub fn new(
        tenant_id: Option<String>,
        username: String,
        email: String,
        display_name: String,
        role: Role,
        hashed_secret: String,
    ) -> Self {
        let user_id = Uuid::new_v4().to_string();
        Self {
            credential: CredentialRecord::new(
                user_id.clone(),
                hashed_secret,
                HashAlgorithm::CURRENT,
            ),
            user_id,
            tenant_id,
            username,
            email,
            display_name,
            role,
            active: true,
            created_utc: Utc::now(),
        }
    }

    /// Build the session identity; permissions are derived from the current role.
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.user_id.clone(),
            self.display_name.clone(),
            self.email.clone(),
            self.role,
            self.tenant_id.clone(),
        )
    }

    /// Convert to the public response shape (no credential).
    pub fn sanitized(&self) -> AccountResponse {
        AccountResponse::from(self)
    }
}

/// Account response for API.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AccountResponse {
    pub user_id: String,
    pub tenant_id: Option<String>,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(a: &Account) -> Self {
        Self {
            user_id: a.user_id.clone(),
            tenant_id: a.tenant_id.clone(),
            username: a.username.clone(),
            email: a.email.clone(),
            display_name: a.display_name.clone(),
            role: a.role,
            active: a.active,
            created_utc: a.created_utc,
        }
    }
}
