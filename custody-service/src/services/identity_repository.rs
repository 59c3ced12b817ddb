//! Account lookup and lifecycle storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow};
use std::collections::HashMap;
use std::sync::Mutex;

use super::error::ServiceError;
use crate::models::{Account, CredentialRecord, Role};

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Case-insensitive username lookup.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServiceError>;
    async fn find_by_id(&self, user_id: &str) -> Result<Option<Account>, ServiceError>;
    /// Fails with `Conflict` when the username is taken.
    async fn create_account(&self, account: &Account) -> Result<(), ServiceError>;
    async fn update_credential(&self, credential: &CredentialRecord) -> Result<(), ServiceError>;
    async fn update_role(&self, user_id: &str, role: Role) -> Result<(), ServiceError>;
    async fn deactivate(&self, user_id: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, FromRow)]
struct AccountRow {
    user_id: String,
    tenant_id: Option<String>,
    username: String,
    email: String,
    display_name: String,
    role_code: String,
    hashed_secret: String,
    hash_algorithm: String,
    active: bool,
    created_utc: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = ServiceError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role_code
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        let algorithm = row
            .hash_algorithm
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        Ok(Account {
            credential: CredentialRecord::new(row.user_id.clone(), row.hashed_secret, algorithm),
            user_id: row.user_id,
            tenant_id: row.tenant_id,
            username: row.username,
            email: row.email,
            display_name: row.display_name,
            role,
            active: row.active,
            created_utc: row.created_utc,
        })
    }
}

fn not_found_unless_updated(rows_affected: u64) -> Result<(), ServiceError> {
    if rows_affected == 0 {
        return Err(ServiceError::NotFound("Account"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityRepository for PgIdentityRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServiceError> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE LOWER(username) = LOWER($1)")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Account>, ServiceError> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn create_account(&self, account: &Account) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (user_id, tenant_id, username, email, display_name, role_code, hashed_secret, hash_algorithm, active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            "#,
        )
        .bind(&account.user_id)
        .bind(&account.tenant_id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(account.role.as_str())
        .bind(&account.credential.hashed_secret)
        .bind(account.credential.hash_algorithm_version.as_str())
        .bind(account.active)
        .bind(account.created_utc)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                ServiceError::Conflict("Username already exists".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_credential(&self, credential: &CredentialRecord) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE accounts SET hashed_secret = $2, hash_algorithm = $3, updated_utc = NOW() WHERE user_id = $1",
        )
        .bind(&credential.identity_id)
        .bind(&credential.hashed_secret)
        .bind(credential.hash_algorithm_version.as_str())
        .execute(&self.pool)
        .await?;
        not_found_unless_updated(result.rows_affected())
    }

    async fn update_role(&self, user_id: &str, role: Role) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE accounts SET role_code = $2, updated_utc = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        not_found_unless_updated(result.rows_affected())
    }

    async fn deactivate(&self, user_id: &str) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE accounts SET active = FALSE, updated_utc = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        not_found_unless_updated(result.rows_affected())
    }
}

/// In-memory repository for tests and local runs.
#[derive(Default)]
pub struct InMemoryIdentityRepository {
    accounts: Mutex<HashMap<String, Account>>,
    reject_credential_updates: bool,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository whose credential writes fail, as during a database outage.
    pub fn rejecting_credential_updates() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            reject_credential_updates: true,
        }
    }

    /// Seed an account directly, bypassing uniqueness checks.
    pub fn insert(&self, account: Account) {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(account.user_id.clone(), account);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Account>>, ServiceError> {
        self.accounts.lock().map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Identity repository mutex poisoned: {}", e))
        })
    }

    fn update<F>(&self, user_id: &str, apply: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut Account),
    {
        let mut accounts = self.lock()?;
        let account = accounts
            .get_mut(user_id)
            .ok_or(ServiceError::NotFound("Account"))?;
        apply(account);
        Ok(())
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServiceError> {
        let accounts = self.lock()?;
        Ok(accounts
            .values()
            .find(|a| a.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Account>, ServiceError> {
        Ok(self.lock()?.get(user_id).cloned())
    }

    async fn create_account(&self, account: &Account) -> Result<(), ServiceError> {
        let mut accounts = self.lock()?;
        if accounts
            .values()
            .any(|a| a.username.eq_ignore_ascii_case(&account.username))
        {
            return Err(ServiceError::Conflict("Username already exists".to_string()));
        }
        accounts.insert(account.user_id.clone(), account.clone());
        Ok(())
    }

    async fn update_credential(&self, credential: &CredentialRecord) -> Result<(), ServiceError> {
        if self.reject_credential_updates {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Credential store unavailable"
            )));
        }
        self.update(&credential.identity_id, |account| {
            account.credential = credential.clone();
        })
    }

    async fn update_role(&self, user_id: &str, role: Role) -> Result<(), ServiceError> {
        self.update(user_id, |account| account.role = role)
    }

    async fn deactivate(&self, user_id: &str) -> Result<(), ServiceError> {
        self.update(user_id, |account| account.active = false)
    }
}
