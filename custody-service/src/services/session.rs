//! Signed, stateless session tokens.
//!
//! The token carries the full [`Identity`] and is the only source of identity
//! for a request. The revocation list can only deny a token, never supply one.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::error::ServiceError;
use super::revocation::SessionRevocationList;
use crate::models::Identity;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub identity: Identity,
    pub iat: i64,
    /// Absolute expiry; sessions are never renewed.
    pub exp: i64,
    /// Session id used by the revocation list.
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Reasons a token does not yield a session. Never leaves this module.
#[derive(Debug, Error)]
enum SessionDecodeError {
    #[error("token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("session revoked")]
    Revoked,

    #[error("revocation list unavailable: {0}")]
    RevocationUnavailable(anyhow::Error),
}

#[derive(Clone)]
pub struct SessionStore {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    revocations: Arc<dyn SessionRevocationList>,
}

impl SessionStore {
    pub fn new(
        secret: &str,
        ttl_days: i64,
        revocations: Arc<dyn SessionRevocationList>,
    ) -> Result<Self, ServiceError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(ServiceError::Validation(format!(
                "Session secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if ttl_days <= 0 {
            return Err(ServiceError::Validation(
                "Session lifetime must be positive".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days),
            revocations,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Serialize the identity into a new signed token.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedSession, ServiceError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            identity: identity.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))?;

        tracing::debug!(user_id = %identity.id(), session_id = %claims.jti, "Session issued");

        Ok(IssuedSession {
            token,
            session_id: claims.jti,
            expires_at,
        })
    }

    /// Identity for a token; `None` for a missing, malformed, tampered,
    /// expired or revoked token.
    ///
    /// Every call consults the revocation list, so a request made with a
    /// valid signature costs one revocation lookup.
    pub async fn resolve(&self, token: Option<&str>) -> Option<Identity> {
        let token = token?;
        match self.decode_live(token).await {
            Ok(claims) => Some(claims.identity),
            Err(SessionDecodeError::RevocationUnavailable(e)) => {
                tracing::error!(error = %e, "Revocation list unavailable, rejecting session");
                None
            }
            Err(e) => {
                tracing::debug!(reason = %e, "No session");
                None
            }
        }
    }

    /// Revoke the session behind a token. Idempotent and infallible.
    pub async fn invalidate(&self, token: Option<&str>) {
        let Some(token) = token else {
            return;
        };
        let claims = match self.decode_signed(token) {
            Ok(claims) => claims,
            Err(_) => return,
        };

        let remaining = claims.exp - Utc::now().timestamp();
        if let Err(e) = self.revocations.revoke(&claims.jti, remaining).await {
            tracing::warn!(
                error = %e,
                session_id = %claims.jti,
                "Failed to record session revocation"
            );
        }
    }

    fn decode_signed(&self, token: &str) -> Result<SessionClaims, SessionDecodeError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(decode::<SessionClaims>(token, &self.decoding_key, &validation)?.claims)
    }

    async fn decode_live(&self, token: &str) -> Result<SessionClaims, SessionDecodeError> {
        let claims = self.decode_signed(token)?;
        let revoked = self
            .revocations
            .is_revoked(&claims.jti)
            .await
            .map_err(SessionDecodeError::RevocationUnavailable)?;
        if revoked {
            return Err(SessionDecodeError::Revoked);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::revocation::MockRevocationList;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn identity() -> Identity {
        Identity::new(
            "u-1",
            "Olive Owner",
            "olive@example.com",
            Role::PropertyOwner,
            Some("farm-A".to_string()),
        )
    }

    fn store() -> SessionStore {
        SessionStore::new(SECRET, 7, Arc::new(MockRevocationList::new())).unwrap()
    }

    #[tokio::test]
    async fn test_issue_then_resolve_returns_identity() {
        let store = store();
        let session = store.issue(&identity()).unwrap();
        let resolved = store.resolve(Some(&session.token)).await;
        assert_eq!(resolved, Some(identity()));
        assert!(session.expires_at > Utc::now() + Duration::days(6));
    }

    #[tokio::test]
    async fn test_missing_and_garbage_tokens_resolve_to_none() {
        let store = store();
        assert!(store.resolve(None).await.is_none());
        assert!(store.resolve(Some("not-a-token")).await.is_none());
    }

    #[tokio::test]
    async fn test_tampered_token_is_rejected() {
        let store = store();
        let session = store.issue(&identity()).unwrap();
        let mut parts: Vec<String> = session.token.split('.').map(str::to_string).collect();
        let forged = SessionClaims {
            identity: Identity::new("u-1", "Olive", "o@example.com", Role::SuperAdmin, None),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::days(7)).timestamp(),
            jti: "forged".to_string(),
        };
        let forged_token = encode(
            &Header::new(Algorithm::HS256),
            &forged,
            &EncodingKey::from_secret(b"another-secret-another-secret-00"),
        )
        .unwrap();
        parts[1] = forged_token.split('.').nth(1).unwrap().to_string();

        assert!(store.resolve(Some(&parts.join("."))).await.is_none());
        assert!(store.resolve(Some(&forged_token)).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let store = store();
        let claims = SessionClaims {
            identity: identity(),
            iat: (Utc::now() - Duration::days(8)).timestamp(),
            exp: (Utc::now() - Duration::days(1)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &store.encoding_key).unwrap();
        assert!(store.resolve(Some(&token)).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let store = store();
        let session = store.issue(&identity()).unwrap();

        store.invalidate(Some(&session.token)).await;
        store.invalidate(Some(&session.token)).await;
        store.invalidate(None).await;

        assert!(store.resolve(Some(&session.token)).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_sees_revocation_made_elsewhere() {
        let revocations = Arc::new(MockRevocationList::new());
        let store = SessionStore::new(SECRET, 7, revocations.clone()).unwrap();
        let session = store.issue(&identity()).unwrap();
        assert!(store.resolve(Some(&session.token)).await.is_some());

        revocations.revoke(&session.session_id, 60).await.unwrap();

        assert!(store.resolve(Some(&session.token)).await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_revocation_list_fails_closed() {
        let store =
            SessionStore::new(SECRET, 7, Arc::new(MockRevocationList::unavailable())).unwrap();
        let session = store.issue(&identity()).unwrap();
        assert!(store.resolve(Some(&session.token)).await.is_none());
        store.invalidate(Some(&session.token)).await;
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let result = SessionStore::new("short", 7, Arc::new(MockRevocationList::new()));
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
