use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashSet;
use std::sync::Mutex;

/// Session ids revoked before their natural expiry.
#[async_trait]
pub trait SessionRevocationList: Send + Sync {
    async fn revoke(&self, session_id: &str, expiry_seconds: i64) -> Result<(), anyhow::Error>;
    async fn is_revoked(&self, session_id: &str) -> Result<bool, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }

    fn key(session_id: &str) -> String {
        format!("session:revoked:{}", session_id)
    }
}

#[async_trait]
impl SessionRevocationList for RedisService {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }

    async fn revoke(&self, session_id: &str, expiry_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();

        // EX must be positive; an already expired session still gets a short entry
        redis::cmd("SET")
            .arg(Self::key(session_id))
            .arg("revoked")
            .arg("EX")
            .arg(expiry_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to revoke session: {}", e))
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();

        let exists: bool = redis::cmd("EXISTS")
            .arg(Self::key(session_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check revocation list: {}", e))?;

        Ok(exists)
    }
}

/// In-memory revocation list for tests and local runs.
pub struct MockRevocationList {
    pub revoked: Mutex<HashSet<String>>,
    unavailable: bool,
}

impl Default for MockRevocationList {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRevocationList {
    pub fn new() -> Self {
        Self {
            revoked: Mutex::new(HashSet::new()),
            unavailable: false,
        }
    }

    /// A list whose every call fails, as during a Redis outage.
    pub fn unavailable() -> Self {
        Self {
            revoked: Mutex::new(HashSet::new()),
            unavailable: true,
        }
    }

    fn check_available(&self) -> Result<(), anyhow::Error> {
        if self.unavailable {
            return Err(anyhow::anyhow!("Revocation list unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRevocationList for MockRevocationList {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.check_available()
    }

    async fn revoke(&self, session_id: &str, _expiry_seconds: i64) -> Result<(), anyhow::Error> {
        self.check_available()?;
        self.revoked
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock revocation mutex poisoned: {}", e))?
            .insert(session_id.to_string());
        Ok(())
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool, anyhow::Error> {
        self.check_available()?;
        let contains = self
            .revoked
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock revocation mutex poisoned: {}", e))?
            .contains(session_id);
        Ok(contains)
    }
}
