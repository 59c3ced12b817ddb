//! Shared setup for custody-service integration tests.
//!
//! The router runs against in-memory stores, so no PostgreSQL or Redis is needed.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use custody_service::{
    build_router,
    config::{
        AuditConfig, CustodyConfig, DatabaseConfig, Environment, RateLimitConfig, RedisConfig,
        SecurityConfig, SessionConfig,
    },
    models::{Account, AuditLogEntry, HashAlgorithm, Role},
    services::{InMemoryAuditStore, InMemoryIdentityRepository, MockRevocationList},
    utils::{hash_password, Password},
    AppState, Backends,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SESSION_COOKIE: &str = "custody_session";
pub const STRONG_PASSWORD: &str = "Correct-Horse-42";

pub fn test_config() -> CustodyConfig {
    CustodyConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "custody-service-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        session: SessionConfig {
            secret: "integration-test-secret-at-least-32-bytes!".to_string(),
            ttl_days: 7,
            cookie_name: SESSION_COOKIE.to_string(),
            cookie_secure: false,
        },
        audit: AuditConfig {
            write_timeout_ms: 5000,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub identities: Arc<InMemoryIdentityRepository>,
    pub audit: Arc<InMemoryAuditStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_audit_store(InMemoryAuditStore::new())
    }

    pub fn with_audit_store(store: InMemoryAuditStore) -> Self {
        let identities = Arc::new(InMemoryIdentityRepository::new());
        let audit = Arc::new(store);
        let backends = Backends {
            identities: identities.clone(),
            audit: audit.clone(),
            revocations: Arc::new(MockRevocationList::new()),
            db: None,
        };
        let state = AppState::new(&test_config(), backends).expect("Failed to build state");

        Self {
            router: build_router(state.clone()),
            state,
            identities,
            audit,
        }
    }

    /// Insert an active account whose password is hashed in the current format.
    pub fn seed_user(&self, username: &str, role: Role, tenant_id: Option<&str>) -> Account {
        let hashed = hash_password(&Password::new(STRONG_PASSWORD.to_string()))
            .expect("Failed to hash password");
        let account = Account::new(
            tenant_id.map(str::to_string),
            username.to_string(),
            format!("{}@example.com", username),
            format!("{} (test)", username),
            role,
            hashed,
        );
        self.identities.insert(account.clone());
        account
    }

    /// Insert an account still holding a pre-hashing plaintext credential.
    pub fn seed_legacy_user(&self, username: &str, plaintext: &str, tenant_id: &str) -> Account {
        let mut account = Account::new(
            Some(tenant_id.to_string()),
            username.to_string(),
            format!("{}@example.com", username),
            format!("{} (legacy)", username),
            Role::PropertyOwner,
            plaintext.to_string(),
        );
        account.credential.hash_algorithm_version = HashAlgorithm::LegacyPlaintext;
        self.identities.insert(account.clone());
        account
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    pub async fn login_as(&self, username: &str, password: &str) -> Response {
        let body = serde_json::json!({ "username": username, "password": password });
        self.send(json_request("POST", "/auth/login", None, &body))
            .await
    }

    /// Log in and return the `name=value` pair to send back as a Cookie header.
    pub async fn session_cookie(&self, username: &str) -> String {
        let response = self.login_as(username, STRONG_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK, "login failed for {}", username);
        cookie_pair(&response).expect("Login did not set a session cookie")
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit.entries()
    }
}

pub fn cookie_pair(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
