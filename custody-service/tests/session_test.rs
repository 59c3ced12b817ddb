//! Login, session resolution and logout over HTTP.

mod common;

use axum::http::{header, StatusCode};
use common::{body_json, cookie_pair, get_request, json_request, TestApp, STRONG_PASSWORD};
use custody_service::models::{AuditAction, HashAlgorithm, Role, Severity};
use custody_service::services::IdentityRepository;
use custody_service::utils::ARGON2ID_PREFIX;
use serde_json::json;

#[tokio::test]
async fn login_sets_cookie_and_resolves_session() {
    let app = TestApp::new();
    let owner = app.seed_user("olive", Role::PropertyOwner, Some("farm-A"));

    let response = app.login_as("olive", STRONG_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("custody_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));

    let cookie = cookie_pair(&response).unwrap();
    let body = body_json(response).await;
    assert_eq!(body["identity"]["id"], owner.user_id.as_str());
    assert_eq!(body["identity"]["role"], "property_owner");

    let response = app.send(get_request("/auth/session", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let identity = body_json(response).await;
    assert_eq!(identity["id"], owner.user_id.as_str());
    assert_eq!(identity["tenant_id"], "farm-A");

    let logins: Vec<_> = app
        .audit_entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::Login)
        .collect();
    assert_eq!(logins.len(), 1);
    assert!(logins[0].success);
    assert_eq!(logins[0].tenant_id.as_deref(), Some("farm-A"));
}

#[tokio::test]
async fn session_without_cookie_is_unauthorized() {
    let app = TestApp::new();

    let response = app.send(get_request("/auth/session", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(get_request("/auth/session", Some("custody_session=not-a-token")))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new();
    app.seed_user("olive", Role::PropertyOwner, Some("farm-A"));

    let wrong_password = app.login_as("olive", "Not-The-Password-1").await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert!(cookie_pair(&wrong_password).is_none());
    let wrong_password = body_json(wrong_password).await;

    let unknown_user = app.login_as("nobody", STRONG_PASSWORD).await;
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    let unknown_user = body_json(unknown_user).await;

    assert_eq!(wrong_password, unknown_user);
    assert_eq!(unknown_user["error"], "Invalid credentials");

    let failures: Vec<_> = app
        .audit_entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::LoginFailed)
        .collect();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|e| !e.success));
    assert!(failures.iter().all(|e| e.severity == Severity::Warning));

    let anonymous = failures
        .iter()
        .find(|e| e.user_id.is_none())
        .expect("unknown user attempt not recorded");
    assert_eq!(anonymous.username.as_deref(), Some("nobody"));
    assert_eq!(anonymous.details.as_ref().unwrap()["reason"], "unknown_user");
}

#[tokio::test]
async fn failed_admin_login_is_recorded() {
    let app = TestApp::new();
    app.seed_user("admin", Role::SuperAdmin, None);

    let response = app.login_as("admin", "wrong-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let entries = app.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::LoginFailed);
    assert!(!entries[0].success);
    assert_eq!(entries[0].severity, Severity::Warning);
}

#[tokio::test]
async fn empty_password_is_rejected_and_audited() {
    let app = TestApp::new();
    app.seed_user("olive", Role::PropertyOwner, Some("farm-A"));

    let response = app.login_as("olive", "").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let entries = app.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::LoginFailed);
    assert!(!entries[0].success);
    assert_eq!(entries[0].details.as_ref().unwrap()["reason"], "empty_password");
}

#[tokio::test]
async fn logout_revokes_session_and_is_idempotent() {
    let app = TestApp::new();
    app.seed_user("olive", Role::PropertyOwner, Some("farm-A"));
    let cookie = app.session_cookie("olive").await;

    let logout = || json_request("POST", "/auth/logout", Some(&cookie), &json!({}));

    let first = app.send(logout()).await;
    assert_eq!(first.status(), StatusCode::OK);
    let removal = first
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(removal.starts_with("custody_session="));

    let second = app.send(logout()).await;
    assert_eq!(second.status(), StatusCode::OK);

    let response = app.send(get_request("/auth/session", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let logouts = app
        .audit_entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::Logout)
        .count();
    assert_eq!(logouts, 1);
}

#[tokio::test]
async fn logout_without_session_succeeds() {
    let app = TestApp::new();

    let response = app
        .send(json_request("POST", "/auth/logout", None, &json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.audit_entries().is_empty());
}

#[tokio::test]
async fn legacy_credential_is_migrated_on_login() {
    let app = TestApp::new();
    let legacy = app.seed_legacy_user("gus", "Old-Farm-Pass-1", "farm-A");

    let response = app.login_as("gus", "Old-Farm-Pass-1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let account = app
        .identities
        .find_by_id(&legacy.user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(account.credential.hashed_secret.starts_with(ARGON2ID_PREFIX));
    assert_eq!(
        account.credential.hash_algorithm_version,
        HashAlgorithm::Argon2id
    );

    let login = app
        .audit_entries()
        .into_iter()
        .find(|e| e.action == AuditAction::Login)
        .unwrap();
    assert_eq!(login.details.unwrap()["legacyFormat"], true);

    // The migrated hash keeps working
    let again = app.login_as("gus", "Old-Farm-Pass-1").await;
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let app = TestApp::new();
    app.seed_user("olive", Role::PropertyOwner, Some("farm-A"));
    let cookie = app.session_cookie("olive").await;

    let wrong = json!({ "current_password": "nope", "new_password": "Brand-New-Pass-9" });
    let response = app
        .send(json_request("POST", "/auth/password", Some(&cookie), &wrong))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let weak = json!({ "current_password": STRONG_PASSWORD, "new_password": "short" });
    let response = app
        .send(json_request("POST", "/auth/password", Some(&cookie), &weak))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let good = json!({ "current_password": STRONG_PASSWORD, "new_password": "Brand-New-Pass-9" });
    let response = app
        .send(json_request("POST", "/auth/password", Some(&cookie), &good))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let old = app.login_as("olive", STRONG_PASSWORD).await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);
    let new = app.login_as("olive", "Brand-New-Pass-9").await;
    assert_eq!(new.status(), StatusCode::OK);

    let resets: Vec<_> = app
        .audit_entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::PasswordReset)
        .collect();
    assert_eq!(resets.len(), 2);
    assert_eq!(resets.iter().filter(|e| e.success).count(), 1);
}

#[tokio::test]
async fn strength_report_for_common_word() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            "POST",
            "/auth/password/strength",
            None,
            &json!({ "password": "password" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let report = body_json(response).await;
    assert_eq!(report["is_valid"], false);
    assert_eq!(report["strength"], "weak");
    assert_eq!(report["errors"].as_array().unwrap().len(), 4);
}
