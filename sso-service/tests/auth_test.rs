mod common;

use axum::http::{Method, StatusCode};
use common::{json_request, upstream_id_token, TestApp, UPSTREAM_ISSUER};
use serde_json::json;

#[tokio::test]
async fn test_register_then_login_with_email() {
    let app = TestApp::new();
    let registered = app
        .register_email("Alice", "alice@example.com", "correct horse")
        .await;
    let registered_claims = app
        .state
        .jwt
        .validate_session_token(&registered)
        .expect("valid session");

    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/auth/login",
            json!({
                "provider": "email",
                "email": "Alice@Example.com",
                "password": "correct horse",
            }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let token = body["sso_session_token"].as_str().unwrap();
    let claims = app.state.jwt.validate_session_token(token).unwrap();
    assert_eq!(claims.sub, registered_claims.sub);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new();
    app.register_email("Alice", "alice@example.com", "pw").await;

    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            json!({
                "provider": "email",
                "name": "Other",
                "email": "alice@example.com",
                "password": "pw2",
            }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register_email("Alice", "alice@example.com", "pw").await;

    let (wrong_status, _, wrong_body) = app
        .send(json_request(
            Method::POST,
            "/auth/login",
            json!({"provider": "email", "email": "alice@example.com", "password": "nope"}),
            None,
        ))
        .await;
    let (unknown_status, _, unknown_body) = app
        .send(json_request(
            Method::POST,
            "/auth/login",
            json!({"provider": "email", "email": "nobody@example.com", "password": "pw"}),
            None,
        ))
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_register_rejects_empty_password_and_bad_email() {
    let app = TestApp::new();

    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            json!({"provider": "email", "name": "A", "email": "a@example.com", "password": ""}),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Empty password is not permitted");

    let (status, _, _) = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            json!({"provider": "email", "name": "A", "email": "not-an-email", "password": "pw"}),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_provider_is_rejected() {
    let app = TestApp::new();

    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/auth/login",
            json!({"provider": "carrier-pigeon", "email": "a@example.com", "password": "pw"}),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid auth provider: carrier-pigeon");
}

#[tokio::test]
async fn test_federated_login_creates_then_reuses_user() {
    let app = TestApp::new();
    let assertion = json!({
        "provider": "oauth",
        "id_token": upstream_id_token("google-123", "fed@example.com"),
    });

    let (first_status, _, first) = app
        .send(json_request(Method::POST, "/auth/login", assertion.clone(), None))
        .await;
    let (second_status, _, second) = app
        .send(json_request(Method::POST, "/auth/login", assertion, None))
        .await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    let first_sub = app
        .state
        .jwt
        .validate_session_token(first["sso_session_token"].as_str().unwrap())
        .unwrap()
        .sub;
    let second_sub = app
        .state
        .jwt
        .validate_session_token(second["sso_session_token"].as_str().unwrap())
        .unwrap()
        .sub;
    assert_eq!(first_sub, second_sub);
    assert_eq!(app.users.user_count(), 1);
}

#[tokio::test]
async fn test_federated_login_links_existing_email_account() {
    let app = TestApp::new();
    let session = app.register_email("Alice", "alice@example.com", "pw").await;
    let alice = app.state.jwt.validate_session_token(&session).unwrap().sub;

    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/auth/login",
            json!({
                "provider": "oauth",
                "id_token": upstream_id_token("google-alice", "alice@example.com"),
            }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let linked = app
        .state
        .jwt
        .validate_session_token(body["sso_session_token"].as_str().unwrap())
        .unwrap()
        .sub;
    assert_eq!(linked, alice);
    assert_eq!(app.users.identity_count(), 2);
}

#[tokio::test]
async fn test_body_claims_cannot_take_over_an_account() {
    let app = TestApp::new();
    app.register_email("Victim", "victim@example.com", "pw").await;

    let forged = [
        json!({
            "provider": "oauth",
            "sub": "attacker",
            "issuer": "https://evil",
            "email": "victim@example.com",
            "id_token": "garbage",
        }),
        json!({
            "provider": "oauth",
            "sub": "attacker",
            "issuer": UPSTREAM_ISSUER,
            "email": "victim@example.com",
        }),
    ];

    for body in forged {
        let (status, _, response) = app
            .send(json_request(Method::POST, "/auth/login", body, None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(response.get("sso_session_token").is_none());
    }

    assert_eq!(app.users.user_count(), 1);
    assert_eq!(app.users.identity_count(), 1);
}

#[tokio::test]
async fn test_session_token_is_not_an_id_token() {
    let app = TestApp::new();
    let session = app.register_email("Victim", "victim@example.com", "pw").await;

    let (status, _, _) = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            json!({ "provider": "oauth", "id_token": session }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.users.identity_count(), 1);
}

#[tokio::test]
async fn test_health_reports_disabled_backends() {
    let app = TestApp::new();
    let (status, _, body) = app.send(common::get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["postgres"], "disabled");
    assert_eq!(body["checks"]["redis"], "disabled");
}
