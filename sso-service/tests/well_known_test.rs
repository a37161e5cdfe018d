mod common;

use axum::http::{header, StatusCode};
use common::{get_request, test_signing_key, TestApp};

#[tokio::test]
async fn test_jwks_endpoint() {
    let app = TestApp::new();
    let (status, headers, body) = app.send(get_request("/.well-known/jwks.json", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");

    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);

    let key = &keys[0];
    assert_eq!(key["kty"], "RSA");
    assert_eq!(key["use"], "sig");
    assert_eq!(key["alg"], "RS256");
    assert_eq!(key["kid"], test_signing_key().kid.as_str());
    assert!(key["n"].as_str().is_some_and(|n| !n.is_empty()));
    assert_eq!(key["e"], "AQAB");
}

#[tokio::test]
async fn test_jwks_is_empty_without_keys() {
    let app = TestApp::with_keys(sso_service::services::InMemoryKeyStore::new());
    let (status, _, body) = app.send(get_request("/.well-known/jwks.json", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keys"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, headers, _) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-request-id"], "req-42");
}
