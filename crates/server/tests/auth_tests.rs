//! Integration tests for signup, login, and bearer-token enforcement.

mod common;

use axum::http::StatusCode;
use common::{TestServer, json_request};
use serde_json::json;

#[tokio::test]
async fn health_check_is_public() {
    let server = TestServer::new().await;
    let (status, body) = json_request(&server.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn signup_with_wrong_api_key_rejected() {
    let server = TestServer::new().await;
    let body = json!({
        "username": "admin",
        "password": "password",
        "api_key": "not-the-key",
    });

    let (status, response) = json_request(&server.router, "POST", "/signup", Some(body), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response, json!({"error": "wrong api key"}));
}

#[tokio::test]
async fn signup_then_login_yields_token() {
    let server = TestServer::new().await;
    let signup = json!({
        "username": "admin",
        "password": "password",
        "api_key": "test-api-key",
    });

    let (status, response) =
        json_request(&server.router, "POST", "/signup", Some(signup), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({"result": "Successfully created admin user."}));

    let login = json!({"username": "admin", "password": "password"});
    let (status, response) = json_request(&server.router, "POST", "/login", Some(login), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.get("token").and_then(|t| t.as_str()).is_some());
}

#[tokio::test]
async fn login_with_wrong_password_rejected() {
    let server = TestServer::new().await;
    server.auth_token().await;

    let login = json!({"username": "admin", "password": "password1"});
    let (status, response) = json_request(&server.router, "POST", "/login", Some(login), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response, json!({"error": "invalid username or password"}));

    let login = json!({"username": "nobody", "password": "password"});
    let (status, _) = json_request(&server.router, "POST", "/login", Some(login), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let server = TestServer::new().await;

    let (status, _) = json_request(&server.router, "GET", "/listApps", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = json_request(&server.router, "GET", "/listApps", None, Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tampering_any_jwt_segment_invalidates_it() {
    let server = TestServer::new().await;
    let token = server.auth_token().await;

    // The untampered token works
    let (status, _) = json_request(&server.router, "GET", "/listApps", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3);

    for altered_index in 0..3 {
        let mut tampered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
        tampered[altered_index] = format!("{}A", tampered[altered_index]);
        let tampered = tampered.join(".");

        let (status, _) =
            json_request(&server.router, "GET", "/listApps", None, Some(&tampered)).await;
        assert_eq!(
            status,
            StatusCode::UNAUTHORIZED,
            "segment {altered_index} tampering was accepted"
        );
    }
}
