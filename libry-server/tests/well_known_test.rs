//! Tests for the published key set and development-mode error detail

mod common;

use common::{create_test_server, create_test_server_with, create_user_token};
use libry_core::{AccessToken, KeySet, Validation};
use libry_server::Config;
use serde_json::{json, Value};

/// Test: issued access tokens verify against the published keys
#[tokio::test]
async fn test_jwks_verifies_access_tokens() {
    let ctx = create_test_server();
    let token = create_user_token(&ctx.server, "+94770000001", "ada@example.com").await;

    let response = ctx.server.get("/.well-known/jwks.json").await;
    assert_eq!(response.status_code(), 200);
    let keys: KeySet = response.json();
    assert_eq!(keys.keys.len(), 1);

    let config = Config::default();
    let verified =
        AccessToken::verify(&token, &keys, &Validation::new(&config.issuer, &config.client_id))
            .unwrap();
    assert!(!verified.subject().is_empty());
}

/// Test: error bodies carry debug detail only in development mode
#[tokio::test]
async fn test_error_detail_only_in_dev() {
    let body = json!({ "device_id": "d", "token": "missing", "otp_code": "1" });

    let ctx = create_test_server();
    let response = ctx.server.post("/auth/signup/otp-verify").json(&body).await;
    let json: Value = response.json();
    assert_eq!(json["code"], "INVALID_TOKEN");
    assert!(json.get("detail").is_none());

    let ctx = create_test_server_with(Config {
        dev: true,
        ..Config::default()
    });
    let response = ctx.server.post("/auth/signup/otp-verify").json(&body).await;
    assert_eq!(response.status_code(), 422);
    let json: Value = response.json();
    assert_eq!(json["code"], "INVALID_TOKEN");
    assert_eq!(json["detail"], "InvalidToken");
}
