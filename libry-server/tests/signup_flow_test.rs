//! End-to-end tests for the four signup steps

mod common;

use common::{
    create_test_server, create_user, signup_step, signup_until_register, DEVICE, OTP, PASSWORD,
};
use serde_json::{json, Value};

const PHONE: &str = "+94770000001";

async fn start(server: &axum_test::TestServer, device: &str, phone: &str) -> axum_test::TestResponse {
    server
        .post("/auth/signup/otp")
        .json(&json!({ "device_id": device, "mobile_number": phone }))
        .await
}

async fn verify(
    server: &axum_test::TestServer,
    device: &str,
    token: &str,
    code: &str,
) -> axum_test::TestResponse {
    server
        .post("/auth/signup/otp-verify")
        .json(&json!({ "device_id": device, "token": token, "otp_code": code }))
        .await
}

fn assert_error(response: &axum_test::TestResponse, status: u16, code: &str) {
    assert_eq!(response.status_code(), status, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
}

/// Test: the full flow creates a confirmed, signed-in user
#[tokio::test]
async fn test_full_signup() {
    let ctx = create_test_server();

    let data = create_user(&ctx.server, PHONE, "New.User@Example.com").await;

    assert_eq!(data["user"]["email"], "new.user@example.com");
    assert_eq!(data["user"]["phone_number"], PHONE);
    assert_eq!(data["user"]["phone_number_verified"], true);
    assert_eq!(data["user"]["email_verified"], false);
    assert!(data["accessToken"].as_str().is_some());
    assert!(data["refreshToken"].as_str().is_some());

    assert_eq!(*ctx.verifier.codes_sent.read().unwrap(), vec![PHONE.to_string()]);
    assert_eq!(
        *ctx.verifier.links_sent.read().unwrap(),
        vec!["new.user@example.com".to_string()]
    );
}

/// Test: every successful step hands out a new token
#[tokio::test]
async fn test_tokens_rotate() {
    let ctx = create_test_server();

    let t1 = signup_step(
        &ctx.server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": PHONE }),
    )
    .await;
    let t2 = signup_step(
        &ctx.server,
        "/auth/signup/otp-verify",
        json!({ "device_id": DEVICE, "token": t1, "otp_code": OTP }),
    )
    .await;
    assert_ne!(t1, t2);

    // The old token is dead
    let response = ctx
        .server
        .post("/auth/signup/email")
        .json(&json!({ "device_id": DEVICE, "token": t1, "email": "a@x.com" }))
        .await;
    assert_error(&response, 422, "INVALID_TOKEN");
}

/// Test: malformed input is rejected before any session is touched
#[tokio::test]
async fn test_start_validation() {
    let ctx = create_test_server();

    let response = start(&ctx.server, DEVICE, "0770000001").await;
    assert_error(&response, 400, "VALIDATION_ERROR");

    let response = start(&ctx.server, "  ", PHONE).await;
    assert_error(&response, 400, "VALIDATION_ERROR");

    assert!(ctx.verifier.codes_sent.read().unwrap().is_empty());
}

/// Test: a second start while the first session is live is rejected once
#[tokio::test]
async fn test_start_while_session_active() {
    let ctx = create_test_server();

    assert_eq!(start(&ctx.server, DEVICE, PHONE).await.status_code(), 200);

    let response = start(&ctx.server, DEVICE, PHONE).await;
    assert_error(&response, 422, "SESSION_ACTIVE");

    // The rejected call removed the old session, so a retry goes through
    assert_eq!(start(&ctx.server, DEVICE, PHONE).await.status_code(), 200);
}

/// Test: another device may run its own session for the same number
#[tokio::test]
async fn test_sessions_are_per_device() {
    let ctx = create_test_server();

    assert_eq!(start(&ctx.server, "device-a", PHONE).await.status_code(), 200);
    assert_eq!(start(&ctx.server, "device-b", PHONE).await.status_code(), 200);
}

/// Test: a provider outage surfaces as PROVIDER_ERROR
#[tokio::test]
async fn test_start_send_failure() {
    let ctx = create_test_server();
    ctx.verifier.set_fail_send(true);

    let response = start(&ctx.server, DEVICE, PHONE).await;
    assert_error(&response, 502, "PROVIDER_ERROR");
}

/// Test: a wrong device destroys the session
#[tokio::test]
async fn test_device_mismatch_destroys_session() {
    let ctx = create_test_server();
    let token = signup_step(
        &ctx.server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": PHONE }),
    )
    .await;

    let response = verify(&ctx.server, "other-device", &token, OTP).await;
    assert_error(&response, 422, "INVALID_DEVICE_ID");

    let response = verify(&ctx.server, DEVICE, &token, OTP).await;
    assert_error(&response, 422, "INVALID_TOKEN");
}

/// Test: wrong codes may be retried up to the ceiling
#[tokio::test]
async fn test_otp_retry_ceiling() {
    let ctx = create_test_server();
    let token = signup_step(
        &ctx.server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": PHONE }),
    )
    .await;

    for _ in 0..3 {
        let response = verify(&ctx.server, DEVICE, &token, "00000").await;
        assert_error(&response, 422, "INVALID_OTP");
    }

    let response = verify(&ctx.server, DEVICE, &token, "00000").await;
    assert_error(&response, 403, "OTP_RETRY_EXCEED");

    let response = verify(&ctx.server, DEVICE, &token, OTP).await;
    assert_error(&response, 422, "INVALID_TOKEN");
}

/// Test: the right code still works after three misses
#[tokio::test]
async fn test_correct_otp_after_failures() {
    let ctx = create_test_server();
    let token = signup_step(
        &ctx.server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": PHONE }),
    )
    .await;

    for _ in 0..3 {
        let response = verify(&ctx.server, DEVICE, &token, "00000").await;
        assert_eq!(response.status_code(), 422);
    }

    let response = verify(&ctx.server, DEVICE, &token, OTP).await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
}

/// Test: a registered phone number cannot sign up again
#[tokio::test]
async fn test_phone_number_taken() {
    let ctx = create_test_server();
    create_user(&ctx.server, PHONE, "first@example.com").await;

    // The OTP still goes out; the check happens at verification
    let token = signup_step(
        &ctx.server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": PHONE }),
    )
    .await;

    let response = verify(&ctx.server, DEVICE, &token, OTP).await;
    assert_error(&response, 403, "PHONE_NUMBER_EXISTS");

    let response = verify(&ctx.server, DEVICE, &token, OTP).await;
    assert_error(&response, 422, "INVALID_TOKEN");
}

/// Test: a taken email can be swapped for another on the same token
#[tokio::test]
async fn test_email_taken_keeps_session() {
    let ctx = create_test_server();
    create_user(&ctx.server, "+94770000009", "taken@example.com").await;

    let t1 = signup_step(
        &ctx.server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": PHONE }),
    )
    .await;
    let t2 = signup_step(
        &ctx.server,
        "/auth/signup/otp-verify",
        json!({ "device_id": DEVICE, "token": t1, "otp_code": OTP }),
    )
    .await;

    let response = ctx
        .server
        .post("/auth/signup/email")
        .json(&json!({ "device_id": DEVICE, "token": t2, "email": "TAKEN@example.com" }))
        .await;
    assert_error(&response, 403, "EMAIL_TAKEN");

    signup_step(
        &ctx.server,
        "/auth/signup/email",
        json!({ "device_id": DEVICE, "token": t2, "email": "free@example.com" }),
    )
    .await;
}

/// Test: skipping the email step is fatal for the session
#[tokio::test]
async fn test_register_before_email_not_allowed() {
    let ctx = create_test_server();
    let t1 = signup_step(
        &ctx.server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": PHONE }),
    )
    .await;
    let t2 = signup_step(
        &ctx.server,
        "/auth/signup/otp-verify",
        json!({ "device_id": DEVICE, "token": t1, "otp_code": OTP }),
    )
    .await;

    let body = json!({ "device_id": DEVICE, "token": t2, "password": PASSWORD });
    let response = ctx.server.post("/auth/signup/register").json(&body).await;
    assert_error(&response, 403, "NOT_ALLOWED");

    let response = ctx.server.post("/auth/signup/register").json(&body).await;
    assert_error(&response, 422, "INVALID_TOKEN");
}

/// Test: adding an email before verifying the OTP is fatal for the session
#[tokio::test]
async fn test_email_before_otp_not_allowed() {
    let ctx = create_test_server();
    let token = signup_step(
        &ctx.server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": PHONE }),
    )
    .await;

    let response = ctx
        .server
        .post("/auth/signup/email")
        .json(&json!({ "device_id": DEVICE, "token": token, "email": "a@x.com" }))
        .await;
    assert_error(&response, 403, "NOT_ALLOWED");
}

/// Test: finalize cannot be replayed
#[tokio::test]
async fn test_register_replay() {
    let ctx = create_test_server();
    let token = signup_until_register(&ctx.server, PHONE, "a@x.com").await;
    let body = json!({ "device_id": DEVICE, "token": token, "password": PASSWORD });

    let response = ctx.server.post("/auth/signup/register").json(&body).await;
    assert_eq!(response.status_code(), 200);

    let response = ctx.server.post("/auth/signup/register").json(&body).await;
    assert_error(&response, 422, "INVALID_TOKEN");
}

/// Test: a weak password is rejected and the session survives
#[tokio::test]
async fn test_register_weak_password() {
    let ctx = create_test_server();
    let token = signup_until_register(&ctx.server, PHONE, "a@x.com").await;

    let response = ctx
        .server
        .post("/auth/signup/register")
        .json(&json!({ "device_id": DEVICE, "token": token, "password": "password" }))
        .await;
    assert_error(&response, 400, "VALIDATION_ERROR");

    let response = ctx
        .server
        .post("/auth/signup/register")
        .json(&json!({ "device_id": DEVICE, "token": token, "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
}
