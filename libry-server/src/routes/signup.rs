//! Signup endpoints: one per step of the signup session

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::error::ApiError;
use crate::identity::TokenPair;
use crate::social::UserView;
use crate::state::{blocking, AppState};
use crate::validate;

/// Token for the next signup step
#[derive(Debug, Serialize)]
pub struct SignupToken {
    pub token: String,
}

#[derive(Deserialize)]
pub struct StartRequest {
    pub device_id: String,
    pub mobile_number: String,
}

/// POST /auth/signup/otp
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<ApiResponse<SignupToken>>, ApiError> {
    validate::require("device_id", &req.device_id)?;
    validate::phone_number(&req.mobile_number)?;

    let token = blocking(&state, move |s| {
        s.signup.start(&req.device_id, &req.mobile_number)
    })
    .await?;

    Ok(ApiResponse::ok("OTP sent", SignupToken { token }))
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub device_id: String,
    pub token: String,
    pub otp_code: String,
}

/// POST /auth/signup/otp-verify
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<SignupToken>>, ApiError> {
    validate::require("device_id", &req.device_id)?;
    validate::require("token", &req.token)?;
    validate::require("otp_code", &req.otp_code)?;

    let token = blocking(&state, move |s| {
        s.signup.verify_otp(&req.device_id, &req.token, &req.otp_code)
    })
    .await?;

    Ok(ApiResponse::ok("OTP verified", SignupToken { token }))
}

#[derive(Deserialize)]
pub struct AddEmailRequest {
    pub device_id: String,
    pub token: String,
    pub email: String,
}

/// POST /auth/signup/email
pub async fn add_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddEmailRequest>,
) -> Result<Json<ApiResponse<SignupToken>>, ApiError> {
    validate::require("device_id", &req.device_id)?;
    validate::require("token", &req.token)?;
    validate::email(&req.email)?;

    let token = blocking(&state, move |s| {
        s.signup.add_email(&req.device_id, &req.token, &req.email)
    })
    .await?;

    Ok(ApiResponse::ok("Email added", SignupToken { token }))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub device_id: String,
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub user: UserView,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// POST /auth/signup/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<RegisteredUser>>, ApiError> {
    validate::require("device_id", &req.device_id)?;
    validate::require("token", &req.token)?;
    validate::password(&req.password).map_err(ApiError::ValidationError)?;

    let outcome = blocking(&state, move |s| {
        s.signup.finalize(&req.device_id, &req.token, &req.password)
    })
    .await?;

    Ok(ApiResponse::ok(
        "Account created",
        RegisteredUser {
            user: (&outcome.user).into(),
            tokens: outcome.tokens,
        },
    ))
}
