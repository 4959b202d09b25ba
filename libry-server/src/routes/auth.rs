//! Sign-in, token refresh, password reset and email verification

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::ApiResponse;
use crate::error::ApiError;
use crate::identity::{RefreshedToken, TokenPair};
use crate::social::UserView;
use crate::state::{blocking, AppState};
use crate::validate;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password: String,
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, ApiError> {
    if let Some(email) = &req.email {
        validate::email(email)?;
    }
    if let Some(phone) = &req.phone_number {
        validate::phone_number(phone)?;
    }
    validate::require("password", &req.password)?;

    let tokens = blocking(&state, move |s| {
        s.account
            .login(req.email.as_deref(), req.phone_number.as_deref(), &req.password)
    })
    .await?;

    Ok(ApiResponse::ok("Logged in", tokens))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshedToken>>, ApiError> {
    validate::require("accessToken", &req.access_token)?;
    validate::require("refreshToken", &req.refresh_token)?;

    let token = blocking(&state, move |s| {
        s.account.refresh(&req.access_token, &req.refresh_token)
    })
    .await?;

    Ok(ApiResponse::ok("Token refreshed", token))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    validate::email(&req.email)?;

    blocking(&state, move |s| s.account.send_reset_password(&req.email)).await?;

    Ok(ApiResponse::ok("Password reset code sent", ()))
}

#[derive(Deserialize)]
pub struct NewPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

/// POST /auth/new-password
pub async fn new_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    validate::email(&req.email)?;
    validate::require("code", &req.code)?;

    blocking(&state, move |s| {
        s.account
            .confirm_new_password(&req.email, &req.code, &req.password)
    })
    .await?;

    Ok(ApiResponse::ok("Password changed", ()))
}

#[derive(Deserialize)]
pub struct VerifyEmailQuery {
    pub email: String,
    pub token: String,
}

/// GET /auth/verify/email
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let user = blocking(&state, move |s| {
        s.account.validate_email(&query.email, &query.token)
    })
    .await?;

    Ok(ApiResponse::ok("Email verified", (&user).into()))
}

#[derive(Deserialize)]
pub struct DeleteUserRequest {
    pub phone_number: String,
}

/// DELETE /auth (development mode only)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteUserRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    validate::phone_number(&req.phone_number)?;

    blocking(&state, move |s| s.account.delete_user(&req.phone_number)).await?;

    Ok(ApiResponse::ok("User deleted", ()))
}
