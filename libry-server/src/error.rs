//! Service error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::identity::IdentityError;
use crate::verify::ProviderError;

/// Stable, machine-readable error codes returned to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidToken,
    InvalidDeviceId,
    PhoneNumberExists,
    InvalidOtp,
    OtpRetryExceed,
    EmailTaken,
    SessionActive,
    SessionConflict,
    NotAllowed,
    UserNotFound,
    PasswordInvalid,
    InvalidRefresh,
    InvalidVerificationLink,
    InvalidResetCode,
    Unauthorized,
    ValidationError,
    Conflict,
    ProviderError,
    IdentityProviderError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::InvalidDeviceId => "INVALID_DEVICE_ID",
            ErrorCode::PhoneNumberExists => "PHONE_NUMBER_EXISTS",
            ErrorCode::InvalidOtp => "INVALID_OTP",
            ErrorCode::OtpRetryExceed => "OTP_RETRY_EXCEED",
            ErrorCode::EmailTaken => "EMAIL_TAKEN",
            ErrorCode::SessionActive => "SESSION_ACTIVE",
            ErrorCode::SessionConflict => "SESSION_CONFLICT",
            ErrorCode::NotAllowed => "NOT_ALLOWED",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::PasswordInvalid => "PASSWORD_INVALID",
            ErrorCode::InvalidRefresh => "INVALID_REFRESH",
            ErrorCode::InvalidVerificationLink => "INVALID_VERIFICATION_LINK",
            ErrorCode::InvalidResetCode => "INVALID_RESET_CODE",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::IdentityProviderError => "IDENTITY_PROVIDER_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid session token")]
    InvalidToken,

    #[error("Invalid device id")]
    InvalidDeviceId,

    #[error("Phone number taken")]
    PhoneNumberExists,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("OTP retry exceeds")]
    OtpRetryExceed,

    #[error("Email taken")]
    EmailTaken,

    #[error("Previous sign up is active, try again")]
    SessionActive,

    #[error("Signup session was modified concurrently")]
    SessionConflict,

    #[error("Not allowed")]
    NotAllowed,

    #[error("User not found")]
    UserNotFound,

    #[error("Username or password invalid")]
    PasswordInvalid,

    #[error("Invalid refresh token")]
    InvalidRefresh,

    #[error("Invalid email verification link")]
    InvalidVerificationLink,

    #[error("Invalid password reset code")]
    InvalidResetCode,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Verification provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidToken => ErrorCode::InvalidToken,
            ApiError::InvalidDeviceId => ErrorCode::InvalidDeviceId,
            ApiError::PhoneNumberExists => ErrorCode::PhoneNumberExists,
            ApiError::InvalidOtp => ErrorCode::InvalidOtp,
            ApiError::OtpRetryExceed => ErrorCode::OtpRetryExceed,
            ApiError::EmailTaken => ErrorCode::EmailTaken,
            ApiError::SessionActive => ErrorCode::SessionActive,
            ApiError::SessionConflict => ErrorCode::SessionConflict,
            ApiError::NotAllowed => ErrorCode::NotAllowed,
            ApiError::UserNotFound => ErrorCode::UserNotFound,
            ApiError::PasswordInvalid => ErrorCode::PasswordInvalid,
            ApiError::InvalidRefresh => ErrorCode::InvalidRefresh,
            ApiError::InvalidVerificationLink => ErrorCode::InvalidVerificationLink,
            ApiError::InvalidResetCode => ErrorCode::InvalidResetCode,
            ApiError::Unauthorized => ErrorCode::Unauthorized,
            ApiError::ValidationError(_) => ErrorCode::ValidationError,
            ApiError::Conflict(_) => ErrorCode::Conflict,
            ApiError::Provider(_) => ErrorCode::ProviderError,
            ApiError::IdentityProvider(_) => ErrorCode::IdentityProviderError,
            ApiError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidToken
            | ApiError::InvalidDeviceId
            | ApiError::InvalidOtp
            | ApiError::SessionActive
            | ApiError::PasswordInvalid
            | ApiError::InvalidVerificationLink
            | ApiError::InvalidResetCode => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PhoneNumberExists
            | ApiError::OtpRetryExceed
            | ApiError::EmailTaken
            | ApiError::NotAllowed => StatusCode::FORBIDDEN,
            ApiError::SessionConflict | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidRefresh | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) | ApiError::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidPassword(msg) => ApiError::ValidationError(msg),
            IdentityError::InvalidRefreshToken => ApiError::InvalidRefresh,
            IdentityError::Store(inner) => inner,
            other => ApiError::IdentityProvider(other.to_string()),
        }
    }
}

/// Diagnostic text attached to error responses; only surfaced to clients when
/// the development-mode middleware is installed.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Upstream and internal failures never leak their payloads
        let reason = match &self {
            ApiError::ValidationError(msg) => msg.clone(),
            ApiError::Provider(e) => {
                tracing::error!(error = %e, "Verification provider error");
                "Verification provider error".to_string()
            }
            ApiError::IdentityProvider(msg) => {
                tracing::error!(error = %msg, "Identity provider error");
                "Identity provider error".to_string()
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({ "success": false, "code": code, "reason": reason });
        let mut response = (status, axum::Json(body)).into_response();
        response
            .extensions_mut()
            .insert(ErrorDetail(format!("{:?}", self)));
        response
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
