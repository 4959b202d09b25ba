//! Error types for libry-core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Unknown key id: {0}")]
    UnknownKey(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch { expected: String, actual: String },

    #[error("Audience mismatch: expected {expected}, got {actual}")]
    AudienceMismatch { expected: String, actual: String },

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}
