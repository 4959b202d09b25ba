//! Identity provider adapter
//!
//! The identity provider owns credentials: it registers identities, confirms
//! them, verifies attributes and issues signed access tokens. Local user
//! records live in the [`UserDirectory`](crate::store::UserDirectory) and are
//! kept in step by the callers.

pub mod local;

pub use local::{IdentitySettings, LocalIdentityProvider};

use libry_core::{KeySet, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::email::EmailError;
use crate::error::ApiError;
use crate::store::VerifiedAttribute;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Password rejected by the provider's policy
    #[error("{0}")]
    InvalidPassword(String),

    #[error("username already exists")]
    UsernameExists,

    #[error("identity not found")]
    IdentityNotFound,

    /// Wrong password
    #[error("incorrect username or password")]
    NotAuthorized,

    #[error("identity is not confirmed")]
    NotConfirmed,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("invalid verification code")]
    CodeMismatch,

    #[error("token error: {0}")]
    Token(#[from] libry_core::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("failed to deliver code: {0}")]
    Delivery(#[from] EmailError),

    #[error(transparent)]
    Store(#[from] ApiError),
}

/// A registered identity at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Stable subject id; the `sub` claim of issued tokens
    pub subject: String,
    pub username: String,
}

/// Tokens returned by a successful authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// A fresh access token obtained with a refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// Identity provider capability
///
/// None of the admin operations are idempotent: repeating `register` or
/// `admin_delete` fails the second time.
pub trait IdentityProvider: Send + Sync {
    /// Create an unconfirmed identity; the phone number is the username
    fn register(
        &self,
        email: &str,
        phone_number: &str,
        password: &str,
    ) -> Result<ExternalIdentity, IdentityError>;

    /// Confirm an identity without the provider's own confirmation flow
    fn admin_confirm(&self, subject: &str) -> Result<(), IdentityError>;

    fn admin_verify_attribute(
        &self,
        subject: &str,
        attribute: VerifiedAttribute,
    ) -> Result<(), IdentityError>;

    /// Password authentication for a confirmed identity
    fn authenticate(&self, subject: &str, password: &str) -> Result<TokenPair, IdentityError>;

    /// Exchange a refresh token for a new access token. The access token may
    /// be expired but must carry a valid signature and the grant's subject.
    fn refresh(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<RefreshedToken, IdentityError>;

    fn admin_delete(&self, subject: &str) -> Result<(), IdentityError>;

    /// Start a password reset; the code goes to the identity's email
    fn forgot_password(&self, subject: &str) -> Result<(), IdentityError>;

    /// Complete a password reset
    fn confirm_password(
        &self,
        subject: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError>;

    /// Public keys that verify issued access tokens
    fn key_set(&self) -> KeySet;

    /// Issuer and audience checks for issued access tokens
    fn validation(&self) -> Validation;
}
