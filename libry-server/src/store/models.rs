//! Data models for storage

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Progress marker of a signup session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created, OTP delivery not yet confirmed
    Init,
    /// OTP handed to the verification provider
    OtpSent,
    OtpVerified,
    /// Last OTP attempt was rejected; may be retried
    OtpFailed,
    EmailAdded,
    /// Never persisted: finalize deletes the session
    AccountCreated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Init => "INIT",
            SessionStatus::OtpSent => "OTP_SENT",
            SessionStatus::OtpVerified => "OTP_VERIFIED",
            SessionStatus::OtpFailed => "OTP_FAILED",
            SessionStatus::EmailAdded => "EMAIL_ADDED",
            SessionStatus::AccountCreated => "ACCOUNT_CREATED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(SessionStatus::Init),
            "OTP_SENT" => Some(SessionStatus::OtpSent),
            "OTP_VERIFIED" => Some(SessionStatus::OtpVerified),
            "OTP_FAILED" => Some(SessionStatus::OtpFailed),
            "EMAIL_ADDED" => Some(SessionStatus::EmailAdded),
            "ACCOUNT_CREATED" => Some(SessionStatus::AccountCreated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhoneVerification {
    NotVerified,
    Verified,
}

impl PhoneVerification {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhoneVerification::NotVerified => "NOT_VERIFIED",
            PhoneVerification::Verified => "VERIFIED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NOT_VERIFIED" => Some(PhoneVerification::NotVerified),
            "VERIFIED" => Some(PhoneVerification::Verified),
            _ => None,
        }
    }
}

/// Unique signup session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignupSessionId(pub String);

impl std::fmt::Display for SignupSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One in-flight signup attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupSession {
    pub id: SignupSessionId,
    /// Current bearer credential; replaced after every successful step
    pub token: String,
    pub device_id: String,
    pub phone_number: String,
    pub phone_number_verified: PhoneVerification,
    /// Snapshot taken at creation; never shown to the caller
    pub is_phone_number_taken: bool,
    pub email: Option<String>,
    pub status: SessionStatus,
    pub otp_try_count: u32,
    pub expires_in: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Write version for compare-and-swap saves; 0 until first persisted
    pub version: u64,
}

impl SignupSession {
    /// A fresh session in `INIT`, living for `ttl` from now
    pub fn new(
        id: SignupSessionId,
        token: String,
        device_id: &str,
        phone_number: &str,
        is_phone_number_taken: bool,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            token,
            device_id: device_id.to_string(),
            phone_number: phone_number.to_string(),
            phone_number_verified: PhoneVerification::NotVerified,
            is_phone_number_taken,
            email: None,
            status: SessionStatus::Init,
            otp_try_count: 0,
            expires_in: now + ttl,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_in
    }
}

/// Unique local user identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A local user record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub email: String,
    pub email_verified: bool,
    pub phone_number: String,
    pub phone_number_verified: bool,
    /// External identity subject id
    pub subject: String,
    pub user_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a local user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub phone_number: String,
    pub subject: String,
    pub user_confirmed: bool,
}

/// Attributes that can be marked verified on an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifiedAttribute {
    EmailVerified,
    PhoneNumberVerified,
}

impl VerifiedAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifiedAttribute::EmailVerified => "email_verified",
            VerifiedAttribute::PhoneNumberVerified => "phone_number_verified",
        }
    }
}

/// Optional profile updates
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Substring filters for user search; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub exclude: Option<UserId>,
}

impl UserSearch {
    pub fn matches(&self, user: &User) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            needle
                .as_ref()
                .map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
        }

        if self.exclude.as_ref() == Some(&user.id) {
            return false;
        }
        let name_ok = match &self.name {
            Some(_) => user.name.as_deref().is_some_and(|n| contains(n, &self.name)),
            None => true,
        };
        name_ok && contains(&user.email, &self.email) && contains(&user.phone_number, &self.phone_number)
    }
}

/// The identity provider's own record of an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub subject: String,
    /// Login name at the provider (the phone number)
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub phone_number: String,
    pub confirmed: bool,
    pub email_verified: bool,
    pub phone_number_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// An issued refresh token
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub token: String,
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

/// A pending password reset code
#[derive(Debug, Clone)]
pub struct ResetCode {
    pub subject: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}
