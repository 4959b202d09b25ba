//! Signed access tokens
//!
//! Tokens use the compact JWS layout `header.claims.signature`, each part
//! base64url without padding, signed with Ed25519 (`alg = EdDSA`). The header
//! names the signing key so a verifier can resolve it from a [`KeySet`].

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, KeyPair, KeySet, Result};

const ALGORITHM: &str = "EdDSA";

/// What a token may be used for. Only access tokens are issued, so a
/// `token_use` of anything else fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
    kid: String,
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Issuer
    pub iss: String,
    /// Audience (the client id the token was issued to)
    pub aud: String,
    /// Subject (external identity id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub token_use: TokenUse,
    /// Provider-side username
    pub username: String,
}

impl AccessClaims {
    /// Build access claims valid for `validity` from now
    pub fn new(
        issuer: &str,
        audience: &str,
        subject: &str,
        username: &str,
        validity: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            iss: issuer.to_string(),
            aud: audience.to_string(),
            sub: subject.to_string(),
            exp: (now + validity).timestamp(),
            iat: now.timestamp(),
            token_use: TokenUse::Access,
            username: username.to_string(),
        }
    }
}

/// Checks applied by [`AccessToken::verify`]
#[derive(Debug, Clone)]
pub struct Validation {
    pub issuer: String,
    pub audience: String,
    /// When false, an expired token still verifies (used for refresh)
    pub check_expiry: bool,
    /// Clock skew tolerated on `exp`, in seconds
    pub leeway: i64,
}

impl Validation {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            check_expiry: true,
            leeway: 30,
        }
    }

    pub fn allow_expired(mut self) -> Self {
        self.check_expiry = false;
        self
    }
}

/// A signed access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    encoded: String,
    claims: AccessClaims,
}

impl AccessToken {
    /// Sign `claims` with `key`
    pub fn issue(claims: AccessClaims, key: &KeyPair) -> Result<Self> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
            kid: key.kid().to_string(),
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);

        let message = format!("{}.{}", header_b64, claims_b64);
        let signature = URL_SAFE_NO_PAD.encode(key.sign(message.as_bytes()));

        Ok(Self {
            encoded: format!("{}.{}", message, signature),
            claims,
        })
    }

    /// Verify signature and claims against the issuer's key set
    pub fn verify(encoded: &str, keys: &KeySet, validation: &Validation) -> Result<Self> {
        let (header_b64, claims_b64, sig_b64) = split(encoded)?;

        let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64)?)?;
        if header.alg != ALGORITHM {
            return Err(Error::UnsupportedAlgorithm(header.alg));
        }

        let key = keys.find(&header.kid)?;
        let signature = URL_SAFE_NO_PAD.decode(sig_b64)?;
        key.verify(format!("{}.{}", header_b64, claims_b64).as_bytes(), &signature)?;

        let claims: AccessClaims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64)?)?;

        if claims.iss != validation.issuer {
            return Err(Error::IssuerMismatch {
                expected: validation.issuer.clone(),
                actual: claims.iss,
            });
        }
        if claims.aud != validation.audience {
            return Err(Error::AudienceMismatch {
                expected: validation.audience.clone(),
                actual: claims.aud,
            });
        }
        if validation.check_expiry && Utc::now().timestamp() > claims.exp + validation.leeway {
            return Err(Error::TokenExpired);
        }

        Ok(Self {
            encoded: encoded.to_string(),
            claims,
        })
    }

    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.claims.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn into_encoded(self) -> String {
        self.encoded
    }
}

fn split(encoded: &str) -> Result<(&str, &str, &str)> {
    let mut parts = encoded.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) => Ok((h, c, s)),
        _ => Err(Error::MalformedToken("expected 3 parts".into())),
    }
}
