//! Libry Core Library
//!
//! Key material and token format shared by the identity provider that
//! issues access tokens and the services that validate them:
//! - Ed25519 signing keys identified by a key id
//! - Published key sets so verifiers can follow key rotation
//! - Compact signed access tokens with issuer/audience/expiry checks

pub mod error;
pub mod keys;
pub mod token;

pub use error::Error;
pub use keys::{Jwk, KeyPair, KeySet, PublicKey};
pub use token::{AccessClaims, AccessToken, TokenUse, Validation};

/// Result type for libry-core operations
pub type Result<T> = std::result::Result<T, Error>;
