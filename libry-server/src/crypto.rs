//! Cryptographic utilities for the service

use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

/// Default bcrypt cost factor
pub const BCRYPT_COST: u32 = 12;

/// Hash a password with bcrypt
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Verify a password against a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

/// Generate an opaque signup session token.
///
/// SHA-256 over 20 random bytes followed by the device id, hex encoded.
pub fn generate_session_token(device_id: &str) -> String {
    let mut seed = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut seed);

    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(device_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a random 6-digit code (password reset)
pub fn generate_reset_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100000..1000000);
    code.to_string()
}

/// Generate a random opaque secret (ids, refresh tokens)
pub fn generate_secret() -> String {
    uuid::Uuid::new_v4().to_string()
}
