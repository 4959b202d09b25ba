//! Signing keys and published key sets
//!
//! Access tokens are signed with Ed25519. Each key carries a key id (`kid`)
//! derived from its public bytes so verifiers can pick the right key out of
//! a published [`KeySet`] during rotation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Length of the base64url key id
const KEY_ID_LEN: usize = 16;

fn derive_key_id(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut kid = URL_SAFE_NO_PAD.encode(digest);
    kid.truncate(KEY_ID_LEN);
    kid
}

/// A public verification key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    kid: String,
    inner: VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKey("public key must be 32 bytes".into()))?;
        let inner =
            VerifyingKey::from_bytes(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(Self {
            kid: derive_key_id(&inner),
            inner,
        })
    }

    /// Key id
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Encode the raw key as base64url (no padding)
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.inner.as_bytes())
    }

    /// Verify a detached signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| Error::SignatureVerificationFailed)?;
        let signature = Signature::from_bytes(&sig_bytes);
        self.inner
            .verify(message, &signature)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    /// JWK representation of this key
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            alg: "EdDSA".to_string(),
            key_use: "sig".to_string(),
            kid: self.kid.clone(),
            x: self.to_base64(),
        }
    }
}

/// A signing keypair
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Restore a keypair from its 32-byte seed
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Error::InvalidKey("seed must be 32 bytes".into()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying = signing_key.verifying_key();
        let public = PublicKey {
            kid: derive_key_id(&verifying),
            inner: verifying,
        };
        Self {
            signing_key,
            public,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn kid(&self) -> &str {
        self.public.kid()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }

    /// Seed bytes, for persisting the key
    pub fn seed(&self) -> &[u8; 32] {
        self.signing_key.as_bytes()
    }
}

/// A single published key (RFC 8037 OKP form)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub kid: String,
    pub x: String,
}

impl Jwk {
    /// Decode into a usable public key, checking the key type and curve
    pub fn to_public_key(&self) -> Result<PublicKey> {
        if self.kty != "OKP" || self.crv != "Ed25519" {
            return Err(Error::UnsupportedAlgorithm(format!("{}/{}", self.kty, self.crv)));
        }
        let bytes = URL_SAFE_NO_PAD.decode(&self.x)?;
        let key = PublicKey::from_bytes(&bytes)?;
        if key.kid() != self.kid {
            return Err(Error::InvalidKey(format!("kid {} does not match key", self.kid)));
        }
        Ok(key)
    }
}

/// The set of keys an issuer currently signs with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    pub keys: Vec<Jwk>,
}

impl KeySet {
    pub fn new(keys: impl IntoIterator<Item = PublicKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| k.to_jwk()).collect(),
        }
    }

    /// Look up a key by id
    pub fn find(&self, kid: &str) -> Result<PublicKey> {
        self.keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| Error::UnknownKey(kid.to_string()))?
            .to_public_key()
    }
}
