//! Service configuration

use std::path::Path;

use libry_core::KeyPair;

use crate::email::SmtpConfig;
use crate::verify::TwilioConfig;

/// Policy knobs for the signup protocol
#[derive(Debug, Clone)]
pub struct SignupPolicy {
    /// Lifetime of a signup session, in minutes
    pub session_ttl_minutes: i64,
    /// Failed OTP attempts allowed before the session is destroyed
    pub max_otp_attempts: u32,
}

impl Default for SignupPolicy {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 10,
            max_otp_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Development mode: console verifier, fixed OTP, error details in responses
    pub dev: bool,

    /// SQLite database path; in-memory stores when unset
    pub database_path: Option<String>,

    /// Where the identity provider's signing seed is kept
    pub key_file: String,

    /// Issuer claim of access tokens
    pub issuer: String,

    /// Client id tokens are issued to (audience claim)
    pub client_id: String,

    /// Externally visible base URL, used in email verification links
    pub public_base_url: String,

    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,

    pub signup: SignupPolicy,

    pub twilio: Option<TwilioConfig>,
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            dev: false,
            database_path: None,
            key_file: "libry-signing.key".to_string(),
            issuer: "http://localhost:3000".to_string(),
            client_id: "libry".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 30,
            signup: SignupPolicy::default(),
            twilio: None,
            smtp: None,
        }
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    get_env(key).and_then(|s| s.parse().ok())
}

impl Config {
    /// Build configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let dev = get_env("DEV")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        let port = parse_env("PORT").unwrap_or(defaults.port);
        let public_base_url =
            get_env("PUBLIC_BASE_URL").unwrap_or_else(|| format!("http://localhost:{}", port));

        Self {
            port,
            dev,
            database_path: get_env("DATABASE_PATH"),
            key_file: get_env("KEY_FILE").unwrap_or(defaults.key_file),
            issuer: get_env("ISSUER").unwrap_or_else(|| public_base_url.clone()),
            client_id: get_env("CLIENT_ID").unwrap_or(defaults.client_id),
            public_base_url,
            access_token_ttl_minutes: parse_env("ACCESS_TOKEN_TTL_MINUTES")
                .unwrap_or(defaults.access_token_ttl_minutes),
            refresh_token_ttl_days: parse_env("REFRESH_TOKEN_TTL_DAYS")
                .unwrap_or(defaults.refresh_token_ttl_days),
            signup: SignupPolicy {
                session_ttl_minutes: parse_env("SIGNUP_SESSION_TTL_MINUTES")
                    .unwrap_or(defaults.signup.session_ttl_minutes),
                max_otp_attempts: parse_env("SIGNUP_MAX_OTP_ATTEMPTS")
                    .unwrap_or(defaults.signup.max_otp_attempts),
            },
            twilio: TwilioConfig::from_env(),
            smtp: SmtpConfig::from_env(),
        }
    }
}

/// Load the signing key from `path`, generating and saving one if missing
pub fn load_or_generate_keypair(path: impl AsRef<Path>) -> std::io::Result<KeyPair> {
    let path = path.as_ref();

    if path.exists() {
        let seed = std::fs::read(path)?;
        return KeyPair::from_seed(&seed)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()));
    }

    let keypair = KeyPair::generate();
    std::fs::write(path, keypair.seed())?;
    tracing::info!(path = %path.display(), kid = %keypair.kid(), "Generated new signing key");
    Ok(keypair)
}
