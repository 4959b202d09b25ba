//! Libry identity service
//!
//! Phone-first signup for a social app: a four-step signup session (phone
//! OTP, email, password) that ends in a confirmed identity at the identity
//! provider and a local user record, plus sign-in, password reset, email
//! verification and a small follow graph.

pub mod account;
pub mod authenticator;
pub mod config;
pub mod crypto;
pub mod email;
pub mod error;
pub mod identity;
pub mod janitor;
pub mod routes;
pub mod signup;
pub mod social;
pub mod state;
pub mod store;
pub mod validate;
pub mod verify;

pub use config::{load_or_generate_keypair, Config, SignupPolicy};
pub use email::{ConsoleEmailSender, EmailSender, SmtpConfig, SmtpEmailSender};
pub use error::{ApiError, ErrorCode};
pub use identity::{IdentityProvider, IdentitySettings, LocalIdentityProvider};
pub use state::AppState;
pub use store::{
    CredentialStore, InMemoryCredentialStore, InMemorySignupSessionStore, InMemoryUserDirectory,
    SignupSessionStore, SqliteStore, UserDirectory,
};
pub use verify::{CheckOutcome, ConsoleVerifier, ProviderError, TwilioConfig, TwilioVerifier, Verifier};
