//! Verification provider adapter
//!
//! Delivers one-time codes to phone numbers and verification links to email
//! addresses, and checks what the user sends back. The provider keeps the
//! pending codes; nothing is stored on our side.

pub mod console;
pub mod twilio;

pub use console::ConsoleVerifier;
pub use twilio::{TwilioConfig, TwilioVerifier};

use thiserror::Error;

/// Verdict on a submitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Approved,
    Denied,
}

impl CheckOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, CheckOutcome::Approved)
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Outbound verification capability
///
/// Implementations block on network I/O; async callers run them on the
/// blocking pool.
pub trait Verifier: Send + Sync {
    /// Send a one-time code to a phone number
    fn send_code(&self, phone_number: &str) -> Result<(), ProviderError>;

    /// Check a code previously sent to `phone_number`
    fn check_code(&self, phone_number: &str, code: &str) -> Result<CheckOutcome, ProviderError>;

    /// Send an email verification link
    fn send_link(&self, email: &str) -> Result<(), ProviderError>;

    /// Check the code carried by an email verification link
    fn check_link(&self, email: &str, code: &str) -> Result<CheckOutcome, ProviderError>;
}
