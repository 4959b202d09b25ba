//! Transactional email for account recovery

pub mod console;
pub mod smtp;

pub use console::ConsoleEmailSender;
pub use smtp::{SmtpConfig, SmtpEmailSender};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound account mail
pub trait EmailSender: Send + Sync {
    /// Deliver a password reset code
    fn send_password_reset(&self, email: &str, code: &str) -> Result<(), EmailError>;

    /// Tell the account owner their password was changed
    fn send_password_changed(&self, email: &str) -> Result<(), EmailError>;
}
