//! Console-based email sender for development

use super::{EmailError, EmailSender};

/// Writes account mail to the log instead of delivering it
#[derive(Debug, Default)]
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    pub fn new() -> Self {
        Self
    }
}

impl EmailSender for ConsoleEmailSender {
    fn send_password_reset(&self, email: &str, code: &str) -> Result<(), EmailError> {
        println!();
        println!("========================================");
        println!("  PASSWORD RESET CODE FOR: {}", email);
        println!("  CODE: {}", code);
        println!("========================================");
        println!();

        tracing::info!(email = %email, code = %code, "Password reset code sent");
        Ok(())
    }

    fn send_password_changed(&self, email: &str) -> Result<(), EmailError> {
        tracing::info!(email = %email, "Password changed notice sent");
        Ok(())
    }
}
