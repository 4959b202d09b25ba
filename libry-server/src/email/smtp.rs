//! SMTP-based email sender for production

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};

use super::{EmailError, EmailSender};

/// Configuration for SMTP email sending
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    /// 465 for implicit TLS
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

impl SmtpConfig {
    /// Read `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` and `SMTP_FROM_EMAIL`
    /// (all required) plus optional `SMTP_PORT` and `SMTP_FROM_NAME`.
    pub fn from_env() -> Option<Self> {
        fn get_env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        Some(Self {
            host: get_env("SMTP_HOST")?,
            username: get_env("SMTP_USERNAME")?,
            password: get_env("SMTP_PASSWORD")?,
            from_email: get_env("SMTP_FROM_EMAIL")?,
            port: get_env("SMTP_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(465),
            from_name: get_env("SMTP_FROM_NAME"),
        })
    }
}

/// Delivers account mail through an SMTP relay
pub struct SmtpEmailSender {
    transport: SmtpTransport,
    from: String,
}

impl SmtpEmailSender {
    pub fn new(config: SmtpConfig) -> Result<Self, EmailError> {
        let creds = Credentials::new(config.username, config.password);

        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| EmailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(creds)
            .build();

        transport
            .test_connection()
            .map_err(|e| EmailError::Transport(format!("connection test failed: {}", e)))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP connection established");

        let from = match config.from_name {
            Some(name) => format!("{} <{}>", name, config.from_email),
            None => config.from_email,
        };

        Ok(Self { transport, from })
    }

    fn send(&self, to: &str, subject: &str, body: String) -> Result<(), EmailError> {
        let address_error = |address: &str, e: lettre::address::AddressError| EmailError::Address {
            address: address.to_string(),
            reason: e.to_string(),
        };

        let message = Message::builder()
            .from(self.from.parse().map_err(|e| address_error(&self.from, e))?)
            .to(to.parse().map_err(|e| address_error(to, e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport
            .send(&message)
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(())
    }
}

impl EmailSender for SmtpEmailSender {
    fn send_password_reset(&self, email: &str, code: &str) -> Result<(), EmailError> {
        let body = format!(
            "Your Libry password reset code is: {}\n\n\
             Enter it in the app together with your new password.\n\n\
             If you didn't ask to reset your password, you can ignore this email.",
            code
        );

        self.send(email, "Reset your Libry password", body)?;
        tracing::info!(email = %email, "Password reset email sent");
        Ok(())
    }

    fn send_password_changed(&self, email: &str) -> Result<(), EmailError> {
        let body = "The password for your Libry account was just changed.\n\n\
                    If this wasn't you, reset your password right away."
            .to_string();

        self.send(email, "Your Libry password was changed", body)?;
        tracing::info!(email = %email, "Password changed email sent");
        Ok(())
    }
}
