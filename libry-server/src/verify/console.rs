//! Development verifier: logs instead of sending

use reqwest::Url;

use super::{CheckOutcome, ProviderError, Verifier};

/// The only code the console verifier approves
pub const DEV_CODE: &str = "12345";

/// Verifier for development mode
///
/// Nothing leaves the process; every code is [`DEV_CODE`].
pub struct ConsoleVerifier {
    public_base_url: String,
}

impl ConsoleVerifier {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The link a real provider would have emailed
    pub fn link_for(&self, email: &str) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            &format!("{}/auth/verify/email", self.public_base_url),
            &[("email", email), ("token", DEV_CODE)],
        )
        .map_err(|e| ProviderError::Transport(format!("invalid public base url: {}", e)))
    }

    fn check(code: &str) -> CheckOutcome {
        if code == DEV_CODE {
            CheckOutcome::Approved
        } else {
            CheckOutcome::Denied
        }
    }
}

impl Verifier for ConsoleVerifier {
    fn send_code(&self, phone_number: &str) -> Result<(), ProviderError> {
        tracing::info!(phone_number = %phone_number, code = DEV_CODE, "DEV: verification code");
        Ok(())
    }

    fn check_code(&self, phone_number: &str, code: &str) -> Result<CheckOutcome, ProviderError> {
        let outcome = Self::check(code);
        tracing::debug!(phone_number = %phone_number, ?outcome, "DEV: code checked");
        Ok(outcome)
    }

    fn send_link(&self, email: &str) -> Result<(), ProviderError> {
        let link = self.link_for(email)?;
        tracing::info!(email = %email, link = %link, "DEV: verification link");
        Ok(())
    }

    fn check_link(&self, email: &str, code: &str) -> Result<CheckOutcome, ProviderError> {
        let outcome = Self::check(code);
        tracing::debug!(email = %email, ?outcome, "DEV: link checked");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fixed_code_approved() {
        let verifier = ConsoleVerifier::new("http://localhost:3000");

        assert_eq!(
            verifier.check_code("+94770000001", "12345").unwrap(),
            CheckOutcome::Approved
        );
        assert_eq!(
            verifier.check_code("+94770000001", "54321").unwrap(),
            CheckOutcome::Denied
        );
        assert!(!verifier.check_link("a@x.com", "").unwrap().is_approved());
    }

    #[test]
    fn test_link_format() {
        let verifier = ConsoleVerifier::new("http://localhost:3000/");
        assert_eq!(
            verifier.link_for("a@x.com").unwrap().as_str(),
            "http://localhost:3000/auth/verify/email?email=a%40x.com&token=12345"
        );
    }

    #[test]
    fn test_link_encodes_plus_addresses() {
        let verifier = ConsoleVerifier::new("http://localhost:3000");
        let link = verifier.link_for("a+tag@x.com").unwrap();

        assert!(link.as_str().contains("email=a%2Btag%40x.com"));
        let email = link
            .query_pairs()
            .find(|(k, _)| k == "email")
            .map(|(_, v)| v.into_owned());
        assert_eq!(email.as_deref(), Some("a+tag@x.com"));
    }

    #[test]
    fn test_bad_base_url_fails_send() {
        let verifier = ConsoleVerifier::new("not a url");
        assert!(matches!(
            verifier.send_link("a@x.com"),
            Err(ProviderError::Transport(_))
        ));
    }
}
