//! Twilio Verify v2 adapter

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{CheckOutcome, ProviderError, Verifier};

const DEFAULT_BASE_URL: &str = "https://verify.twilio.com/v2";

/// Configuration for the Twilio Verify service
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Verify service SID (`VA…`)
    pub service_sid: String,
    /// Delivery channel for phone codes, usually `sms`
    pub channel: String,
    pub base_url: String,
}

impl TwilioConfig {
    /// Read `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN` and
    /// `TWILIO_VERIFICATION_SERVICE_SID` (all required), plus optional
    /// `TWILIO_CHANNEL` and `TWILIO_BASE_URL`.
    pub fn from_env() -> Option<Self> {
        fn get_env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        Some(Self {
            account_sid: get_env("TWILIO_ACCOUNT_SID")?,
            auth_token: get_env("TWILIO_AUTH_TOKEN")?,
            service_sid: get_env("TWILIO_VERIFICATION_SERVICE_SID")?,
            channel: get_env("TWILIO_CHANNEL").unwrap_or_else(|| "sms".to_string()),
            base_url: get_env("TWILIO_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

/// The part of a verification resource we act on
#[derive(Debug, Deserialize)]
struct VerificationResource {
    status: String,
}

/// Verifier backed by Twilio Verify
///
/// A blocking client is built per request, on the calling (blocking pool)
/// thread, so the verifier itself can live inside the async runtime.
pub struct TwilioVerifier {
    config: TwilioConfig,
}

impl TwilioVerifier {
    pub fn new(config: TwilioConfig) -> Self {
        Self { config }
    }

    fn client(&self) -> Result<Client, ProviderError> {
        Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    fn url(&self, resource: &str) -> String {
        format!(
            "{}/Services/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.service_sid,
            resource
        )
    }

    fn post(&self, resource: &str, form: &[(&str, &str)]) -> Result<Response, ProviderError> {
        self.client()?
            .post(self.url(resource))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(form)
            .send()
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    /// Parse a success body; upstream errors never pass through unparsed
    fn read(response: Response) -> Result<VerificationResource, ProviderError> {
        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("no message")
                .to_string();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_value(body).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }

    fn start(&self, to: &str, channel: &str) -> Result<(), ProviderError> {
        let response = self.post("Verifications", &[("To", to), ("Channel", channel)])?;
        let verification = Self::read(response)?;
        tracing::debug!(to = %to, channel = %channel, status = %verification.status, "Verification started");
        Ok(())
    }

    fn check(&self, to: &str, code: &str) -> Result<CheckOutcome, ProviderError> {
        let response = self.post("VerificationCheck", &[("To", to), ("Code", code)])?;

        // No pending verification for this destination (expired or already used)
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(CheckOutcome::Denied);
        }

        let verification = Self::read(response)?;
        Ok(outcome_for(&verification.status))
    }
}

fn outcome_for(status: &str) -> CheckOutcome {
    if status == "approved" {
        CheckOutcome::Approved
    } else {
        CheckOutcome::Denied
    }
}

impl Verifier for TwilioVerifier {
    fn send_code(&self, phone_number: &str) -> Result<(), ProviderError> {
        self.start(phone_number, &self.config.channel)
    }

    fn check_code(&self, phone_number: &str, code: &str) -> Result<CheckOutcome, ProviderError> {
        self.check(phone_number, code)
    }

    fn send_link(&self, email: &str) -> Result<(), ProviderError> {
        self.start(email, "email")
    }

    fn check_link(&self, email: &str, code: &str) -> Result<CheckOutcome, ProviderError> {
        self.check(email, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            service_sid: "VA456".into(),
            channel: "sms".into(),
            base_url: "https://verify.example.test/v2/".into(),
        }
    }

    #[test]
    fn test_resource_urls() {
        let verifier = TwilioVerifier::new(config());
        assert_eq!(
            verifier.url("VerificationCheck"),
            "https://verify.example.test/v2/Services/VA456/VerificationCheck"
        );
    }

    #[test]
    fn test_only_approved_status_passes() {
        assert_eq!(outcome_for("approved"), CheckOutcome::Approved);
        assert_eq!(outcome_for("pending"), CheckOutcome::Denied);
        assert_eq!(outcome_for("canceled"), CheckOutcome::Denied);
    }

    #[test]
    fn test_unreachable_provider_is_transport_error() {
        let mut cfg = config();
        cfg.base_url = "http://127.0.0.1:1".into();
        let verifier = TwilioVerifier::new(cfg);

        let result = verifier.send_code("+94770000001");
        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }
}
