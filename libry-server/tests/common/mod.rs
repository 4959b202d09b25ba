//! Common test utilities for integration tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use axum_test::TestServer;
use libry_core::KeyPair;
use libry_server::email::EmailError;
use libry_server::{
    routes, AppState, CheckOutcome, Config, EmailSender, IdentitySettings,
    InMemoryCredentialStore, InMemorySignupSessionStore, InMemoryUserDirectory,
    LocalIdentityProvider, ProviderError, Verifier,
};
use serde_json::{json, Value};

pub const DEVICE: &str = "device-1";
pub const PASSWORD: &str = "Passw0rd!";
pub const OTP: &str = "12345";

/// Mock verification provider: approves only [`OTP`] and captures what it
/// was asked to send
#[derive(Default, Clone)]
pub struct MockVerifier {
    pub codes_sent: Arc<RwLock<Vec<String>>>,
    pub links_sent: Arc<RwLock<Vec<String>>>,
    pub fail_send: Arc<AtomicBool>,
}

impl MockVerifier {
    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }
}

impl Verifier for MockVerifier {
    fn send_code(&self, phone_number: &str) -> Result<(), ProviderError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(ProviderError::Transport("connection refused".into()));
        }
        self.codes_sent.write().unwrap().push(phone_number.to_string());
        Ok(())
    }

    fn check_code(&self, _phone_number: &str, code: &str) -> Result<CheckOutcome, ProviderError> {
        Ok(if code == OTP {
            CheckOutcome::Approved
        } else {
            CheckOutcome::Denied
        })
    }

    fn send_link(&self, email: &str) -> Result<(), ProviderError> {
        self.links_sent.write().unwrap().push(email.to_string());
        Ok(())
    }

    fn check_link(&self, _email: &str, code: &str) -> Result<CheckOutcome, ProviderError> {
        self.check_code("", code)
    }
}

/// Mock email sender that captures password reset codes
#[derive(Default, Clone)]
pub struct MockEmailSender {
    /// Captured (email, code) pairs
    pub sent: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockEmailSender {
    /// Get the last reset code sent to an email
    pub fn get_code(&self, email: &str) -> Option<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|(e, _)| e == email)
            .map(|(_, c)| c.clone())
    }
}

impl EmailSender for MockEmailSender {
    fn send_password_reset(&self, email: &str, code: &str) -> Result<(), EmailError> {
        self.sent
            .write()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }

    fn send_password_changed(&self, _email: &str) -> Result<(), EmailError> {
        Ok(())
    }
}

pub struct TestContext {
    pub server: TestServer,
    pub verifier: MockVerifier,
    pub mailer: MockEmailSender,
}

/// Create a test server over in-memory stores
pub fn create_test_server() -> TestContext {
    create_test_server_with(Config::default())
}

pub fn create_test_server_with(config: Config) -> TestContext {
    let verifier = MockVerifier::default();
    let mailer = MockEmailSender::default();

    let identity = LocalIdentityProvider::new(
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(mailer.clone()),
        KeyPair::generate(),
        IdentitySettings {
            bcrypt_cost: 4,
            ..IdentitySettings::from_config(&config)
        },
    );

    let state = Arc::new(AppState::new(
        config,
        Arc::new(InMemorySignupSessionStore::new()),
        Arc::new(InMemoryUserDirectory::new()),
        Arc::new(verifier.clone()),
        Arc::new(identity),
    ));

    let app = routes::create_router(state);
    let server = TestServer::new(app).expect("Failed to create test server");

    TestContext {
        server,
        verifier,
        mailer,
    }
}

/// POST a signup step and return the rotated token
pub async fn signup_step(server: &TestServer, path: &str, body: Value) -> String {
    let response = server.post(path).json(&body).await;
    assert_eq!(response.status_code(), 200, "{}: {}", path, response.text());
    let body: Value = response.json();
    body["data"]["token"]
        .as_str()
        .expect("No token in response")
        .to_string()
}

/// Run the first three signup steps and return the token for finalize
pub async fn signup_until_register(server: &TestServer, phone: &str, email: &str) -> String {
    let token = signup_step(
        server,
        "/auth/signup/otp",
        json!({ "device_id": DEVICE, "mobile_number": phone }),
    )
    .await;
    let token = signup_step(
        server,
        "/auth/signup/otp-verify",
        json!({ "device_id": DEVICE, "token": token, "otp_code": OTP }),
    )
    .await;
    signup_step(
        server,
        "/auth/signup/email",
        json!({ "device_id": DEVICE, "token": token, "email": email }),
    )
    .await
}

/// Sign a user up and return the register response data
pub async fn create_user(server: &TestServer, phone: &str, email: &str) -> Value {
    let token = signup_until_register(server, phone, email).await;

    let response = server
        .post("/auth/signup/register")
        .json(&json!({ "device_id": DEVICE, "token": token, "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());

    let body: Value = response.json();
    body["data"].clone()
}

/// Sign a user up and return their access token
pub async fn create_user_token(server: &TestServer, phone: &str, email: &str) -> String {
    create_user(server, phone, email).await["accessToken"]
        .as_str()
        .expect("No access token")
        .to_string()
}
