//! Account operations for registered users

use std::sync::Arc;

use crate::error::ApiError;
use crate::identity::{IdentityError, IdentityProvider, RefreshedToken, TokenPair};
use crate::store::{User, UserDirectory, VerifiedAttribute};
use crate::verify::Verifier;

/// Sign-in, token refresh, password reset and email verification
pub struct AccountService {
    users: Arc<dyn UserDirectory>,
    identity: Arc<dyn IdentityProvider>,
    verifier: Arc<dyn Verifier>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        identity: Arc<dyn IdentityProvider>,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        Self {
            users,
            identity,
            verifier,
        }
    }

    /// Password sign-in by email or phone number. When both are given they
    /// must belong to the same user.
    pub fn login(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
        password: &str,
    ) -> Result<TokenPair, ApiError> {
        let by_email = match email {
            Some(email) => Some(self.users.find_by_email(email)?.ok_or(ApiError::UserNotFound)?),
            None => None,
        };
        let by_phone = match phone_number {
            Some(phone) => Some(self.users.find_by_phone(phone)?.ok_or(ApiError::UserNotFound)?),
            None => None,
        };

        let user = match (by_email, by_phone) {
            (Some(a), Some(b)) if a.id != b.id => return Err(ApiError::UserNotFound),
            (Some(user), _) | (None, Some(user)) => user,
            (None, None) => {
                return Err(ApiError::ValidationError(
                    "email or phone_number is required".to_string(),
                ))
            }
        };

        let tokens = self
            .identity
            .authenticate(&user.subject, password)
            .map_err(|e| match e {
                IdentityError::NotAuthorized | IdentityError::NotConfirmed => {
                    ApiError::PasswordInvalid
                }
                IdentityError::IdentityNotFound => ApiError::UserNotFound,
                other => other.into(),
            })
            .inspect_err(|e| tracing::warn!(user_id = %user.id, error = %e, "Login failed"))?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(tokens)
    }

    pub fn refresh(&self, access_token: &str, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.identity
            .refresh(refresh_token, access_token)
            .map_err(|e| match e {
                IdentityError::Store(inner) => inner,
                other => {
                    tracing::debug!(error = %other, "Refresh rejected");
                    ApiError::InvalidRefresh
                }
            })
    }

    /// Email a password reset code
    pub fn send_reset_password(&self, email: &str) -> Result<(), ApiError> {
        let user = self.find_by_email(email)?;
        self.identity.forgot_password(&user.subject)?;
        tracing::info!(user_id = %user.id, "Password reset code sent");
        Ok(())
    }

    pub fn confirm_new_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let user = self.find_by_email(email)?;

        self.identity
            .confirm_password(&user.subject, code, password)
            .map_err(|e| match e {
                IdentityError::CodeMismatch => ApiError::InvalidResetCode,
                IdentityError::InvalidPassword(_) => ApiError::PasswordInvalid,
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Check an email verification link and mark the email verified
    pub fn validate_email(&self, email: &str, token: &str) -> Result<User, ApiError> {
        let user = self
            .users
            .find_by_email(email)?
            .ok_or(ApiError::InvalidVerificationLink)?;

        if user.email_verified {
            return Ok(user);
        }

        if !self.verifier.check_link(&user.email, token)?.is_approved() {
            tracing::warn!(user_id = %user.id, "Invalid email verification link");
            return Err(ApiError::InvalidVerificationLink);
        }

        self.identity
            .admin_verify_attribute(&user.subject, VerifiedAttribute::EmailVerified)?;
        let user = self
            .users
            .mark_attribute_verified(&user.id, VerifiedAttribute::EmailVerified)?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// Remove a user from the identity provider and the directory
    pub fn delete_user(&self, phone_number: &str) -> Result<(), ApiError> {
        let user = self
            .users
            .find_by_phone(phone_number)?
            .ok_or(ApiError::UserNotFound)?;

        match self.identity.admin_delete(&user.subject) {
            Ok(()) | Err(IdentityError::IdentityNotFound) => {}
            Err(e) => return Err(e.into()),
        }
        self.users.delete_user(&user.id)?;

        tracing::info!(user_id = %user.id, "User deleted");
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Result<User, ApiError> {
        self.users
            .find_by_email(email)?
            .ok_or(ApiError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use libry_core::KeyPair;
    use std::sync::Mutex;

    use crate::email::{EmailError, EmailSender};
    use crate::identity::{IdentitySettings, LocalIdentityProvider};
    use crate::store::{InMemoryCredentialStore, InMemoryUserDirectory, NewUser};
    use crate::verify::ConsoleVerifier;

    #[derive(Default)]
    struct CapturingMailer {
        codes: Mutex<Vec<String>>,
    }

    impl EmailSender for CapturingMailer {
        fn send_password_reset(&self, _email: &str, code: &str) -> Result<(), EmailError> {
            self.codes.lock().unwrap().push(code.to_string());
            Ok(())
        }

        fn send_password_changed(&self, _email: &str) -> Result<(), EmailError> {
            Ok(())
        }
    }

    struct Fixture {
        accounts: AccountService,
        users: Arc<InMemoryUserDirectory>,
        identity: Arc<LocalIdentityProvider>,
        mailer: Arc<CapturingMailer>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserDirectory::new());
        let mailer = Arc::new(CapturingMailer::default());
        let identity = Arc::new(LocalIdentityProvider::new(
            Arc::new(InMemoryCredentialStore::new()),
            mailer.clone(),
            KeyPair::generate(),
            IdentitySettings {
                issuer: "http://localhost:3000".into(),
                client_id: "libry".into(),
                access_token_ttl: Duration::minutes(60),
                refresh_token_ttl: Duration::days(30),
                bcrypt_cost: 4,
            },
        ));
        let accounts = AccountService::new(
            users.clone(),
            identity.clone(),
            Arc::new(ConsoleVerifier::new("http://localhost:3000")),
        );

        Fixture {
            accounts,
            users,
            identity,
            mailer,
        }
    }

    impl Fixture {
        fn register(&self, email: &str, phone: &str) -> User {
            let identity = self.identity.register(email, phone, "Passw0rd!").unwrap();
            self.identity.admin_confirm(&identity.subject).unwrap();
            self.users
                .create_user(NewUser {
                    email: email.into(),
                    phone_number: phone.into(),
                    subject: identity.subject,
                    user_confirmed: true,
                })
                .unwrap()
        }
    }

    #[test]
    fn test_login_by_email_or_phone() {
        let f = fixture();
        f.register("a@x.com", "+94770000001");

        assert!(f.accounts.login(Some("a@x.com"), None, "Passw0rd!").is_ok());
        assert!(f.accounts.login(None, Some("+94770000001"), "Passw0rd!").is_ok());
        assert!(matches!(
            f.accounts.login(Some("a@x.com"), None, "Wr0ngPass!"),
            Err(ApiError::PasswordInvalid)
        ));
        assert!(matches!(
            f.accounts.login(Some("nobody@x.com"), None, "Passw0rd!"),
            Err(ApiError::UserNotFound)
        ));
        assert!(matches!(
            f.accounts.login(None, None, "Passw0rd!"),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_login_with_mismatched_identifiers() {
        let f = fixture();
        f.register("a@x.com", "+94770000001");
        f.register("b@x.com", "+94770000002");

        assert!(matches!(
            f.accounts.login(Some("a@x.com"), Some("+94770000002"), "Passw0rd!"),
            Err(ApiError::UserNotFound)
        ));
    }

    #[test]
    fn test_refresh() {
        let f = fixture();
        f.register("a@x.com", "+94770000001");
        let tokens = f.accounts.login(Some("a@x.com"), None, "Passw0rd!").unwrap();

        assert!(f
            .accounts
            .refresh(&tokens.access_token, &tokens.refresh_token)
            .is_ok());
        assert!(matches!(
            f.accounts.refresh(&tokens.access_token, "bogus"),
            Err(ApiError::InvalidRefresh)
        ));
    }

    #[test]
    fn test_password_reset() {
        let f = fixture();
        f.register("a@x.com", "+94770000001");

        assert!(matches!(
            f.accounts.send_reset_password("nobody@x.com"),
            Err(ApiError::UserNotFound)
        ));

        f.accounts.send_reset_password("a@x.com").unwrap();
        let code = f.mailer.codes.lock().unwrap().last().cloned().unwrap();

        assert!(matches!(
            f.accounts.confirm_new_password("a@x.com", &code, "weak"),
            Err(ApiError::PasswordInvalid)
        ));
        f.accounts
            .confirm_new_password("a@x.com", &code, "N3wPassw0rd!")
            .unwrap();
        assert!(f.accounts.login(Some("a@x.com"), None, "N3wPassw0rd!").is_ok());

        assert!(matches!(
            f.accounts.confirm_new_password("a@x.com", &code, "An0therPass!"),
            Err(ApiError::InvalidResetCode)
        ));
    }

    #[test]
    fn test_validate_email() {
        let f = fixture();
        f.register("a@x.com", "+94770000001");

        assert!(matches!(
            f.accounts.validate_email("a@x.com", "00000"),
            Err(ApiError::InvalidVerificationLink)
        ));
        assert!(matches!(
            f.accounts.validate_email("nobody@x.com", "12345"),
            Err(ApiError::InvalidVerificationLink)
        ));

        let user = f.accounts.validate_email("a@x.com", "12345").unwrap();
        assert!(user.email_verified);
        assert!(f.users.find_by_email("a@x.com").unwrap().unwrap().email_verified);
    }

    #[test]
    fn test_delete_user() {
        let f = fixture();
        let user = f.register("a@x.com", "+94770000001");

        f.accounts.delete_user("+94770000001").unwrap();
        assert!(f.users.get_user(&user.id).unwrap().is_none());
        assert!(matches!(
            f.accounts.login(Some("a@x.com"), None, "Passw0rd!"),
            Err(ApiError::UserNotFound)
        ));
        assert!(matches!(
            f.accounts.delete_user("+94770000001"),
            Err(ApiError::UserNotFound)
        ));
    }
}
