//! Identity provider backed by a local credential store
//!
//! Identities are keyed by an opaque subject id with the phone number as the
//! login name. Access tokens are Ed25519-signed and verifiable against
//! [`IdentityProvider::key_set`]; refresh tokens are opaque grants held in the
//! credential store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use libry_core::{AccessClaims, AccessToken, KeyPair, KeySet, Validation};

use super::{ExternalIdentity, IdentityError, IdentityProvider, RefreshedToken, TokenPair};
use crate::config::Config;
use crate::crypto;
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::store::{Credential, CredentialStore, RefreshGrant, ResetCode, VerifiedAttribute};
use crate::validate;

/// How long a password reset code stays valid
const RESET_CODE_TTL_MINUTES: i64 = 60;

/// Token and hashing parameters
#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub issuer: String,
    pub client_id: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl IdentitySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            issuer: config.issuer.clone(),
            client_id: config.client_id.clone(),
            access_token_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_token_ttl: Duration::days(config.refresh_token_ttl_days),
            bcrypt_cost: crypto::BCRYPT_COST,
        }
    }
}

pub struct LocalIdentityProvider {
    credentials: Arc<dyn CredentialStore>,
    mailer: Arc<dyn EmailSender>,
    keypair: KeyPair,
    settings: IdentitySettings,
}

impl LocalIdentityProvider {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        mailer: Arc<dyn EmailSender>,
        keypair: KeyPair,
        settings: IdentitySettings,
    ) -> Self {
        Self {
            credentials,
            mailer,
            keypair,
            settings,
        }
    }

    fn credential(&self, subject: &str) -> Result<Credential, IdentityError> {
        self.credentials
            .get_credential(subject)?
            .ok_or(IdentityError::IdentityNotFound)
    }

    fn access_token(&self, credential: &Credential) -> Result<AccessToken, IdentityError> {
        let claims = AccessClaims::new(
            &self.settings.issuer,
            &self.settings.client_id,
            &credential.subject,
            &credential.username,
            self.settings.access_token_ttl,
        );
        Ok(AccessToken::issue(claims, &self.keypair)?)
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn register(
        &self,
        email: &str,
        phone_number: &str,
        password: &str,
    ) -> Result<ExternalIdentity, IdentityError> {
        validate::password(password).map_err(IdentityError::InvalidPassword)?;

        if self
            .credentials
            .find_credential_by_username(phone_number)?
            .is_some()
        {
            return Err(IdentityError::UsernameExists);
        }

        let credential = Credential {
            subject: crypto::generate_secret(),
            username: phone_number.to_string(),
            password_hash: crypto::hash_password(password, self.settings.bcrypt_cost)?,
            email: email.to_lowercase(),
            phone_number: phone_number.to_string(),
            confirmed: false,
            email_verified: false,
            phone_number_verified: false,
            created_at: Utc::now(),
        };
        let identity = ExternalIdentity {
            subject: credential.subject.clone(),
            username: credential.username.clone(),
        };

        match self.credentials.insert_credential(credential) {
            Err(ApiError::Conflict(_)) => return Err(IdentityError::UsernameExists),
            other => other?,
        }

        tracing::debug!(subject = %identity.subject, "Identity registered");
        Ok(identity)
    }

    fn admin_confirm(&self, subject: &str) -> Result<(), IdentityError> {
        let mut credential = self.credential(subject)?;
        credential.confirmed = true;
        self.credentials.update_credential(&credential)?;
        Ok(())
    }

    fn admin_verify_attribute(
        &self,
        subject: &str,
        attribute: VerifiedAttribute,
    ) -> Result<(), IdentityError> {
        let mut credential = self.credential(subject)?;
        match attribute {
            VerifiedAttribute::EmailVerified => credential.email_verified = true,
            VerifiedAttribute::PhoneNumberVerified => credential.phone_number_verified = true,
        }
        self.credentials.update_credential(&credential)?;
        tracing::debug!(subject = %subject, attribute = attribute.as_str(), "Attribute verified");
        Ok(())
    }

    fn authenticate(&self, subject: &str, password: &str) -> Result<TokenPair, IdentityError> {
        let credential = self.credential(subject)?;

        if !crypto::verify_password(password, &credential.password_hash)? {
            return Err(IdentityError::NotAuthorized);
        }
        if !credential.confirmed {
            return Err(IdentityError::NotConfirmed);
        }

        let access = self.access_token(&credential)?;
        let grant = RefreshGrant {
            token: crypto::generate_secret(),
            subject: credential.subject.clone(),
            expires_at: Utc::now() + self.settings.refresh_token_ttl,
        };
        let refresh_token = grant.token.clone();
        self.credentials.store_refresh_grant(grant)?;

        Ok(TokenPair {
            access_token: access.into_encoded(),
            refresh_token,
            expires_in: self.settings.access_token_ttl.num_seconds(),
        })
    }

    fn refresh(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<RefreshedToken, IdentityError> {
        let grant = self
            .credentials
            .get_refresh_grant(refresh_token)?
            .filter(|g| g.expires_at > Utc::now())
            .ok_or(IdentityError::InvalidRefreshToken)?;

        let presented =
            AccessToken::verify(access_token, &self.key_set(), &self.validation().allow_expired())
                .map_err(|_| IdentityError::InvalidRefreshToken)?;
        if presented.subject() != grant.subject {
            return Err(IdentityError::InvalidRefreshToken);
        }

        let credential = self
            .credentials
            .get_credential(&grant.subject)?
            .ok_or(IdentityError::InvalidRefreshToken)?;
        let access = self.access_token(&credential)?;

        Ok(RefreshedToken {
            access_token: access.into_encoded(),
            expires_in: self.settings.access_token_ttl.num_seconds(),
        })
    }

    fn admin_delete(&self, subject: &str) -> Result<(), IdentityError> {
        self.credential(subject)?;
        self.credentials.delete_credential(subject)?;
        tracing::debug!(subject = %subject, "Identity deleted");
        Ok(())
    }

    fn forgot_password(&self, subject: &str) -> Result<(), IdentityError> {
        let credential = self.credential(subject)?;
        let code = crypto::generate_reset_code();

        self.credentials.store_reset_code(ResetCode {
            subject: subject.to_string(),
            code: code.clone(),
            created_at: Utc::now(),
        })?;
        self.mailer.send_password_reset(&credential.email, &code)?;
        Ok(())
    }

    fn confirm_password(
        &self,
        subject: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        validate::password(new_password).map_err(IdentityError::InvalidPassword)?;
        let mut credential = self.credential(subject)?;

        // A code is good for one attempt
        let cutoff = Utc::now() - Duration::minutes(RESET_CODE_TTL_MINUTES);
        match self.credentials.take_reset_code(subject)? {
            Some(stored) if stored.code == code && stored.created_at > cutoff => {}
            _ => return Err(IdentityError::CodeMismatch),
        }

        credential.password_hash = crypto::hash_password(new_password, self.settings.bcrypt_cost)?;
        self.credentials.update_credential(&credential)?;

        if let Err(e) = self.mailer.send_password_changed(&credential.email) {
            tracing::warn!(subject = %subject, error = %e, "Failed to send password change notice");
        }
        Ok(())
    }

    fn key_set(&self) -> KeySet {
        KeySet::new([self.keypair.public_key().clone()])
    }

    fn validation(&self) -> Validation {
        Validation::new(&self.settings.issuer, &self.settings.client_id)
    }
}
