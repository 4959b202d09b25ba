//! Signup session state machine
//!
//! Four calls, each presenting the token returned by the previous one:
//!
//! 1. [`SignupService::start`] opens a session for a device and phone number
//!    and sends an OTP.
//! 2. [`SignupService::verify_otp`] checks the OTP.
//! 3. [`SignupService::add_email`] attaches an email address.
//! 4. [`SignupService::finalize`] provisions the identity and the local user,
//!    then deletes the session.
//!
//! Every successful step rotates the token. Guard failures that look like
//! abuse (wrong device, taken phone number, too many OTP failures, out of
//! order calls) delete the session before the error is returned; caller
//! mistakes (wrong OTP, taken email) leave it in place.

pub mod transition;

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::config::SignupPolicy;
use crate::crypto;
use crate::error::ApiError;
use crate::identity::{IdentityError, IdentityProvider, TokenPair};
use crate::store::{
    NewUser, PhoneVerification, SessionStatus, SignupSession, SignupSessionId,
    SignupSessionStore, User, UserDirectory, VerifiedAttribute,
};
use crate::verify::{CheckOutcome, Verifier};

use transition::Event;

/// Tries at generating a token that no other session holds
const TOKEN_ATTEMPTS: usize = 5;

/// Result of a successful finalize
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

pub struct SignupService {
    sessions: Arc<dyn SignupSessionStore>,
    users: Arc<dyn UserDirectory>,
    verifier: Arc<dyn Verifier>,
    identity: Arc<dyn IdentityProvider>,
    policy: SignupPolicy,
}

impl SignupService {
    pub fn new(
        sessions: Arc<dyn SignupSessionStore>,
        users: Arc<dyn UserDirectory>,
        verifier: Arc<dyn Verifier>,
        identity: Arc<dyn IdentityProvider>,
        policy: SignupPolicy,
    ) -> Self {
        Self {
            sessions,
            users,
            verifier,
            identity,
            policy,
        }
    }

    /// Step 1: open a session and send an OTP to `phone_number`
    pub fn start(&self, device_id: &str, phone_number: &str) -> Result<String, ApiError> {
        tracing::info!(device_id = %device_id, "Signup start");

        if let Some(existing) = self
            .sessions
            .find_by_device_and_phone(device_id, phone_number)?
        {
            self.sessions.delete(&existing.id)?;
            if !existing.is_expired(Utc::now()) {
                tracing::warn!(
                    device_id = %device_id,
                    session_id = %existing.id,
                    "Previous signup session still active"
                );
                return Err(ApiError::SessionActive);
            }
            tracing::debug!(session_id = %existing.id, "Removed expired signup session");
        }

        // The OTP goes out even when the number is taken; step 2 rejects it
        let taken = self
            .users
            .find_by_phone(phone_number)?
            .is_some_and(|u| u.user_confirmed);

        let session = self.insert_session(device_id, phone_number, taken)?;

        if let Err(e) = self.verifier.send_code(phone_number) {
            tracing::error!(session_id = %session.id, error = %e, "Failed to send OTP");
            return Err(e.into());
        }

        let mut sent = session;
        sent.status = self.advance(&sent, Event::CodeSent)?;
        let sent = self.sessions.save(&sent)?;

        tracing::info!(session_id = %sent.id, "OTP sent");
        Ok(sent.token)
    }

    /// Step 2: check the OTP sent in step 1
    pub fn verify_otp(
        &self,
        device_id: &str,
        token: &str,
        otp_code: &str,
    ) -> Result<String, ApiError> {
        let mut session = self.resolve(device_id, token)?;
        tracing::info!(session_id = %session.id, "Signup verify OTP");

        if session.is_phone_number_taken {
            tracing::warn!(session_id = %session.id, "Phone number already registered");
            self.sessions.delete(&session.id)?;
            return Err(ApiError::PhoneNumberExists);
        }
        self.require(&session, Event::OtpApproved)?;

        let outcome = self.verifier.check_code(&session.phone_number, otp_code)?;
        session.otp_try_count += 1;

        match outcome {
            CheckOutcome::Approved => {
                session.phone_number_verified = PhoneVerification::Verified;
                session.status = self.advance(&session, Event::OtpApproved)?;
                let saved = self.save_rotated(session)?;

                tracing::info!(session_id = %saved.id, "OTP verified");
                Ok(saved.token)
            }
            CheckOutcome::Denied => {
                session.status = self.advance(&session, Event::OtpDenied)?;

                if session.otp_try_count > self.policy.max_otp_attempts {
                    tracing::warn!(
                        session_id = %session.id,
                        attempts = session.otp_try_count,
                        "OTP retries exhausted"
                    );
                    self.sessions.delete(&session.id)?;
                    return Err(ApiError::OtpRetryExceed);
                }

                self.sessions.save(&session)?;
                tracing::warn!(
                    session_id = %session.id,
                    attempts = session.otp_try_count,
                    "Invalid OTP"
                );
                Err(ApiError::InvalidOtp)
            }
        }
    }

    /// Step 3: attach an email address
    pub fn add_email(&self, device_id: &str, token: &str, email: &str) -> Result<String, ApiError> {
        let mut session = self.resolve(device_id, token)?;
        tracing::info!(session_id = %session.id, "Signup add email");

        self.require(&session, Event::EmailAdded)?;

        if self
            .users
            .find_by_email(email)?
            .is_some_and(|u| u.user_confirmed)
        {
            tracing::warn!(session_id = %session.id, "Email already registered");
            return Err(ApiError::EmailTaken);
        }

        session.email = Some(email.to_lowercase());
        session.status = self.advance(&session, Event::EmailAdded)?;
        let saved = self.save_rotated(session)?;

        tracing::info!(session_id = %saved.id, "Email added");
        Ok(saved.token)
    }

    /// Step 4: create the account and sign the user in
    pub fn finalize(
        &self,
        device_id: &str,
        token: &str,
        password: &str,
    ) -> Result<SignupOutcome, ApiError> {
        let session = self.resolve(device_id, token)?;
        tracing::info!(session_id = %session.id, "Signup finalize");

        self.require(&session, Event::AccountCreated)?;
        let email = session
            .email
            .clone()
            .ok_or_else(|| ApiError::Internal(format!("session {} has no email", session.id)))?;

        self.release_unconfirmed(&session.phone_number, &email)?;

        let identity = self
            .identity
            .register(&email, &session.phone_number, password)?;
        tracing::info!(session_id = %session.id, subject = %identity.subject, "Identity registered");

        let provisioned = self
            .provision(&session, &email, &identity.subject)
            .and_then(|user| {
                let tokens = self.identity.authenticate(&identity.subject, password)?;
                Ok((user, tokens))
            });

        let (user, tokens) = match provisioned {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(
                    session_id = %session.id,
                    subject = %identity.subject,
                    error = %e,
                    "Finalize failed after registration, rolling back"
                );
                self.compensate(&identity.subject);
                return Err(e);
            }
        };

        if let Err(e) = self.verifier.send_link(&email) {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send email verification link");
        }

        if let Err(e) = self.sessions.delete(&session.id) {
            // The janitor reaps it; a replay fails at registration
            tracing::error!(session_id = %session.id, error = %e, "Failed to delete completed session");
        }

        tracing::info!(user_id = %user.id, "Account created");
        Ok(SignupOutcome { user, tokens })
    }

    /// Remove sessions past their expiry; returns how many were deleted
    pub fn reap_expired(&self) -> Result<u64, ApiError> {
        self.sessions.delete_expired(Utc::now())
    }

    /// Create the local user, confirm it and mirror verified attributes
    fn provision(&self, session: &SignupSession, email: &str, subject: &str) -> Result<User, ApiError> {
        let user = self.users.create_user(NewUser {
            email: email.to_string(),
            phone_number: session.phone_number.clone(),
            subject: subject.to_string(),
            user_confirmed: false,
        })?;

        self.identity.admin_confirm(subject)?;
        let mut user = self.users.mark_confirmed(&user.id, true)?;

        if session.phone_number_verified == PhoneVerification::Verified {
            self.identity
                .admin_verify_attribute(subject, VerifiedAttribute::PhoneNumberVerified)?;
            user = self
                .users
                .mark_attribute_verified(&user.id, VerifiedAttribute::PhoneNumberVerified)?;
        }

        Ok(user)
    }

    /// Remove unconfirmed users holding the phone number or email. They are
    /// leftovers of a finalize that never completed and would otherwise make
    /// every retry fail on uniqueness.
    fn release_unconfirmed(&self, phone_number: &str, email: &str) -> Result<(), ApiError> {
        let holders = [
            self.users.find_by_phone(phone_number)?,
            self.users.find_by_email(email)?,
        ];

        for user in holders.into_iter().flatten().filter(|u| !u.user_confirmed) {
            match self.identity.admin_delete(&user.subject) {
                Ok(()) | Err(IdentityError::IdentityNotFound) => {}
                Err(e) => return Err(e.into()),
            }
            self.users.delete_user(&user.id)?;
            tracing::info!(user_id = %user.id, "Removed unconfirmed user");
        }
        Ok(())
    }

    /// Best-effort removal of a half-provisioned account
    fn compensate(&self, subject: &str) {
        if let Err(e) = self.identity.admin_delete(subject) {
            tracing::error!(subject = %subject, error = %e, "Failed to delete identity");
        }
        match self.users.find_by_subject(subject) {
            Ok(Some(user)) => {
                if let Err(e) = self.users.delete_user(&user.id) {
                    tracing::error!(user_id = %user.id, error = %e, "Failed to delete local user");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!(subject = %subject, error = %e, "Failed to look up local user"),
        }
    }

    /// Look up a session by token and enforce device binding
    fn resolve(&self, device_id: &str, token: &str) -> Result<SignupSession, ApiError> {
        let session = self.sessions.find_by_token(token)?.ok_or_else(|| {
            tracing::warn!(device_id = %device_id, "Unknown signup token");
            ApiError::InvalidToken
        })?;

        if session.device_id != device_id {
            tracing::warn!(
                session_id = %session.id,
                device_id = %device_id,
                "Device mismatch, destroying session"
            );
            self.sessions.delete(&session.id)?;
            return Err(ApiError::InvalidDeviceId);
        }

        Ok(session)
    }

    /// Destroy the session unless `event` is legal from its status
    fn require(&self, session: &SignupSession, event: Event) -> Result<(), ApiError> {
        if transition::allows(session.status, event) {
            return Ok(());
        }

        tracing::warn!(
            session_id = %session.id,
            status = session.status.as_str(),
            ?event,
            "Step not allowed from session status"
        );
        self.sessions.delete(&session.id)?;
        Err(ApiError::NotAllowed)
    }

    fn advance(&self, session: &SignupSession, event: Event) -> Result<SessionStatus, ApiError> {
        transition::next(session.status, event).ok_or_else(|| {
            ApiError::Internal(format!(
                "{:?} from {} after guard passed",
                event,
                session.status.as_str()
            ))
        })
    }

    fn insert_session(
        &self,
        device_id: &str,
        phone_number: &str,
        taken: bool,
    ) -> Result<SignupSession, ApiError> {
        let ttl = Duration::minutes(self.policy.session_ttl_minutes);

        for _ in 0..TOKEN_ATTEMPTS {
            let session = SignupSession::new(
                SignupSessionId(crypto::generate_secret()),
                crypto::generate_session_token(device_id),
                device_id,
                phone_number,
                taken,
                ttl,
            );
            match self.sessions.save(&session) {
                Err(ApiError::Conflict(_)) => continue,
                other => return other,
            }
        }

        Err(ApiError::Internal("could not allocate a unique session token".to_string()))
    }

    /// Give the session a fresh token and save it
    fn save_rotated(&self, mut session: SignupSession) -> Result<SignupSession, ApiError> {
        for _ in 0..TOKEN_ATTEMPTS {
            session.token = crypto::generate_session_token(&session.device_id);
            match self.sessions.save(&session) {
                Err(ApiError::Conflict(_)) => continue,
                other => return other,
            }
        }

        Err(ApiError::Internal("could not allocate a unique session token".to_string()))
    }
}
