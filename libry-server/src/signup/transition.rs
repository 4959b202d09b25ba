//! Signup session transition table
//!
//! The session status is authoritative: every step first asks [`next`]
//! whether its event is legal from the current status.

use crate::store::SessionStatus;

/// Something that happened to a signup session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The verification provider accepted the OTP send
    CodeSent,
    OtpApproved,
    OtpDenied,
    EmailAdded,
    /// Finalize provisioned the account
    AccountCreated,
}

/// The status a session moves to on `event`, or `None` if the event is not
/// allowed from `status`.
pub fn next(status: SessionStatus, event: Event) -> Option<SessionStatus> {
    use SessionStatus::*;

    match (status, event) {
        (Init, Event::CodeSent) => Some(OtpSent),

        // Delivery confirmation can be lost, so INIT sessions may still verify.
        // Re-verifying an already verified phone rotates the token again.
        (Init | OtpSent | OtpFailed | OtpVerified, Event::OtpApproved) => Some(OtpVerified),
        (Init | OtpSent | OtpFailed | OtpVerified, Event::OtpDenied) => Some(OtpFailed),

        (OtpVerified | EmailAdded, Event::EmailAdded) => Some(EmailAdded),

        (EmailAdded, Event::AccountCreated) => Some(AccountCreated),

        _ => None,
    }
}

/// Whether `event` may happen from `status`
pub fn allows(status: SessionStatus, event: Event) -> bool {
    next(status, event).is_some()
}
