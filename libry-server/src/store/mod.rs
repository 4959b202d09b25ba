//! Storage abstractions

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemoryCredentialStore, InMemorySignupSessionStore, InMemoryUserDirectory};
pub use models::*;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::ApiError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, ApiError>;

/// Persistence for in-flight signup sessions
pub trait SignupSessionStore: Send + Sync {
    /// Find a session by its current token
    fn find_by_token(&self, token: &str) -> StoreResult<Option<SignupSession>>;

    /// Find the session for a device/phone pair
    fn find_by_device_and_phone(
        &self,
        device_id: &str,
        phone_number: &str,
    ) -> StoreResult<Option<SignupSession>>;

    /// Insert a new session or update an existing one.
    ///
    /// Updates are compare-and-swap on `version`: if the stored version differs
    /// from `session.version`, nothing is written and `SessionConflict` is
    /// returned. The returned record carries the bumped version. Inserting a
    /// second session for a device/phone pair fails with `SessionActive`.
    fn save(&self, session: &SignupSession) -> StoreResult<SignupSession>;

    /// Delete a session
    fn delete(&self, id: &SignupSessionId) -> StoreResult<()>;

    /// Delete every session that expired before `now`
    fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Local user records and the follow graph between them
pub trait UserDirectory: Send + Sync {
    /// Create a user; email, phone number and subject must all be unused
    fn create_user(&self, new_user: NewUser) -> StoreResult<User>;

    fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>>;

    fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>>;

    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    fn find_by_subject(&self, subject: &str) -> StoreResult<Option<User>>;

    fn mark_confirmed(&self, user_id: &UserId, confirmed: bool) -> StoreResult<User>;

    fn mark_attribute_verified(
        &self,
        user_id: &UserId,
        attribute: VerifiedAttribute,
    ) -> StoreResult<User>;

    fn update_profile(&self, user_id: &UserId, update: ProfileUpdate) -> StoreResult<User>;

    /// Delete a user and every follow edge touching them
    fn delete_user(&self, user_id: &UserId) -> StoreResult<()>;

    fn search(&self, query: &UserSearch) -> StoreResult<Vec<User>>;

    /// Add a follow edge; following twice is a no-op
    fn follow(&self, follower: &UserId, followee: &UserId) -> StoreResult<()>;

    fn unfollow(&self, follower: &UserId, followee: &UserId) -> StoreResult<()>;

    fn is_following(&self, follower: &UserId, followee: &UserId) -> StoreResult<bool>;

    /// Users following `user_id`
    fn followers(&self, user_id: &UserId) -> StoreResult<Vec<User>>;

    /// Users `user_id` follows
    fn following(&self, user_id: &UserId) -> StoreResult<Vec<User>>;

    /// Users ordered by follower count (descending), with their counts
    fn popular(&self, exclude: Option<&UserId>, limit: usize) -> StoreResult<Vec<(User, u64)>>;
}

/// The identity provider's account store
pub trait CredentialStore: Send + Sync {
    /// Insert a credential; a taken username is a `Conflict`
    fn insert_credential(&self, credential: Credential) -> StoreResult<()>;

    fn get_credential(&self, subject: &str) -> StoreResult<Option<Credential>>;

    fn find_credential_by_username(&self, username: &str) -> StoreResult<Option<Credential>>;

    fn update_credential(&self, credential: &Credential) -> StoreResult<()>;

    /// Delete a credential with its refresh grants and reset codes
    fn delete_credential(&self, subject: &str) -> StoreResult<()>;

    fn store_refresh_grant(&self, grant: RefreshGrant) -> StoreResult<()>;

    fn get_refresh_grant(&self, token: &str) -> StoreResult<Option<RefreshGrant>>;

    /// Store a reset code, replacing any earlier one for the subject
    fn store_reset_code(&self, code: ResetCode) -> StoreResult<()>;

    /// Remove and return the reset code for a subject
    fn take_reset_code(&self, subject: &str) -> StoreResult<Option<ResetCode>>;
}
