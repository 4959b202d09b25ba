//! In-memory storage implementations

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{
    Credential, CredentialStore, NewUser, ProfileUpdate, RefreshGrant, ResetCode,
    SignupSession, SignupSessionId, SignupSessionStore, StoreResult, User, UserDirectory, UserId,
    UserSearch, VerifiedAttribute,
};
use crate::error::ApiError;

fn poisoned<T>(_: T) -> ApiError {
    ApiError::Internal("store lock poisoned".to_string())
}

/// In-memory signup session store
#[derive(Default)]
pub struct InMemorySignupSessionStore {
    sessions: RwLock<HashMap<SignupSessionId, SignupSession>>,
}

impl InMemorySignupSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, live or expired
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignupSessionStore for InMemorySignupSessionStore {
    fn find_by_token(&self, token: &str) -> StoreResult<Option<SignupSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.values().find(|s| s.token == token).cloned())
    }

    fn find_by_device_and_phone(
        &self,
        device_id: &str,
        phone_number: &str,
    ) -> StoreResult<Option<SignupSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions
            .values()
            .find(|s| s.device_id == device_id && s.phone_number == phone_number)
            .cloned())
    }

    fn save(&self, session: &SignupSession) -> StoreResult<SignupSession> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;

        match sessions.get(&session.id) {
            Some(stored) if stored.version != session.version => {
                return Err(ApiError::SessionConflict)
            }
            None if session.version != 0 => return Err(ApiError::SessionConflict),
            _ => {}
        }

        if session.version == 0
            && sessions.values().any(|s| {
                s.device_id == session.device_id && s.phone_number == session.phone_number
            })
        {
            return Err(ApiError::SessionActive);
        }

        if sessions
            .values()
            .any(|s| s.id != session.id && s.token == session.token)
        {
            return Err(ApiError::Conflict("session token already in use".to_string()));
        }

        let mut saved = session.clone();
        saved.version += 1;
        saved.updated_at = Utc::now();
        sessions.insert(saved.id.clone(), saved.clone());
        Ok(saved)
    }

    fn delete(&self, id: &SignupSessionId) -> StoreResult<()> {
        self.sessions.write().map_err(poisoned)?.remove(id);
        Ok(())
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// In-memory user directory
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, User>>,
    /// (follower, followee) edges
    follows: RwLock<HashSet<(UserId, UserId)>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> StoreResult<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().find(|u| pred(u)).cloned())
    }

    fn modify(&self, user_id: &UserId, f: impl FnOnce(&mut User)) -> StoreResult<User> {
        let mut users = self.users.write().map_err(poisoned)?;
        let user = users.get_mut(user_id).ok_or(ApiError::UserNotFound)?;
        f(user);
        Ok(user.clone())
    }

    fn resolve(&self, ids: impl Iterator<Item = UserId>) -> StoreResult<Vec<User>> {
        let users = self.users.read().map_err(poisoned)?;
        let mut resolved: Vec<User> = ids.filter_map(|id| users.get(&id).cloned()).collect();
        resolved.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(resolved)
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let email = new_user.email.to_lowercase();
        let mut users = self.users.write().map_err(poisoned)?;

        if users.values().any(|u| u.email == email) {
            return Err(ApiError::Conflict("email already registered".to_string()));
        }
        if users.values().any(|u| u.phone_number == new_user.phone_number) {
            return Err(ApiError::Conflict("phone number already registered".to_string()));
        }
        if users.values().any(|u| u.subject == new_user.subject) {
            return Err(ApiError::Conflict("subject already registered".to_string()));
        }

        let user = User {
            id: UserId(uuid::Uuid::new_v4().to_string()),
            name: None,
            birth_date: None,
            email,
            email_verified: false,
            phone_number: new_user.phone_number,
            phone_number_verified: false,
            subject: new_user.subject,
            user_confirmed: new_user.user_confirmed,
            created_at: Utc::now(),
        };
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().map_err(poisoned)?.get(user_id).cloned())
    }

    fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>> {
        self.find(|u| u.phone_number == phone_number)
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let normalized = email.to_lowercase();
        self.find(|u| u.email == normalized)
    }

    fn find_by_subject(&self, subject: &str) -> StoreResult<Option<User>> {
        self.find(|u| u.subject == subject)
    }

    fn mark_confirmed(&self, user_id: &UserId, confirmed: bool) -> StoreResult<User> {
        self.modify(user_id, |u| u.user_confirmed = confirmed)
    }

    fn mark_attribute_verified(
        &self,
        user_id: &UserId,
        attribute: VerifiedAttribute,
    ) -> StoreResult<User> {
        self.modify(user_id, |u| match attribute {
            VerifiedAttribute::EmailVerified => u.email_verified = true,
            VerifiedAttribute::PhoneNumberVerified => u.phone_number_verified = true,
        })
    }

    fn update_profile(&self, user_id: &UserId, update: ProfileUpdate) -> StoreResult<User> {
        self.modify(user_id, |u| {
            if let Some(name) = update.name {
                u.name = Some(name);
            }
            if let Some(birth_date) = update.birth_date {
                u.birth_date = Some(birth_date);
            }
        })
    }

    fn delete_user(&self, user_id: &UserId) -> StoreResult<()> {
        self.users.write().map_err(poisoned)?.remove(user_id);
        self.follows
            .write()
            .map_err(poisoned)?
            .retain(|(a, b)| a != user_id && b != user_id);
        Ok(())
    }

    fn search(&self, query: &UserSearch) -> StoreResult<Vec<User>> {
        let users = self.users.read().map_err(poisoned)?;
        let mut found: Vec<User> = users.values().filter(|u| query.matches(u)).cloned().collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    fn follow(&self, follower: &UserId, followee: &UserId) -> StoreResult<()> {
        {
            let users = self.users.read().map_err(poisoned)?;
            if !users.contains_key(follower) || !users.contains_key(followee) {
                return Err(ApiError::UserNotFound);
            }
        }
        self.follows
            .write()
            .map_err(poisoned)?
            .insert((follower.clone(), followee.clone()));
        Ok(())
    }

    fn unfollow(&self, follower: &UserId, followee: &UserId) -> StoreResult<()> {
        self.follows
            .write()
            .map_err(poisoned)?
            .remove(&(follower.clone(), followee.clone()));
        Ok(())
    }

    fn is_following(&self, follower: &UserId, followee: &UserId) -> StoreResult<bool> {
        Ok(self
            .follows
            .read()
            .map_err(poisoned)?
            .contains(&(follower.clone(), followee.clone())))
    }

    fn followers(&self, user_id: &UserId) -> StoreResult<Vec<User>> {
        let ids: Vec<UserId> = self
            .follows
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|(_, b)| b == user_id)
            .map(|(a, _)| a.clone())
            .collect();
        self.resolve(ids.into_iter())
    }

    fn following(&self, user_id: &UserId) -> StoreResult<Vec<User>> {
        let ids: Vec<UserId> = self
            .follows
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|(a, _)| a == user_id)
            .map(|(_, b)| b.clone())
            .collect();
        self.resolve(ids.into_iter())
    }

    fn popular(&self, exclude: Option<&UserId>, limit: usize) -> StoreResult<Vec<(User, u64)>> {
        let follows = self.follows.read().map_err(poisoned)?;
        let mut counts: HashMap<&UserId, u64> = HashMap::new();
        for (_, followee) in follows.iter() {
            *counts.entry(followee).or_default() += 1;
        }

        let users = self.users.read().map_err(poisoned)?;
        let mut ranked: Vec<(User, u64)> = users
            .values()
            .filter(|u| exclude != Some(&u.id))
            .map(|u| (u.clone(), counts.get(&u.id).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by(|(a, ca), (b, cb)| cb.cmp(ca).then(a.created_at.cmp(&b.created_at)));
        ranked.truncate(limit);
        Ok(ranked)
    }
}

/// In-memory identity provider account store
#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<String, Credential>>,
    refresh_grants: RwLock<HashMap<String, RefreshGrant>>,
    reset_codes: RwLock<HashMap<String, ResetCode>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn insert_credential(&self, credential: Credential) -> StoreResult<()> {
        let mut credentials = self.credentials.write().map_err(poisoned)?;
        if credentials.values().any(|c| c.username == credential.username) {
            return Err(ApiError::Conflict("username already exists".to_string()));
        }
        credentials.insert(credential.subject.clone(), credential);
        Ok(())
    }

    fn get_credential(&self, subject: &str) -> StoreResult<Option<Credential>> {
        Ok(self.credentials.read().map_err(poisoned)?.get(subject).cloned())
    }

    fn find_credential_by_username(&self, username: &str) -> StoreResult<Option<Credential>> {
        let credentials = self.credentials.read().map_err(poisoned)?;
        Ok(credentials.values().find(|c| c.username == username).cloned())
    }

    fn update_credential(&self, credential: &Credential) -> StoreResult<()> {
        let mut credentials = self.credentials.write().map_err(poisoned)?;
        match credentials.get_mut(&credential.subject) {
            Some(stored) => {
                *stored = credential.clone();
                Ok(())
            }
            None => Err(ApiError::UserNotFound),
        }
    }

    fn delete_credential(&self, subject: &str) -> StoreResult<()> {
        self.credentials.write().map_err(poisoned)?.remove(subject);
        self.refresh_grants
            .write()
            .map_err(poisoned)?
            .retain(|_, g| g.subject != subject);
        self.reset_codes.write().map_err(poisoned)?.remove(subject);
        Ok(())
    }

    fn store_refresh_grant(&self, grant: RefreshGrant) -> StoreResult<()> {
        self.refresh_grants
            .write()
            .map_err(poisoned)?
            .insert(grant.token.clone(), grant);
        Ok(())
    }

    fn get_refresh_grant(&self, token: &str) -> StoreResult<Option<RefreshGrant>> {
        Ok(self.refresh_grants.read().map_err(poisoned)?.get(token).cloned())
    }

    fn store_reset_code(&self, code: ResetCode) -> StoreResult<()> {
        self.reset_codes
            .write()
            .map_err(poisoned)?
            .insert(code.subject.clone(), code);
        Ok(())
    }

    fn take_reset_code(&self, subject: &str) -> StoreResult<Option<ResetCode>> {
        Ok(self.reset_codes.write().map_err(poisoned)?.remove(subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SessionStatus;
    use chrono::Duration;

    fn session(id: &str, token: &str) -> SignupSession {
        SignupSession::new(
            SignupSessionId(id.to_string()),
            token.to_string(),
            "dev1",
            "+94770000001",
            false,
            Duration::minutes(10),
        )
    }

    fn new_user(n: u32) -> NewUser {
        NewUser {
            email: format!("user{}@example.com", n),
            phone_number: format!("+9477000000{}", n),
            subject: format!("sub-{}", n),
            user_confirmed: true,
        }
    }

    #[test]
    fn test_save_bumps_version_and_finds_by_token() {
        let store = InMemorySignupSessionStore::new();

        let saved = store.save(&session("s1", "t1")).unwrap();
        assert_eq!(saved.version, 1);

        let found = store.find_by_token("t1").unwrap().unwrap();
        assert_eq!(found.id, saved.id);
        assert!(store
            .find_by_device_and_phone("dev1", "+94770000001")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_stale_save_rejected() {
        let store = InMemorySignupSessionStore::new();
        let saved = store.save(&session("s1", "t1")).unwrap();

        let mut first = saved.clone();
        first.token = "t2".to_string();
        store.save(&first).unwrap();

        let mut second = saved;
        second.token = "t3".to_string();
        second.status = SessionStatus::OtpFailed;
        assert!(matches!(store.save(&second), Err(ApiError::SessionConflict)));

        // First writer's rotation survives
        assert!(store.find_by_token("t2").unwrap().is_some());
        assert!(store.find_by_token("t3").unwrap().is_none());
    }

    #[test]
    fn test_save_after_delete_is_conflict() {
        let store = InMemorySignupSessionStore::new();
        let saved = store.save(&session("s1", "t1")).unwrap();

        store.delete(&saved.id).unwrap();
        assert!(matches!(store.save(&saved), Err(ApiError::SessionConflict)));
    }

    #[test]
    fn test_one_session_per_device_and_phone() {
        let store = InMemorySignupSessionStore::new();
        let first = store.save(&session("s1", "t1")).unwrap();

        assert!(matches!(
            store.save(&session("s2", "t2")),
            Err(ApiError::SessionActive)
        ));
        assert!(store.find_by_token("t2").unwrap().is_none());

        // Updates to the holder still go through
        let mut update = first;
        update.status = SessionStatus::OtpFailed;
        store.save(&update).unwrap();

        let mut other = session("s3", "t3");
        other.device_id = "dev2".to_string();
        store.save(&other).unwrap();
    }

    #[test]
    fn test_delete_expired() {
        let store = InMemorySignupSessionStore::new();
        store.save(&session("s1", "t1")).unwrap();

        assert_eq!(store.delete_expired(Utc::now()).unwrap(), 0);
        assert_eq!(store.delete_expired(Utc::now() + Duration::minutes(11)).unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_directory_uniqueness() {
        let directory = InMemoryUserDirectory::new();
        directory.create_user(new_user(1)).unwrap();

        let mut dup_email = new_user(2);
        dup_email.email = "USER1@example.com".to_string();
        assert!(matches!(directory.create_user(dup_email), Err(ApiError::Conflict(_))));

        let mut dup_phone = new_user(3);
        dup_phone.phone_number = "+94770000001".to_string();
        assert!(matches!(directory.create_user(dup_phone), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn test_follow_graph_and_popularity() {
        let directory = InMemoryUserDirectory::new();
        let a = directory.create_user(new_user(1)).unwrap();
        let b = directory.create_user(new_user(2)).unwrap();
        let c = directory.create_user(new_user(3)).unwrap();

        directory.follow(&a.id, &c.id).unwrap();
        directory.follow(&b.id, &c.id).unwrap();
        directory.follow(&b.id, &c.id).unwrap();
        directory.follow(&c.id, &a.id).unwrap();

        assert_eq!(directory.followers(&c.id).unwrap().len(), 2);
        assert!(directory.is_following(&a.id, &c.id).unwrap());

        let popular = directory.popular(Some(&b.id), 10).unwrap();
        assert_eq!(popular[0].0.id, c.id);
        assert_eq!(popular[0].1, 2);
        assert!(popular.iter().all(|(u, _)| u.id != b.id));

        directory.unfollow(&a.id, &c.id).unwrap();
        assert!(!directory.is_following(&a.id, &c.id).unwrap());

        directory.delete_user(&c.id).unwrap();
        assert!(directory.following(&b.id).unwrap().is_empty());
    }
}
