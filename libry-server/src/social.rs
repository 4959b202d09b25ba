//! Profiles and the follow graph

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::store::{ProfileUpdate, User, UserDirectory, UserId, UserSearch};

/// Number of users returned by [`SocialService::popular`]
pub const POPULAR_LIMIT: usize = 10;

/// The public projection of a user
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub email: String,
    pub email_verified: bool,
    pub phone_number: String,
    pub phone_number_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.0.clone(),
            name: user.name.clone(),
            birth_date: user.birth_date,
            email: user.email.clone(),
            email_verified: user.email_verified,
            phone_number: user.phone_number.clone(),
            phone_number_verified: user.phone_number_verified,
            created_at: user.created_at,
        }
    }
}

/// A user as seen by another user
#[derive(Debug, Clone, Serialize)]
pub struct UserCard {
    #[serde(flatten)]
    pub user: UserView,
    pub follower_count: u64,
    pub following_count: u64,
    /// Whether the viewer follows this user
    pub is_followed: bool,
}

/// The signed-in user's own profile
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: UserView,
    pub followers: Vec<UserView>,
    pub following: Vec<UserView>,
}

pub struct SocialService {
    users: Arc<dyn UserDirectory>,
}

impl SocialService {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    pub fn profile(&self, me: &User) -> Result<Profile, ApiError> {
        Ok(Profile {
            user: me.into(),
            followers: self.users.followers(&me.id)?.iter().map(UserView::from).collect(),
            following: self.users.following(&me.id)?.iter().map(UserView::from).collect(),
        })
    }

    /// Fill in name and birth date after signup
    pub fn onboard(
        &self,
        me: &User,
        name: Option<String>,
        birth_date: Option<NaiveDate>,
    ) -> Result<UserView, ApiError> {
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if let Some(date) = birth_date {
            if date > Utc::now().date_naive() {
                return Err(ApiError::ValidationError(
                    "birth_date is in the future".to_string(),
                ));
            }
        }

        let user = self
            .users
            .update_profile(&me.id, ProfileUpdate { name, birth_date })?;
        tracing::info!(user_id = %user.id, "Profile updated");
        Ok((&user).into())
    }

    pub fn search(
        &self,
        me: &User,
        mut query: UserSearch,
        exclude_me: bool,
    ) -> Result<Vec<UserCard>, ApiError> {
        query.exclude = exclude_me.then(|| me.id.clone());
        self.users
            .search(&query)?
            .iter()
            .map(|u| self.card(me, u))
            .collect()
    }

    /// Most followed users, excluding the viewer
    pub fn popular(&self, me: &User) -> Result<Vec<UserCard>, ApiError> {
        self.users
            .popular(Some(&me.id), POPULAR_LIMIT)?
            .iter()
            .map(|(u, _)| self.card(me, u))
            .collect()
    }

    pub fn get(&self, me: &User, id: &UserId) -> Result<UserCard, ApiError> {
        let user = self.require(id)?;
        self.card(me, &user)
    }

    pub fn follow(&self, me: &User, id: &UserId) -> Result<UserCard, ApiError> {
        if &me.id == id {
            return Err(ApiError::ValidationError("cannot follow yourself".to_string()));
        }
        let target = self.require(id)?;
        self.users.follow(&me.id, &target.id)?;
        tracing::info!(user_id = %me.id, followee = %target.id, "Followed");
        self.card(me, &target)
    }

    pub fn unfollow(&self, me: &User, id: &UserId) -> Result<UserCard, ApiError> {
        let target = self.require(id)?;
        self.users.unfollow(&me.id, &target.id)?;
        tracing::info!(user_id = %me.id, followee = %target.id, "Unfollowed");
        self.card(me, &target)
    }

    pub fn followers(&self, me: &User, id: &UserId) -> Result<Vec<UserCard>, ApiError> {
        let user = self.require(id)?;
        self.users
            .followers(&user.id)?
            .iter()
            .map(|u| self.card(me, u))
            .collect()
    }

    pub fn following(&self, me: &User, id: &UserId) -> Result<Vec<UserCard>, ApiError> {
        let user = self.require(id)?;
        self.users
            .following(&user.id)?
            .iter()
            .map(|u| self.card(me, u))
            .collect()
    }

    fn require(&self, id: &UserId) -> Result<User, ApiError> {
        self.users.get_user(id)?.ok_or(ApiError::UserNotFound)
    }

    fn card(&self, me: &User, user: &User) -> Result<UserCard, ApiError> {
        Ok(UserCard {
            user: user.into(),
            follower_count: self.users.followers(&user.id)?.len() as u64,
            following_count: self.users.following(&user.id)?.len() as u64,
            is_followed: self.users.is_following(&me.id, &user.id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryUserDirectory, NewUser};

    fn setup() -> (SocialService, Vec<User>) {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let users: Vec<User> = (1..=3)
            .map(|n| {
                directory
                    .create_user(NewUser {
                        email: format!("user{}@x.com", n),
                        phone_number: format!("+9477000000{}", n),
                        subject: format!("sub-{}", n),
                        user_confirmed: true,
                    })
                    .unwrap()
            })
            .collect();
        (SocialService::new(directory), users)
    }

    #[test]
    fn test_follow_updates_counts() {
        let (social, users) = setup();
        let (a, b) = (&users[0], &users[1]);

        let card = social.follow(a, &b.id).unwrap();
        assert!(card.is_followed);
        assert_eq!(card.follower_count, 1);

        // Following twice changes nothing
        let card = social.follow(a, &b.id).unwrap();
        assert_eq!(card.follower_count, 1);

        let profile = social.profile(a).unwrap();
        assert_eq!(profile.following.len(), 1);
        assert!(profile.followers.is_empty());

        let card = social.unfollow(a, &b.id).unwrap();
        assert!(!card.is_followed);
        assert_eq!(card.follower_count, 0);
    }

    #[test]
    fn test_cannot_follow_self_or_missing_user() {
        let (social, users) = setup();

        assert!(matches!(
            social.follow(&users[0], &users[0].id),
            Err(ApiError::ValidationError(_))
        ));
        assert!(matches!(
            social.follow(&users[0], &UserId("missing".into())),
            Err(ApiError::UserNotFound)
        ));
    }

    #[test]
    fn test_search_excludes_viewer() {
        let (social, users) = setup();
        let query = UserSearch {
            email: Some("@x.com".into()),
            ..Default::default()
        };

        assert_eq!(social.search(&users[0], query.clone(), true).unwrap().len(), 2);
        assert_eq!(social.search(&users[0], query, false).unwrap().len(), 3);
    }

    #[test]
    fn test_popular_ranks_by_followers() {
        let (social, users) = setup();
        social.follow(&users[0], &users[2].id).unwrap();
        social.follow(&users[1], &users[2].id).unwrap();
        social.follow(&users[2], &users[1].id).unwrap();

        let popular = social.popular(&users[0]).unwrap();
        assert_eq!(popular.len(), 2);
        assert_eq!(popular[0].user.id, users[2].id.0);
        assert_eq!(popular[0].follower_count, 2);
        assert!(popular[0].is_followed);
    }

    #[test]
    fn test_onboarding() {
        let (social, users) = setup();
        let birth_date = NaiveDate::from_ymd_opt(1995, 1, 31).unwrap();

        let view = social
            .onboard(&users[0], Some(" Ada ".into()), Some(birth_date))
            .unwrap();
        assert_eq!(view.name.as_deref(), Some("Ada"));
        assert_eq!(view.birth_date, Some(birth_date));

        let future = Utc::now().date_naive() + chrono::Duration::days(2);
        assert!(matches!(
            social.onboard(&users[0], None, Some(future)),
            Err(ApiError::ValidationError(_))
        ));
    }
}
