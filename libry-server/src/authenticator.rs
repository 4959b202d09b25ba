//! Bearer token authentication for user-facing endpoints

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use libry_core::AccessToken;

use crate::error::ApiError;
use crate::identity::IdentityProvider;
use crate::store::{User, UserDirectory};

/// Extract the token from an `Authorization: Bearer …` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves access tokens to local users. Fails closed: any problem with the
/// token or the lookup is `Unauthorized`.
pub struct SessionAuthenticator {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserDirectory>,
}

impl SessionAuthenticator {
    pub fn new(identity: Arc<dyn IdentityProvider>, users: Arc<dyn UserDirectory>) -> Self {
        Self { identity, users }
    }

    pub fn authenticate(&self, token: &str) -> Result<User, ApiError> {
        let verified = AccessToken::verify(token, &self.identity.key_set(), &self.identity.validation())
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected access token");
                ApiError::Unauthorized
            })?;

        match self.users.find_by_subject(verified.subject()) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                tracing::warn!(subject = %verified.subject(), "Token subject has no local user");
                Err(ApiError::Unauthorized)
            }
            Err(e) => {
                tracing::error!(error = %e, "User lookup failed during authentication");
                Err(ApiError::Unauthorized)
            }
        }
    }

    /// Authenticate the bearer token in `headers`
    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
        self.authenticate(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Duration;
    use libry_core::{AccessClaims, KeyPair};

    use crate::email::ConsoleEmailSender;
    use crate::identity::{IdentitySettings, LocalIdentityProvider};
    use crate::store::{InMemoryCredentialStore, InMemoryUserDirectory, NewUser};

    fn settings() -> IdentitySettings {
        IdentitySettings {
            issuer: "http://localhost:3000".into(),
            client_id: "libry".into(),
            access_token_ttl: Duration::minutes(60),
            refresh_token_ttl: Duration::days(30),
            bcrypt_cost: 4,
        }
    }

    fn setup() -> (SessionAuthenticator, Arc<LocalIdentityProvider>, Arc<InMemoryUserDirectory>) {
        let identity = Arc::new(LocalIdentityProvider::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(ConsoleEmailSender::new()),
            KeyPair::generate(),
            settings(),
        ));
        let users = Arc::new(InMemoryUserDirectory::new());
        let auth = SessionAuthenticator::new(identity.clone(), users.clone());
        (auth, identity, users)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_resolves_local_user() {
        let (auth, identity, users) = setup();
        let registered = identity
            .register("a@x.com", "+94770000001", "Passw0rd!")
            .unwrap();
        identity.admin_confirm(&registered.subject).unwrap();
        let user = users
            .create_user(NewUser {
                email: "a@x.com".into(),
                phone_number: "+94770000001".into(),
                subject: registered.subject.clone(),
                user_confirmed: true,
            })
            .unwrap();

        let tokens = identity.authenticate(&registered.subject, "Passw0rd!").unwrap();
        let found = auth
            .authenticate_headers(&headers(&format!("Bearer {}", tokens.access_token)))
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn test_unknown_subject_is_unauthorized() {
        let (auth, identity, _) = setup();
        let registered = identity
            .register("a@x.com", "+94770000001", "Passw0rd!")
            .unwrap();
        identity.admin_confirm(&registered.subject).unwrap();
        let tokens = identity.authenticate(&registered.subject, "Passw0rd!").unwrap();

        assert!(matches!(
            auth.authenticate(&tokens.access_token),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn test_expired_or_foreign_tokens_rejected() {
        let (auth, _, _) = setup();

        let expired = AccessToken::issue(
            AccessClaims::new("http://localhost:3000", "libry", "sub", "u", Duration::minutes(-10)),
            &KeyPair::generate(),
        )
        .unwrap();
        assert!(matches!(
            auth.authenticate(expired.encoded()),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(auth.authenticate("garbage"), Err(ApiError::Unauthorized)));
    }
}
