//! Application state shared by the HTTP handlers

use std::sync::Arc;

use crate::account::AccountService;
use crate::authenticator::SessionAuthenticator;
use crate::config::Config;
use crate::error::ApiError;
use crate::identity::IdentityProvider;
use crate::signup::SignupService;
use crate::social::SocialService;
use crate::store::{SignupSessionStore, UserDirectory};
use crate::verify::Verifier;

pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    pub signup: SignupService,
    pub account: AccountService,
    pub social: SocialService,
    pub authenticator: SessionAuthenticator,
}

impl AppState {
    /// Wire the services over the given adapters and stores
    pub fn new(
        config: Config,
        sessions: Arc<dyn SignupSessionStore>,
        users: Arc<dyn UserDirectory>,
        verifier: Arc<dyn Verifier>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let signup = SignupService::new(
            sessions,
            users.clone(),
            verifier.clone(),
            identity.clone(),
            config.signup.clone(),
        );
        let account = AccountService::new(users.clone(), identity.clone(), verifier);
        let social = SocialService::new(users.clone());
        let authenticator = SessionAuthenticator::new(identity.clone(), users);

        Self {
            config,
            identity,
            signup,
            account,
            social,
            authenticator,
        }
    }
}

/// Run a synchronous service call off the async executor. The services talk
/// to blocking stores and HTTP clients.
pub async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))?
}
