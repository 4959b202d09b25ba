//! The signed-in user's own profile

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use super::ApiResponse;
use crate::error::ApiError;
use crate::social::{Profile, UserView};
use crate::state::{blocking, AppState};

/// GET /profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Profile>>, ApiError> {
    let profile = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.profile(&me)
    })
    .await?;

    Ok(ApiResponse::ok("Profile", profile))
}

#[derive(Deserialize)]
pub struct OnboardingRequest {
    pub name: Option<String>,
    /// `YYYY-MM-DD`
    pub birth_date: Option<NaiveDate>,
}

/// POST /profile/onboarding
pub async fn onboarding(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let user = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.onboard(&me, req.name, req.birth_date)
    })
    .await?;

    Ok(ApiResponse::ok("Profile updated", user))
}
