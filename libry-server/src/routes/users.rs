//! User search and the follow graph

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::ApiResponse;
use crate::error::ApiError;
use crate::social::UserCard;
use crate::state::{blocking, AppState};
use crate::store::{UserId, UserSearch};

#[derive(Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub exclude_logged_user: Option<bool>,
}

/// GET /user
pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<UserCard>>>, ApiError> {
    let exclude_me = query.exclude_logged_user.unwrap_or(true);
    let search = UserSearch {
        name: query.name,
        email: query.email,
        phone_number: query.phone_number,
        exclude: None,
    };

    let users = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.search(&me, search, exclude_me)
    })
    .await?;

    Ok(ApiResponse::ok("Users", users))
}

/// GET /user/popular
pub async fn popular(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<UserCard>>>, ApiError> {
    let users = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.popular(&me)
    })
    .await?;

    Ok(ApiResponse::ok("Popular users", users))
}

/// GET /user/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserCard>>, ApiError> {
    let user = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.get(&me, &UserId(id))
    })
    .await?;

    Ok(ApiResponse::ok("User", user))
}

/// POST /user/{id}/follow
pub async fn follow(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserCard>>, ApiError> {
    let user = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.follow(&me, &UserId(id))
    })
    .await?;

    Ok(ApiResponse::ok("Followed", user))
}

/// POST /user/{id}/unfollow
pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserCard>>, ApiError> {
    let user = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.unfollow(&me, &UserId(id))
    })
    .await?;

    Ok(ApiResponse::ok("Unfollowed", user))
}

/// GET /user/{id}/followers
pub async fn followers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<UserCard>>>, ApiError> {
    let users = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.followers(&me, &UserId(id))
    })
    .await?;

    Ok(ApiResponse::ok("Followers", users))
}

/// GET /user/{id}/following
pub async fn following(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<UserCard>>>, ApiError> {
    let users = blocking(&state, move |s| {
        let me = s.authenticator.authenticate_headers(&headers)?;
        s.social.following(&me, &UserId(id))
    })
    .await?;

    Ok(ApiResponse::ok("Following", users))
}
