//! HTTP routes

mod auth;
mod profile;
mod signup;
mod users;
mod well_known;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::ErrorDetail;
use crate::state::AppState;

/// Success envelope shared by every JSON endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let dev = state.config.dev;

    let mut router = Router::new()
        .route("/auth/signup/otp", post(signup::start))
        .route("/auth/signup/otp-verify", post(signup::verify_otp))
        .route("/auth/signup/email", post(signup::add_email))
        .route("/auth/signup/register", post(signup::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/new-password", post(auth::new_password))
        .route("/auth/verify/email", get(auth::verify_email))
        .route("/profile", get(profile::get_profile))
        .route("/profile/onboarding", post(profile::onboarding))
        .route("/user", get(users::search))
        .route("/user/popular", get(users::popular))
        .route("/user/{id}", get(users::get_user))
        .route("/user/{id}/follow", post(users::follow))
        .route("/user/{id}/unfollow", post(users::unfollow))
        .route("/user/{id}/followers", get(users::followers))
        .route("/user/{id}/following", get(users::following))
        .route("/.well-known/jwks.json", get(well_known::jwks));

    if dev {
        router = router
            .route("/auth", delete(auth::delete_user))
            .layer(middleware::from_fn(error_detail));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Development only: copy the error's debug detail into the response body
async fn error_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to buffer error response");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let mut json = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(json) => json,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    if let Some(object) = json.as_object_mut() {
        object.insert("detail".to_string(), detail.into());
    }

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(json.to_string()))
}
