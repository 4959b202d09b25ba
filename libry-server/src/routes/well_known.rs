//! Published signing keys

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use libry_core::KeySet;

use crate::state::AppState;

/// GET /.well-known/jwks.json
pub async fn jwks(State(state): State<Arc<AppState>>) -> Json<KeySet> {
    Json(state.identity.key_set())
}
