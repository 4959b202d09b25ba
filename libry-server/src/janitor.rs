//! Background removal of expired signup sessions

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::ApiError;
use crate::state::{blocking, AppState};

/// How often the janitor runs
pub const REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Delete expired signup sessions once
pub async fn reap(state: &Arc<AppState>) -> Result<u64, ApiError> {
    blocking(state, |s| s.signup.reap_expired()).await
}

/// Reap expired sessions every `period` until the runtime shuts down
pub fn spawn(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match reap(&state).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "Reaped expired signup sessions"),
                Err(e) => tracing::error!(error = %e, "Failed to reap expired signup sessions"),
            }
        }
    })
}
