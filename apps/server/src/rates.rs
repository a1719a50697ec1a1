//! # Exchange-Rate Sync
//!
//! Background poll of the official (BCV) rate.
//!
//! Fire-and-forget, best-effort: the task ticks hourly, refreshes only
//! when auto-update is enabled and the stored rate is stale (4 hours by
//! default), and swallows every failure - the register keeps pricing with
//! the locally-held rate. Core flows never wait on this task.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Shape of the external endpoint's response.
#[derive(Debug, Deserialize)]
struct RateResponse {
    promedio: f64,
}

/// What a sync attempt did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncOutcome {
    /// Rate written.
    Updated(f64),
    /// Nothing to do: auto-update off, or the stored rate is fresh.
    Skipped,
}

/// Runs the periodic sync loop. Spawned once at startup; never returns.
pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(state.config.rate_sync_interval);
    // First tick fires immediately: refresh on startup if stale
    loop {
        ticker.tick().await;

        match sync_once(&state, false).await {
            Ok(SyncOutcome::Updated(rate)) => info!(rate, "BCV rate synced"),
            Ok(SyncOutcome::Skipped) => debug!("BCV rate sync skipped"),
            // Fail open: the stale local rate remains in effect
            Err(e) => warn!(error = %e, "BCV rate sync failed"),
        }
    }
}

/// One sync attempt. `force` bypasses the auto-update flag and the
/// staleness window (manual trigger from the settings page).
pub async fn sync_once(state: &AppState, force: bool) -> Result<SyncOutcome, ApiError> {
    let settings = state.db.settings().get().await?;

    if !force {
        if !settings.auto_update_bcv {
            return Ok(SyncOutcome::Skipped);
        }

        let age = chrono::Utc::now() - settings.last_updated;
        let staleness = chrono::Duration::from_std(state.config.rate_staleness)
            .unwrap_or_else(|_| chrono::Duration::hours(4));
        if age < staleness {
            return Ok(SyncOutcome::Skipped);
        }
    }

    let response: RateResponse = state
        .http
        .get(&state.config.rate_api_url)
        .send()
        .await
        .map_err(|e| ApiError::upstream(format!("rate endpoint unreachable: {}", e)))?
        .error_for_status()
        .map_err(|e| ApiError::upstream(format!("rate endpoint error: {}", e)))?
        .json()
        .await
        .map_err(|e| ApiError::upstream(format!("rate endpoint returned bad JSON: {}", e)))?;

    if !response.promedio.is_finite() || response.promedio <= 0.0 {
        return Err(ApiError::upstream(format!(
            "rate endpoint returned unusable rate: {}",
            response.promedio
        )));
    }

    state.db.settings().set_bcv_rate(response.promedio).await?;

    Ok(SyncOutcome::Updated(response.promedio))
}
