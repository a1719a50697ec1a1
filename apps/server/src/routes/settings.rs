//! # Settings Handlers
//!
//! The settings singleton: rates, margin, auto-update flag, plus the
//! manual rate-sync trigger for the settings page.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::rates::{self, SyncOutcome};
use crate::state::AppState;
use turpial_core::validation::{validate_margin_bps, validate_rate};
use turpial_core::AppSettings;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub bcv_rate: f64,
    pub parallel_rate: f64,
    pub profit_margin_bps: u32,
    pub auto_update_bcv: bool,
    pub last_updated: String,
}

impl From<AppSettings> for SettingsDto {
    fn from(s: AppSettings) -> Self {
        SettingsDto {
            bcv_rate: s.bcv_rate,
            parallel_rate: s.parallel_rate,
            profit_margin_bps: s.profit_margin_bps,
            auto_update_bcv: s.auto_update_bcv,
            last_updated: s.last_updated.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsForm {
    pub bcv_rate: f64,
    pub parallel_rate: f64,
    pub profit_margin_bps: u32,
    pub auto_update_bcv: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRateResponse {
    pub updated: bool,
    pub bcv_rate: f64,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsDto>, ApiError> {
    let settings = state.db.settings().get().await?;
    Ok(Json(settings.into()))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(form): Json<SettingsForm>,
) -> Result<Json<SettingsDto>, ApiError> {
    debug!(bcv = form.bcv_rate, parallel = form.parallel_rate, "update_settings");

    validate_rate("bcv_rate", form.bcv_rate)?;
    validate_rate("parallel_rate", form.parallel_rate)?;
    validate_margin_bps(form.profit_margin_bps)?;

    let settings = AppSettings {
        bcv_rate: form.bcv_rate,
        parallel_rate: form.parallel_rate,
        profit_margin_bps: form.profit_margin_bps,
        auto_update_bcv: form.auto_update_bcv,
        last_updated: Utc::now(),
    };

    state.db.settings().update(&settings).await?;
    info!("Settings updated");

    let stored = state.db.settings().get().await?;
    Ok(Json(stored.into()))
}

/// Manual rate refresh from the settings page. Forces the fetch
/// regardless of staleness or the auto-update flag; failures surface to
/// the operator instead of being swallowed.
pub async fn sync_rate(
    State(state): State<AppState>,
) -> Result<Json<SyncRateResponse>, ApiError> {
    let outcome = rates::sync_once(&state, true).await?;

    let settings = state.db.settings().get().await?;
    Ok(Json(SyncRateResponse {
        updated: matches!(outcome, SyncOutcome::Updated(_)),
        bcv_rate: settings.bcv_rate,
    }))
}
