//! # Settings Repository
//!
//! The settings singleton (`app_settings`, one row seeded by the initial
//! migration). Read at the start of every pricing operation; written by
//! the settings form and by the background rate sync.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use turpial_core::AppSettings;

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    bcv_rate: f64,
    parallel_rate: f64,
    profit_margin_bps: u32,
    auto_update_bcv: bool,
    last_updated: DateTime<Utc>,
}

/// Repository for the settings singleton.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Reads the settings snapshot.
    pub async fn get(&self) -> DbResult<AppSettings> {
        let row: SettingsRow = sqlx::query_as(
            "SELECT bcv_rate, parallel_rate, profit_margin_bps, auto_update_bcv, last_updated \
             FROM app_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("AppSettings", "main"))?;

        Ok(AppSettings {
            bcv_rate: row.bcv_rate,
            parallel_rate: row.parallel_rate,
            profit_margin_bps: row.profit_margin_bps,
            auto_update_bcv: row.auto_update_bcv,
            last_updated: row.last_updated,
        })
    }

    /// Writes the full settings snapshot (settings form path).
    pub async fn update(&self, settings: &AppSettings) -> DbResult<()> {
        debug!(
            bcv = settings.bcv_rate,
            parallel = settings.parallel_rate,
            "Updating settings"
        );

        let now = Utc::now();

        sqlx::query(
            "UPDATE app_settings SET bcv_rate = ?1, parallel_rate = ?2, \
             profit_margin_bps = ?3, auto_update_bcv = ?4, last_updated = ?5 \
             WHERE id = 1",
        )
        .bind(settings.bcv_rate)
        .bind(settings.parallel_rate)
        .bind(settings.profit_margin_bps)
        .bind(settings.auto_update_bcv)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrites only the official rate (background sync path).
    pub async fn set_bcv_rate(&self, rate: f64) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query("UPDATE app_settings SET bcv_rate = ?1, last_updated = ?2 WHERE id = 1")
            .bind(rate)
            .bind(now)
            .execute(&self.pool)
            .await?;

        info!(rate = rate, "Official rate updated");
        Ok(())
    }
}
