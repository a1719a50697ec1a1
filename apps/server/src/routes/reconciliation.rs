//! # Day Close Handlers
//!
//! The close-day form: a preview of expected per-method totals for the
//! operator to count against, the close itself, and reconciliation
//! history.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;
use turpial_core::{DailyReconciliation, PaymentMethod, ReconciliationLine};
use turpial_db::ops::{self, CloseDayRequest, CountedAmount};

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationDto {
    pub id: String,
    pub date: NaiveDate,
    pub total_expected_cents: i64,
    pub total_counted_cents: i64,
    pub total_difference_cents: i64,
    pub sales_closed: i64,
    pub created_at: String,
}

impl From<DailyReconciliation> for ReconciliationDto {
    fn from(r: DailyReconciliation) -> Self {
        ReconciliationDto {
            id: r.id,
            date: r.date,
            total_expected_cents: r.total_expected_cents,
            total_counted_cents: r.total_counted_cents,
            total_difference_cents: r.total_difference_cents,
            sales_closed: r.sales_closed,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationLineDto {
    pub method: PaymentMethod,
    pub expected_cents: i64,
    pub counted_cents: i64,
    pub difference_cents: i64,
}

impl From<ReconciliationLine> for ReconciliationLineDto {
    fn from(l: ReconciliationLine) -> Self {
        ReconciliationLineDto {
            method: l.method,
            expected_cents: l.expected_cents,
            counted_cents: l.counted_cents,
            difference_cents: l.difference_cents,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationDetailResponse {
    pub reconciliation: ReconciliationDto,
    pub lines: Vec<ReconciliationLineDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub date: NaiveDate,
    pub open_sales: i64,
    pub expected: Vec<ExpectedDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedDto {
    pub method: PaymentMethod,
    pub expected_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountedDto {
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDayBody {
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub counted: Vec<CountedDto>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    30
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn preview(
    State(state): State<AppState>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let date = params.date.unwrap_or_else(today);

    let preview = ops::expected_totals(state.db.pool(), date).await?;

    Ok(Json(PreviewResponse {
        date: preview.date,
        open_sales: preview.open_sales,
        expected: preview
            .expected
            .into_iter()
            .map(|(method, expected_cents)| ExpectedDto {
                method,
                expected_cents,
            })
            .collect(),
    }))
}

pub async fn close(
    State(state): State<AppState>,
    Json(body): Json<CloseDayBody>,
) -> Result<Json<ReconciliationDetailResponse>, ApiError> {
    let date = body.date.unwrap_or_else(today);
    debug!(date = %date, "close_day");

    let settings = state.db.settings().get().await?;

    let outcome = ops::close_day(
        state.db.pool(),
        &settings,
        CloseDayRequest {
            date,
            counted: body
                .counted
                .into_iter()
                .map(|c| CountedAmount {
                    method: c.method,
                    amount_cents: c.amount_cents,
                })
                .collect(),
        },
    )
    .await?;

    info!(
        id = %outcome.reconciliation.id,
        sales_closed = outcome.reconciliation.sales_closed,
        "Day closed"
    );

    Ok(Json(ReconciliationDetailResponse {
        reconciliation: outcome.reconciliation.into(),
        lines: outcome.lines.into_iter().map(Into::into).collect(),
    }))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReconciliationDetailResponse>, ApiError> {
    let reconciliation = state
        .db
        .reconciliations()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Reconciliation", &id))?;

    let lines = state.db.reconciliations().get_lines(&id).await?;

    Ok(Json(ReconciliationDetailResponse {
        reconciliation: reconciliation.into(),
        lines: lines.into_iter().map(Into::into).collect(),
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ReconciliationDto>>, ApiError> {
    let reconciliations = state.db.reconciliations().list_recent(params.limit).await?;

    Ok(Json(
        reconciliations
            .into_iter()
            .map(ReconciliationDto::from)
            .collect(),
    ))
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
