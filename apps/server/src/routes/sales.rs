//! # Sale Handlers
//!
//! Sales history, refunds, and the receipt payload.
//!
//! The receipt endpoint returns the data a thermal receipt renders - the
//! HTML and the print dialog stay in the browser. Bs figures on the
//! receipt use the official rate, like everywhere else in the UI.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;
use turpial_core::{
    convert, Currency, Money, PaymentMethod, Sale, SaleLine, SalePayment, SaleStatus,
    StockDisposition,
};
use turpial_db::ops::{self, RefundRequest};

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDto {
    pub id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub change_given_cents: i64,
    pub reconciliation_id: Option<String>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<String>,
    pub created_at: String,
}

impl From<Sale> for SaleDto {
    fn from(sale: Sale) -> Self {
        SaleDto {
            id: sale.id,
            status: sale.status,
            subtotal_cents: sale.subtotal_cents,
            discount_cents: sale.discount_cents,
            total_cents: sale.total_cents,
            change_given_cents: sale.change_given_cents,
            reconciliation_id: sale.reconciliation_id,
            refund_reason: sale.refund_reason,
            refunded_at: sale.refunded_at.map(|t| t.to_rfc3339()),
            created_at: sale.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineDto {
    pub id: String,
    pub product_id: Option<String>,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    pub is_repair: bool,
    pub is_promo: bool,
    pub is_gift: bool,
    pub is_custom: bool,
    pub repair_job_id: Option<String>,
}

impl From<SaleLine> for SaleLineDto {
    fn from(line: SaleLine) -> Self {
        SaleLineDto {
            line_total_cents: line.line_total().cents(),
            id: line.id,
            product_id: line.product_id,
            name: line.name,
            unit_price_cents: line.unit_price_cents,
            quantity: line.quantity,
            is_repair: line.is_repair,
            is_promo: line.is_promo,
            is_gift: line.is_gift,
            is_custom: line.is_custom,
            repair_job_id: line.repair_job_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePaymentDto {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<String>,
}

impl From<SalePayment> for SalePaymentDto {
    fn from(p: SalePayment) -> Self {
        SalePaymentDto {
            method: p.method,
            amount_cents: p.amount_cents,
            reference: p.reference,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetailResponse {
    pub sale: SaleDto,
    pub lines: Vec<SaleLineDto>,
    pub payments: Vec<SalePaymentDto>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Calendar day filter (yyyy-MM-dd); omitted = recent sales.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundBody {
    pub reason: String,
    pub disposition: StockDisposition,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub sale_id: String,
    pub store_name: String,
    pub timestamp: String,
    pub items: Vec<SaleLineDto>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Grand total in Bs céntimos at the official rate.
    pub total_bs_cents: i64,
    pub bcv_rate: f64,
    pub payments: Vec<SalePaymentDto>,
    pub change_given_cents: i64,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<SaleDto>>, ApiError> {
    let sales = match params.date {
        Some(date) => state.db.sales().list_for_day(date).await?,
        None => state.db.sales().list_recent(params.limit).await?,
    };

    Ok(Json(sales.into_iter().map(SaleDto::from).collect()))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaleDetailResponse>, ApiError> {
    let sale = state
        .db
        .sales()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", &id))?;

    let lines = state.db.sales().get_lines(&id).await?;
    let payments = state.db.sales().get_payments(&id).await?;

    Ok(Json(SaleDetailResponse {
        sale: sale.into(),
        lines: lines.into_iter().map(Into::into).collect(),
        payments: payments.into_iter().map(Into::into).collect(),
    }))
}

pub async fn refund(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RefundBody>,
) -> Result<Json<SaleDto>, ApiError> {
    debug!(sale_id = %id, "refund_sale");

    let sale = ops::refund(
        state.db.pool(),
        RefundRequest {
            sale_id: id,
            reason: body.reason,
            disposition: body.disposition,
        },
    )
    .await?;

    info!(sale_id = %sale.id, "Sale refunded");
    Ok(Json(sale.into()))
}

pub async fn receipt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    let sale = state
        .db
        .sales()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", &id))?;

    let lines = state.db.sales().get_lines(&id).await?;
    let payments = state.db.sales().get_payments(&id).await?;
    let settings = state.db.settings().get().await?;

    let total_bs = convert(
        Money::from_cents(sale.total_cents),
        Currency::Usd,
        Currency::Bs,
        &settings.rates(),
    );

    Ok(Json(ReceiptResponse {
        sale_id: sale.id.clone(),
        store_name: state.config.store_name.clone(),
        timestamp: sale.created_at.to_rfc3339(),
        items: lines.into_iter().map(Into::into).collect(),
        subtotal_cents: sale.subtotal_cents,
        discount_cents: sale.discount_cents,
        total_cents: sale.total_cents,
        total_bs_cents: total_bs.cents(),
        bcv_rate: settings.bcv_rate,
        payments: payments.into_iter().map(Into::into).collect(),
        change_given_cents: sale.change_given_cents,
    }))
}
