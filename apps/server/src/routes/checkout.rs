//! # Checkout Handler
//!
//! One POST runs the whole checkout transaction. On a stock error the
//! transaction has already rolled back; the client keeps its cart and can
//! correct it. On success the response carries everything the receipt
//! needs.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::routes::sales::{SaleDto, SaleLineDto, SalePaymentDto};
use crate::state::AppState;
use turpial_core::{CartItem, PaymentMethod, TenderedPayment};
use turpial_db::ops::{self, CheckoutRequest};

// =============================================================================
// DTOs
// =============================================================================

/// A cart line as the register sends it: price already resolved and
/// frozen when the item was added.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    #[serde(default)]
    pub product_id: Option<String>,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    #[serde(default)]
    pub is_repair: bool,
    #[serde(default)]
    pub is_promo: bool,
    #[serde(default)]
    pub is_gift: bool,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub repair_job_id: Option<String>,
}

impl From<CartItemDto> for CartItem {
    fn from(dto: CartItemDto) -> Self {
        CartItem {
            product_id: dto.product_id,
            name: dto.name,
            unit_price_cents: dto.unit_price_cents,
            quantity: dto.quantity,
            is_repair: dto.is_repair,
            is_promo: dto.is_promo,
            is_gift: dto.is_gift,
            is_custom: dto.is_custom,
            repair_job_id: dto.repair_job_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderedPaymentDto {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    #[serde(default)]
    pub reference: Option<String>,
}

impl From<TenderedPaymentDto> for TenderedPayment {
    fn from(dto: TenderedPaymentDto) -> Self {
        TenderedPayment {
            method: dto.method,
            amount_cents: dto.amount_cents,
            reference: dto.reference,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub items: Vec<CartItemDto>,
    pub payments: Vec<TenderedPaymentDto>,
    #[serde(default)]
    pub discount_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub sale: SaleDto,
    pub lines: Vec<SaleLineDto>,
    pub payments: Vec<SalePaymentDto>,
    pub change_given_cents: i64,
    /// Change the register could not take out of the USD-cash tender.
    pub unreturned_change_cents: i64,
}

// =============================================================================
// Handler
// =============================================================================

pub async fn checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    debug!(items = body.items.len(), payments = body.payments.len(), "checkout");

    let settings = state.db.settings().get().await?;

    let outcome = ops::checkout(
        state.db.pool(),
        &settings,
        CheckoutRequest {
            items: body.items.into_iter().map(Into::into).collect(),
            payments: body.payments.into_iter().map(Into::into).collect(),
            discount_cents: body.discount_cents,
        },
    )
    .await?;

    info!(
        sale_id = %outcome.sale.id,
        total = outcome.sale.total_cents,
        "Checkout complete"
    );

    Ok(Json(CheckoutResponse {
        sale: outcome.sale.into(),
        lines: outcome.lines.into_iter().map(Into::into).collect(),
        payments: outcome.payments.into_iter().map(Into::into).collect(),
        change_given_cents: outcome.change_given_cents,
        unreturned_change_cents: outcome.unreturned_change_cents,
    }))
}
