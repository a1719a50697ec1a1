//! # Sale Repository
//!
//! Read paths for sales, their line items, and their payments.
//!
//! Sales are written exactly twice in their life: created by the checkout
//! transaction and stamped by a refund or a day close. All three writers
//! live in [`crate::ops`]; this repository only reads.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use turpial_core::{PaymentMethod, ReservedPart, Sale, SaleLine, SalePayment, SaleStatus};

pub(crate) const SELECT_SALE: &str = "SELECT id, status, subtotal_cents, discount_cents, total_cents, \
     change_given_cents, reconciliation_id, refund_reason, refunded_at, \
     created_at, updated_at FROM sales";

pub(crate) const SELECT_LINE: &str = "SELECT id, sale_id, product_id, name, unit_price_cents, quantity, \
     is_repair, is_promo, is_gift, is_custom, repair_job_id, \
     consumed_parts, created_at FROM sale_lines";

pub(crate) const SELECT_PAYMENT: &str =
    "SELECT id, sale_id, method, amount_cents, reference, created_at FROM sale_payments";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SaleRow {
    pub id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub change_given_cents: i64,
    pub reconciliation_id: Option<String>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SaleRow {
    pub(crate) fn into_sale(self) -> Sale {
        Sale {
            id: self.id,
            status: self.status,
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            total_cents: self.total_cents,
            change_given_cents: self.change_given_cents,
            reconciliation_id: self.reconciliation_id,
            refund_reason: self.refund_reason,
            refunded_at: self.refunded_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SaleLineRow {
    pub id: String,
    pub sale_id: String,
    pub product_id: Option<String>,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub is_repair: bool,
    pub is_promo: bool,
    pub is_gift: bool,
    pub is_custom: bool,
    pub repair_job_id: Option<String>,
    pub consumed_parts: String,
    pub created_at: DateTime<Utc>,
}

impl SaleLineRow {
    pub(crate) fn into_line(self) -> DbResult<SaleLine> {
        let consumed_parts: Vec<ReservedPart> = serde_json::from_str(&self.consumed_parts)
            .map_err(|e| DbError::corrupt_column("consumed_parts", e))?;

        Ok(SaleLine {
            id: self.id,
            sale_id: self.sale_id,
            product_id: self.product_id,
            name: self.name,
            unit_price_cents: self.unit_price_cents,
            quantity: self.quantity,
            is_repair: self.is_repair,
            is_promo: self.is_promo,
            is_gift: self.is_gift,
            is_custom: self.is_custom,
            repair_job_id: self.repair_job_id,
            consumed_parts,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SalePaymentRow {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SalePaymentRow {
    pub(crate) fn into_payment(self) -> SalePayment {
        SalePayment {
            id: self.id,
            sale_id: self.sale_id,
            method: self.method,
            amount_cents: self.amount_cents,
            reference: self.reference,
            created_at: self.created_at,
        }
    }
}

/// UTC day boundaries for a calendar date.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight exists"));
    (start, start + Duration::days(1))
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> = sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_SALE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(SaleRow::into_sale))
    }

    /// Gets all line items for a sale.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let rows: Vec<SaleLineRow> = sqlx::query_as(&format!(
            "{} WHERE sale_id = ?1 ORDER BY created_at",
            SELECT_LINE
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SaleLineRow::into_line).collect()
    }

    /// Gets all payments for a sale.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<SalePayment>> {
        let rows: Vec<SalePaymentRow> = sqlx::query_as(&format!(
            "{} WHERE sale_id = ?1 ORDER BY created_at",
            SELECT_PAYMENT
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SalePaymentRow::into_payment).collect())
    }

    /// Lists recent sales, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            "{} ORDER BY created_at DESC LIMIT ?1",
            SELECT_SALE
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleRow::into_sale).collect())
    }

    /// Lists all sales of a calendar day (any status).
    pub async fn list_for_day(&self, date: NaiveDate) -> DbResult<Vec<Sale>> {
        let (start, end) = day_bounds(date);

        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            "{} WHERE created_at >= ?1 AND created_at < ?2 ORDER BY created_at",
            SELECT_SALE
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleRow::into_sale).collect())
    }

    /// Lists the open sales of a calendar day: completed and not yet
    /// closed in a reconciliation. This is the set a day close stamps.
    pub async fn open_for_day(&self, date: NaiveDate) -> DbResult<Vec<Sale>> {
        let (start, end) = day_bounds(date);

        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            "{} WHERE created_at >= ?1 AND created_at < ?2 \
             AND status = 'completed' AND reconciliation_id IS NULL \
             ORDER BY created_at",
            SELECT_SALE
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleRow::into_sale).collect())
    }
}
