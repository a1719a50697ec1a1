//! # Domain Types
//!
//! Core domain types used throughout Turpial POS: products (with combo and
//! stock bookkeeping), repair jobs (with part reservation), sales (with
//! frozen line snapshots), daily reconciliations, and the settings
//! singleton.
//!
//! ## Dual-Key Identity Pattern
//! Products carry a UUID `id` plus a human-readable `sku`. Sales, repair
//! jobs, and reconciliations use client-generated prefixed ids
//! (`S-yyMMdd-NNNN`, `R-yyMMdd-NNNN`, `RECON-yyyy-MM-dd`) so a receipt or
//! ticket number can be read over the phone.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::rates::{dynamic_price, Currency, ExchangeRates, MarginBps};
use crate::WARRANTY_DAYS;

// =============================================================================
// Product
// =============================================================================

/// A component of a combo product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComboComponent {
    /// Product id of the component.
    pub product_id: String,
    /// Units of the component consumed per combo sold.
    pub quantity: i64,
}

/// A product in inventory.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on the register and on receipts.
    pub name: String,

    /// Category label (e.g. "Forros", "Baterías").
    pub category: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Cost price in USD cents. Input to dynamic pricing.
    pub cost_price_cents: i64,

    /// Optional promotional price override in USD cents.
    /// When set it wins over every other pricing rule.
    pub promo_price_cents: Option<i64>,

    /// Units physically on the shelf.
    pub stock_level: i64,

    /// Units reserved against open repair jobs.
    pub reserved_stock: i64,

    /// Units set aside as damaged (refund disposition).
    pub damaged_stock: i64,

    /// Threshold below which the product shows on the low-stock list.
    pub low_stock_threshold: i64,

    /// Whether this product is a bundle of other products.
    pub is_combo: bool,

    /// Component list for combos; empty for simple products.
    pub combo_items: Vec<ComboComponent>,

    /// The cost price IS the retail price; dynamic pricing is skipped.
    pub is_fixed_price: bool,

    /// Product may be given away at zero price (gift line).
    pub is_giftable: bool,

    /// Per-product margin override in basis points.
    pub margin_bps: Option<u32>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Outcome of resolving the retail price for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedPrice {
    /// USD retail price.
    pub price: Money,
    /// True when the promo override was applied.
    pub is_promo: bool,
}

impl Product {
    /// Returns the cost price as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Sellable units: on-shelf minus reserved minus damaged.
    ///
    /// Display-only; a checkout never rejects for low availability, it
    /// clamps the decrement at zero instead.
    #[inline]
    pub fn available_stock(&self) -> i64 {
        self.stock_level - self.reserved_stock - self.damaged_stock
    }

    /// Whether the product belongs on the low-stock list.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.available_stock() <= self.low_stock_threshold
    }

    /// Resolves the retail price for this product.
    ///
    /// Precedence: promo override, then fixed price (cost charged as-is),
    /// then dynamic pricing with the product's own margin or the global
    /// one.
    pub fn retail_price(&self, settings: &AppSettings) -> ResolvedPrice {
        if let Some(promo) = self.promo_price_cents {
            return ResolvedPrice {
                price: Money::from_cents(promo.max(0)),
                is_promo: true,
            };
        }

        if self.is_fixed_price {
            return ResolvedPrice {
                price: Money::from_cents(self.cost_price_cents.max(0)),
                is_promo: false,
            };
        }

        let margin = self
            .margin_bps
            .map(MarginBps::from_bps)
            .unwrap_or_else(|| settings.margin());

        ResolvedPrice {
            price: dynamic_price(self.cost_price(), &settings.rates(), margin),
            is_promo: false,
        }
    }
}

// =============================================================================
// Repair Jobs
// =============================================================================

/// Lifecycle state of a repair job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    /// Received, not yet on the bench.
    Pending,
    /// Being worked on.
    InProgress,
    /// Repaired; completion is stamped at checkout when the job is paid.
    Completed,
    /// Handed back to the customer.
    Delivered,
}

impl Default for RepairStatus {
    fn default() -> Self {
        RepairStatus::Pending
    }
}

/// A part reserved against (or consumed by) a repair job.
///
/// The name is frozen at reservation time so tickets print correctly even
/// if the product is later renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReservedPart {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
}

/// A device repair job.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RepairJob {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub device_brand: String,
    pub device_model: String,
    pub reported_issue: String,
    pub status: RepairStatus,
    /// Quoted cost in USD cents.
    pub estimated_cost_cents: i64,
    /// Paid so far in USD cents (accumulated at checkout).
    pub amount_paid_cents: i64,
    pub is_paid: bool,
    /// Parts held against this job; each reservation increments the
    /// product's `reserved_stock` until consumed or released.
    pub reserved_parts: Vec<ReservedPart>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub warranty_end_date: Option<DateTime<Utc>>,
}

impl RepairJob {
    /// Returns the quoted cost as Money.
    #[inline]
    pub fn estimated_cost(&self) -> Money {
        Money::from_cents(self.estimated_cost_cents)
    }

    /// Warranty window end for a job completed at `completed_at`.
    pub fn warranty_end(completed_at: DateTime<Utc>) -> DateTime<Utc> {
        completed_at + Duration::days(WARRANTY_DAYS)
    }
}

// =============================================================================
// Payments
// =============================================================================

/// How a payment was tendered.
///
/// Only USD cash is dollar-denominated; every other method settles in
/// Bolívars and converts to USD at the official rate for totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical US dollars.
    CashUsd,
    /// Physical bolívars.
    CashBs,
    /// Pago Móvil bank transfer (Bs).
    PagoMovil,
    /// Card terminal ("punto de venta", Bs).
    Card,
}

impl PaymentMethod {
    /// The currency this method settles in.
    pub const fn currency(&self) -> Currency {
        match self {
            PaymentMethod::CashUsd => Currency::Usd,
            PaymentMethod::CashBs | PaymentMethod::PagoMovil | PaymentMethod::Card => Currency::Bs,
        }
    }

    /// All methods, in register display order.
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::CashUsd,
        PaymentMethod::CashBs,
        PaymentMethod::PagoMovil,
        PaymentMethod::Card,
    ];
}

/// A payment recorded against a sale.
///
/// `amount_cents` is in the method's own currency (see
/// [`PaymentMethod::currency`]).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalePayment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// External reference (transfer number, card auth code).
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SalePayment {
    /// Returns the amount as Money (method currency).
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// The amount expressed in USD at the official rate.
    pub fn usd_equivalent(&self, rates: &ExchangeRates) -> Money {
        crate::rates::convert(self.amount(), self.method.currency(), Currency::Usd, rates)
    }
}

// =============================================================================
// Sales
// =============================================================================

/// The status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Checked out and paid.
    Completed,
    /// Reversed; inventory effects undone.
    Refunded,
}

/// A line item on a sale.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    /// Absent for custom lines, which are never tracked in inventory.
    pub product_id: Option<String>,
    /// Name at time of sale (frozen).
    pub name: String,
    /// Unit price in USD cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub is_repair: bool,
    pub is_promo: bool,
    pub is_gift: bool,
    pub is_custom: bool,
    /// Set on repair lines: the job this line settles.
    pub repair_job_id: Option<String>,
    /// Set on repair lines: the parts consumed at checkout, frozen so a
    /// refund reverses exactly what was taken even if the job changed
    /// afterwards.
    pub consumed_parts: Vec<ReservedPart>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// A sale transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// USD cash returned to the customer.
    pub change_given_cents: i64,
    /// Set once the sale is closed in a daily reconciliation. A sale with
    /// this set is immutable: refunds are rejected.
    pub reconciliation_id: Option<String>,
    pub refund_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub refunded_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Whether this sale can still be refunded.
    pub fn is_refundable(&self) -> bool {
        self.status == SaleStatus::Completed && self.reconciliation_id.is_none()
    }
}

/// What to do with the stock reversed by a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockDisposition {
    /// Units go back on the shelf.
    Return,
    /// Units go back on the books but are flagged damaged.
    Damage,
}

// =============================================================================
// Daily Reconciliation
// =============================================================================

/// Per-method expected vs. counted amounts for a day close.
///
/// Amounts are in the method's own currency; `difference_cents` is
/// counted minus expected, also in the method's currency.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationLine {
    pub reconciliation_id: String,
    pub method: PaymentMethod,
    pub expected_cents: i64,
    pub counted_cents: i64,
    pub difference_cents: i64,
}

/// The end-of-day cash count. One per calendar day; the date-keyed id is
/// the primary key, so a second close of the same day fails the write.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyReconciliation {
    /// `RECON-yyyy-MM-dd`.
    pub id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    /// Total expected across methods, in USD cents at the official rate.
    pub total_expected_cents: i64,
    /// Total counted across methods, in USD cents at the official rate.
    pub total_counted_cents: i64,
    /// Grand total difference (counted − expected) in USD cents.
    pub total_difference_cents: i64,
    /// Number of sales closed by this reconciliation.
    pub sales_closed: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Settings
// =============================================================================

/// The settings singleton: exchange rates, global margin, and the
/// auto-update flag for the official rate.
///
/// Read at the start of every pricing/currency operation and passed by
/// value into the pure functions; written only by the settings form and
/// the rate-sync job.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Official (BCV) rate, Bs per USD.
    pub bcv_rate: f64,
    /// Parallel market rate, Bs per USD.
    pub parallel_rate: f64,
    /// Global profit margin in basis points.
    pub profit_margin_bps: u32,
    /// Whether the background job may overwrite `bcv_rate`.
    pub auto_update_bcv: bool,
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl AppSettings {
    /// Rate snapshot for pricing and conversion.
    #[inline]
    pub fn rates(&self) -> ExchangeRates {
        ExchangeRates::new(self.bcv_rate, self.parallel_rate)
    }

    /// Global margin.
    #[inline]
    pub fn margin(&self) -> MarginBps {
        MarginBps::from_bps(self.profit_margin_bps)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AppSettings {
        AppSettings {
            bcv_rate: 40.0,
            parallel_rate: 45.0,
            profit_margin_bps: 3000,
            auto_update_bcv: true,
            last_updated: Utc::now(),
        }
    }

    fn product(cost: i64) -> Product {
        Product {
            id: "p1".to_string(),
            name: "Forro iPhone 12".to_string(),
            category: "Forros".to_string(),
            sku: "FOR-IP12".to_string(),
            cost_price_cents: cost,
            promo_price_cents: None,
            stock_level: 10,
            reserved_stock: 2,
            damaged_stock: 1,
            low_stock_threshold: 3,
            is_combo: false,
            combo_items: Vec::new(),
            is_fixed_price: false,
            is_giftable: false,
            margin_bps: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_available_stock() {
        let p = product(1000);
        assert_eq!(p.available_stock(), 7);
        assert!(!p.is_low_stock());
    }

    #[test]
    fn test_retail_price_dynamic() {
        let p = product(1000);
        let resolved = p.retail_price(&settings());
        // Same figure as the pricing-engine test: $14.63
        assert_eq!(resolved.price.cents(), 1463);
        assert!(!resolved.is_promo);
    }

    #[test]
    fn test_retail_price_promo_wins() {
        let mut p = product(1000);
        p.promo_price_cents = Some(999);
        p.margin_bps = Some(5000);
        let resolved = p.retail_price(&settings());
        assert_eq!(resolved.price.cents(), 999);
        assert!(resolved.is_promo);
    }

    #[test]
    fn test_retail_price_fixed() {
        let mut p = product(2500);
        p.is_fixed_price = true;
        let resolved = p.retail_price(&settings());
        assert_eq!(resolved.price.cents(), 2500);
        assert!(!resolved.is_promo);
    }

    #[test]
    fn test_retail_price_product_margin_override() {
        let mut p = product(1000);
        p.margin_bps = Some(1000); // 10% instead of the global 30%
        let resolved = p.retail_price(&settings());
        // 450 Bs × 1.10 = 495 Bs / 40 = $12.375 -> $12.38
        assert_eq!(resolved.price.cents(), 1238);
    }

    #[test]
    fn test_payment_usd_equivalent() {
        let rates = ExchangeRates::new(40.0, 45.0);
        let bs = SalePayment {
            id: "pay1".to_string(),
            sale_id: "s1".to_string(),
            method: PaymentMethod::PagoMovil,
            amount_cents: 400_000, // 4000 Bs
            reference: Some("0412-555".to_string()),
            created_at: Utc::now(),
        };
        assert_eq!(bs.usd_equivalent(&rates).cents(), 10_000); // $100

        let usd = SalePayment {
            method: PaymentMethod::CashUsd,
            amount_cents: 2500,
            ..bs
        };
        assert_eq!(usd.usd_equivalent(&rates).cents(), 2500);
    }

    #[test]
    fn test_sale_refundable() {
        let sale = Sale {
            id: "S-260806-0001".to_string(),
            status: SaleStatus::Completed,
            subtotal_cents: 1000,
            discount_cents: 0,
            total_cents: 1000,
            change_given_cents: 0,
            reconciliation_id: None,
            refund_reason: None,
            refunded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(sale.is_refundable());

        let closed = Sale {
            reconciliation_id: Some("RECON-2026-08-06".to_string()),
            ..sale.clone()
        };
        assert!(!closed.is_refundable());

        let refunded = Sale {
            status: SaleStatus::Refunded,
            ..sale
        };
        assert!(!refunded.is_refundable());
    }

    #[test]
    fn test_warranty_end() {
        let completed = Utc::now();
        let end = RepairJob::warranty_end(completed);
        assert_eq!(end - completed, Duration::days(4));
    }
}
