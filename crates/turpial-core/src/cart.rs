//! # Cart & Payment Settlement
//!
//! Cart lines with frozen prices, cart totals, and the settlement rule
//! that turns a list of tendered payments into recorded payments plus
//! change.
//!
//! ## Price Freezing
//! A cart line captures the resolved price at the moment the product is
//! added. If the product price changes before checkout, the cart keeps
//! the price the customer was quoted.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::rates::{convert, Currency, ExchangeRates};
use crate::types::{AppSettings, PaymentMethod, Product, RepairJob};

// =============================================================================
// Cart Items
// =============================================================================

/// A line in the cart, price already resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    /// Absent for custom lines.
    pub product_id: Option<String>,
    /// Name at the moment of adding (frozen).
    pub name: String,
    /// USD cents at the moment of adding (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub is_repair: bool,
    pub is_promo: bool,
    pub is_gift: bool,
    pub is_custom: bool,
    /// Set on repair lines.
    pub repair_job_id: Option<String>,
}

impl CartItem {
    /// Builds a line from a product, resolving and freezing its price.
    pub fn from_product(product: &Product, quantity: i64, settings: &AppSettings) -> Self {
        let resolved = product.retail_price(settings);
        CartItem {
            product_id: Some(product.id.clone()),
            name: product.name.clone(),
            unit_price_cents: resolved.price.cents(),
            quantity,
            is_repair: false,
            is_promo: resolved.is_promo,
            is_gift: false,
            is_custom: false,
            repair_job_id: None,
        }
    }

    /// Builds a zero-priced gift line for a giftable product.
    pub fn gift(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: Some(product.id.clone()),
            name: product.name.clone(),
            unit_price_cents: 0,
            quantity,
            is_repair: false,
            is_promo: false,
            is_gift: true,
            is_custom: false,
            repair_job_id: None,
        }
    }

    /// Builds a custom line (service, misc charge). Never touches stock.
    pub fn custom(name: impl Into<String>, unit_price_cents: i64, quantity: i64) -> Self {
        CartItem {
            product_id: None,
            name: name.into(),
            unit_price_cents,
            quantity,
            is_repair: false,
            is_promo: false,
            is_gift: false,
            is_custom: true,
            repair_job_id: None,
        }
    }

    /// Builds the settlement line for a repair job: the outstanding
    /// balance of the quote.
    pub fn repair(job: &RepairJob) -> Self {
        let balance = (job.estimated_cost_cents - job.amount_paid_cents).max(0);
        CartItem {
            product_id: None,
            name: format!("Reparación {} {}", job.device_brand, job.device_model),
            unit_price_cents: balance,
            quantity: 1,
            is_repair: true,
            is_promo: false,
            is_gift: false,
            is_custom: false,
            repair_job_id: Some(job.id.clone()),
        }
    }

    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// Subtotal of a cart (before discount).
pub fn subtotal(items: &[CartItem]) -> Money {
    items.iter().map(|i| i.line_total()).sum()
}

/// Grand total of a cart after a flat discount, floored at zero.
pub fn total(items: &[CartItem], discount: Money) -> Money {
    let t = subtotal(items) - discount;
    if t.is_negative() {
        Money::zero()
    } else {
        t
    }
}

// =============================================================================
// Payment Settlement
// =============================================================================

/// A payment as tendered by the customer, in the method's own currency.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenderedPayment {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<String>,
}

impl TenderedPayment {
    /// The tendered amount expressed in USD at the official rate.
    pub fn usd_equivalent(&self, rates: &ExchangeRates) -> Money {
        convert(
            Money::from_cents(self.amount_cents),
            self.method.currency(),
            Currency::Usd,
            rates,
        )
    }
}

/// Outcome of settling the tendered payments against a total.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Settlement {
    /// Payments as they will be recorded: USD-cash amounts reduced by the
    /// change handed back.
    pub payments: Vec<TenderedPayment>,
    /// Everything tendered, in USD cents at the official rate.
    pub tendered_usd_cents: i64,
    /// USD cash handed back to the customer.
    pub change_given_cents: i64,
    /// Change owed that could not be taken out of the USD-cash tender.
    /// Change in kind across other currencies is not synthesized; a
    /// non-zero value here surfaces on the register for the cashier to
    /// resolve by hand.
    pub unreturned_change_cents: i64,
}

/// Settles tendered payments against a sale total.
///
/// The USD-equivalent of all tenders must cover the total. Positive change
/// is returned by reducing the recorded USD-cash amounts (first tender
/// first); whatever USD cash cannot cover is reported as unreturned rather
/// than converted into a Bs payout.
pub fn settle_payments(
    payments: &[TenderedPayment],
    total: Money,
    rates: &ExchangeRates,
) -> CoreResult<Settlement> {
    if payments.iter().any(|p| p.amount_cents <= 0) {
        return Err(CoreError::InvalidPaymentAmount {
            reason: "amounts must be positive".to_string(),
        });
    }

    let tendered: Money = payments.iter().map(|p| p.usd_equivalent(rates)).sum();

    if tendered < total {
        return Err(CoreError::InsufficientPayment {
            tendered_cents: tendered.cents(),
            required_cents: total.cents(),
        });
    }

    let mut change_left = tendered - total;
    let mut change_given = Money::zero();
    let mut recorded = payments.to_vec();

    if change_left.is_positive() {
        for payment in recorded
            .iter_mut()
            .filter(|p| p.method == PaymentMethod::CashUsd)
        {
            let deduct = change_left.min(Money::from_cents(payment.amount_cents));
            payment.amount_cents -= deduct.cents();
            change_left -= deduct;
            change_given += deduct;
            if change_left.is_zero() {
                break;
            }
        }
        // Zero-amount cash records after full deduction carry no information
        recorded.retain(|p| p.amount_cents > 0);
    }

    Ok(Settlement {
        payments: recorded,
        tendered_usd_cents: tendered.cents(),
        change_given_cents: change_given.cents(),
        unreturned_change_cents: change_left.cents(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rates() -> ExchangeRates {
        ExchangeRates::new(40.0, 45.0)
    }

    fn settings() -> AppSettings {
        AppSettings {
            bcv_rate: 40.0,
            parallel_rate: 45.0,
            profit_margin_bps: 3000,
            auto_update_bcv: false,
            last_updated: Utc::now(),
        }
    }

    fn product(id: &str, cost_cents: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Producto {}", id),
            category: "General".to_string(),
            sku: format!("SKU-{}", id),
            cost_price_cents: cost_cents,
            promo_price_cents: None,
            stock_level: 10,
            reserved_stock: 0,
            damaged_stock: 0,
            low_stock_threshold: 2,
            is_combo: false,
            combo_items: Vec::new(),
            is_fixed_price: false,
            is_giftable: true,
            margin_bps: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn usd(amount_cents: i64) -> TenderedPayment {
        TenderedPayment {
            method: PaymentMethod::CashUsd,
            amount_cents,
            reference: None,
        }
    }

    fn bs(method: PaymentMethod, amount_cents: i64) -> TenderedPayment {
        TenderedPayment {
            method,
            amount_cents,
            reference: Some("ref-1".to_string()),
        }
    }

    #[test]
    fn test_cart_item_freezes_resolved_price() {
        let p = product("1", 1000);
        let item = CartItem::from_product(&p, 2, &settings());
        assert_eq!(item.unit_price_cents, 1463);
        assert_eq!(item.line_total().cents(), 2926);
        assert!(!item.is_promo);
    }

    #[test]
    fn test_gift_line_is_free_but_tracked() {
        let p = product("1", 1000);
        let item = CartItem::gift(&p, 1);
        assert_eq!(item.unit_price_cents, 0);
        assert!(item.is_gift);
        assert!(item.product_id.is_some());
    }

    #[test]
    fn test_custom_line_has_no_product() {
        let item = CartItem::custom("Instalación de mica", 500, 1);
        assert!(item.is_custom);
        assert!(item.product_id.is_none());
    }

    #[test]
    fn test_repair_line_prices_outstanding_balance() {
        let job = RepairJob {
            id: "R-260806-0001".to_string(),
            customer_name: "Ana".to_string(),
            customer_phone: "0414-5550000".to_string(),
            device_brand: "Samsung".to_string(),
            device_model: "A52".to_string(),
            reported_issue: "Pantalla rota".to_string(),
            status: crate::types::RepairStatus::InProgress,
            estimated_cost_cents: 4500,
            amount_paid_cents: 1500,
            is_paid: false,
            reserved_parts: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            warranty_end_date: None,
        };
        let item = CartItem::repair(&job);
        assert_eq!(item.unit_price_cents, 3000);
        assert!(item.is_repair);
        assert_eq!(item.repair_job_id.as_deref(), Some("R-260806-0001"));
    }

    #[test]
    fn test_totals_with_discount() {
        let items = vec![CartItem::custom("A", 1000, 2), CartItem::custom("B", 500, 1)];
        assert_eq!(subtotal(&items).cents(), 2500);
        assert_eq!(total(&items, Money::from_cents(300)).cents(), 2200);
        assert_eq!(total(&items, Money::from_cents(9999)).cents(), 0);
    }

    #[test]
    fn test_settle_exact_payment() {
        let s = settle_payments(&[usd(1000)], Money::from_cents(1000), &rates()).unwrap();
        assert_eq!(s.change_given_cents, 0);
        assert_eq!(s.unreturned_change_cents, 0);
        assert_eq!(s.payments.len(), 1);
        assert_eq!(s.payments[0].amount_cents, 1000);
    }

    #[test]
    fn test_settle_change_reduces_usd_cash() {
        // $20 tendered against $14.50: $5.50 back, recorded cash drops to $14.50
        let s = settle_payments(&[usd(2000)], Money::from_cents(1450), &rates()).unwrap();
        assert_eq!(s.change_given_cents, 550);
        assert_eq!(s.unreturned_change_cents, 0);
        assert_eq!(s.payments[0].amount_cents, 1450);
    }

    #[test]
    fn test_settle_mixed_currency() {
        // Total $25. Tendered: 400 Bs (=$10 at bcv 40) + $20 cash.
        // $5 change comes out of the cash tender.
        let s = settle_payments(
            &[bs(PaymentMethod::PagoMovil, 40_000), usd(2000)],
            Money::from_cents(2500),
            &rates(),
        )
        .unwrap();
        assert_eq!(s.tendered_usd_cents, 3000);
        assert_eq!(s.change_given_cents, 500);
        let cash = s
            .payments
            .iter()
            .find(|p| p.method == PaymentMethod::CashUsd)
            .unwrap();
        assert_eq!(cash.amount_cents, 1500);
        // The Bs tender is recorded untouched
        let pm = s
            .payments
            .iter()
            .find(|p| p.method == PaymentMethod::PagoMovil)
            .unwrap();
        assert_eq!(pm.amount_cents, 40_000);
    }

    #[test]
    fn test_settle_change_without_usd_cash_is_unreturned() {
        // 1100 Bs tendered (=$27.50) against $25: $2.50 owed but no USD
        // cash to take it from. The limitation is surfaced, not hidden.
        let s = settle_payments(
            &[bs(PaymentMethod::CashBs, 110_000)],
            Money::from_cents(2500),
            &rates(),
        )
        .unwrap();
        assert_eq!(s.change_given_cents, 0);
        assert_eq!(s.unreturned_change_cents, 250);
    }

    #[test]
    fn test_settle_insufficient_payment() {
        let err = settle_payments(&[usd(500)], Money::from_cents(1000), &rates()).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientPayment { .. }));
    }

    #[test]
    fn test_settle_rejects_non_positive_amounts() {
        let err =
            settle_payments(&[usd(0)], Money::from_cents(0), &rates()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPaymentAmount { .. }));
    }

    #[test]
    fn test_settle_change_consumed_across_cash_tenders() {
        // Two cash tenders, change larger than the first
        let s = settle_payments(
            &[usd(100), usd(2000)],
            Money::from_cents(1800),
            &rates(),
        )
        .unwrap();
        assert_eq!(s.change_given_cents, 300);
        // First tender fully consumed and dropped, second reduced
        assert_eq!(s.payments.len(), 1);
        assert_eq!(s.payments[0].amount_cents, 1800);
    }
}
