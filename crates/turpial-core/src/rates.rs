//! # Exchange Rates & Dynamic Pricing
//!
//! The dual-currency pricing rules of the shop.
//!
//! Two exchange rates coexist and are never interchangeable:
//!
//! - `bcv_rate` — the official rate. The ONLY rate used to convert amounts
//!   between USD and Bs for display, payments, and reconciliation.
//! - `parallel_rate` — the informal market rate. Used exclusively as the
//!   cost basis when computing a retail price, because restocking a product
//!   costs the merchant Bolívars at the parallel rate, not the official one.
//!
//! ## Pricing formula
//! ```text
//! retail_usd = round2( (cost_usd × parallel_rate) × (1 + margin) / bcv_rate )
//! ```
//! The cost is inflated to its Bolívar replacement cost at the parallel
//! rate, the profit margin is applied in Bolívars, and the result converts
//! back to USD at the official rate — the price the register charges.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Currency
// =============================================================================

/// The two currencies the shop operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// US dollars.
    Usd,
    /// Venezuelan bolívars.
    Bs,
}

// =============================================================================
// Margin
// =============================================================================

/// Profit margin represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 3000 bps = 30%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MarginBps(u32);

impl MarginBps {
    /// Creates a margin from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        MarginBps(bps)
    }

    /// Creates a margin from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        MarginBps((pct * 100.0).round() as u32)
    }

    /// Returns the margin in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the margin as a fraction (3000 bps -> 0.30).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    /// Returns the margin as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for MarginBps {
    fn default() -> Self {
        MarginBps(0)
    }
}

// =============================================================================
// Exchange Rates
// =============================================================================

/// A snapshot of the two exchange rates, in Bs per USD.
///
/// Read from the settings document at the start of an operation and passed
/// by value; pricing never reads global state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRates {
    /// Official (BCV) rate. Drives all USD <-> Bs conversion.
    pub bcv_rate: f64,
    /// Parallel market rate. Drives the cost basis of dynamic pricing only.
    pub parallel_rate: f64,
}

impl ExchangeRates {
    /// Creates a rate snapshot.
    pub const fn new(bcv_rate: f64, parallel_rate: f64) -> Self {
        ExchangeRates {
            bcv_rate,
            parallel_rate,
        }
    }

    /// Both rates are strictly positive.
    pub fn is_usable(&self) -> bool {
        self.bcv_rate > 0.0 && self.parallel_rate > 0.0
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Computes the suggested USD retail price for a cost price.
///
/// `(cost × parallel_rate) × (1 + margin) / bcv_rate`, rounded to the cent.
///
/// Non-positive costs and unusable rates price at zero; the result is never
/// negative.
///
/// ## Example
/// ```rust
/// use turpial_core::money::Money;
/// use turpial_core::rates::{dynamic_price, ExchangeRates, MarginBps};
///
/// let rates = ExchangeRates::new(40.0, 45.0);
/// let price = dynamic_price(Money::from_cents(1000), &rates, MarginBps::from_bps(3000));
/// // 10.00 × 45 = 450 Bs; × 1.30 = 585 Bs; / 40 = 14.625 -> $14.63
/// assert_eq!(price.cents(), 1463);
/// ```
pub fn dynamic_price(cost: Money, rates: &ExchangeRates, margin: MarginBps) -> Money {
    if cost.cents() <= 0 || !rates.is_usable() {
        return Money::zero();
    }

    let replacement_bs = cost.cents() as f64 * rates.parallel_rate;
    let with_margin = replacement_bs * (1.0 + margin.fraction());
    let usd_cents = (with_margin / rates.bcv_rate).round() as i64;

    Money::from_cents(usd_cents.max(0))
}

/// Converts an amount between USD and Bs at the official rate.
///
/// This is a pure linear scale by `bcv_rate` — the parallel rate is never
/// used for conversion, only for pricing cost basis. Same-currency
/// conversion is the identity.
pub fn convert(amount: Money, from: Currency, to: Currency, rates: &ExchangeRates) -> Money {
    if from == to {
        return amount;
    }
    if rates.bcv_rate <= 0.0 {
        return Money::zero();
    }

    let cents = match (from, to) {
        (Currency::Usd, Currency::Bs) => (amount.cents() as f64 * rates.bcv_rate).round(),
        (Currency::Bs, Currency::Usd) => (amount.cents() as f64 / rates.bcv_rate).round(),
        _ => unreachable!("same-currency handled above"),
    };

    Money::from_cents(cents as i64)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> ExchangeRates {
        ExchangeRates::new(40.0, 45.0)
    }

    #[test]
    fn test_dynamic_price_formula() {
        // $10.00 cost, parallel 45, margin 30%, bcv 40:
        // 450 Bs replacement -> 585 Bs with margin -> $14.625 -> $14.63
        let price = dynamic_price(Money::from_cents(1000), &rates(), MarginBps::from_bps(3000));
        assert_eq!(price.cents(), 1463);
    }

    #[test]
    fn test_dynamic_price_zero_and_negative_cost() {
        assert_eq!(
            dynamic_price(Money::zero(), &rates(), MarginBps::from_bps(3000)),
            Money::zero()
        );
        assert_eq!(
            dynamic_price(Money::from_cents(-500), &rates(), MarginBps::from_bps(3000)),
            Money::zero()
        );
    }

    #[test]
    fn test_dynamic_price_unusable_rates() {
        let bad = ExchangeRates::new(0.0, 45.0);
        assert_eq!(
            dynamic_price(Money::from_cents(1000), &bad, MarginBps::from_bps(3000)),
            Money::zero()
        );
    }

    #[test]
    fn test_dynamic_price_monotonic_in_cost() {
        let margin = MarginBps::from_bps(3000);
        let mut last = Money::zero();
        for cost in [100, 500, 1000, 5000, 100_000] {
            let p = dynamic_price(Money::from_cents(cost), &rates(), margin);
            assert!(p > last, "price must grow with cost");
            last = p;
        }
    }

    #[test]
    fn test_dynamic_price_monotonic_in_parallel_and_margin() {
        let cost = Money::from_cents(10_000);

        let low = dynamic_price(cost, &ExchangeRates::new(40.0, 42.0), MarginBps::from_bps(2000));
        let higher_parallel =
            dynamic_price(cost, &ExchangeRates::new(40.0, 50.0), MarginBps::from_bps(2000));
        let higher_margin =
            dynamic_price(cost, &ExchangeRates::new(40.0, 42.0), MarginBps::from_bps(3500));

        assert!(higher_parallel > low);
        assert!(higher_margin > low);
    }

    #[test]
    fn test_dynamic_price_antitone_in_bcv() {
        let cost = Money::from_cents(10_000);
        let margin = MarginBps::from_bps(3000);

        let cheap_bcv = dynamic_price(cost, &ExchangeRates::new(38.0, 45.0), margin);
        let steep_bcv = dynamic_price(cost, &ExchangeRates::new(44.0, 45.0), margin);

        assert!(steep_bcv < cheap_bcv, "higher official rate lowers the USD price");
    }

    #[test]
    fn test_convert_uses_bcv_only() {
        // 100 USD at bcv 40 -> 4000 Bs, regardless of the parallel rate
        let r = ExchangeRates::new(40.0, 999.0);
        let bs = convert(Money::from_cents(10_000), Currency::Usd, Currency::Bs, &r);
        assert_eq!(bs.cents(), 400_000);
    }

    #[test]
    fn test_convert_identity() {
        let x = Money::from_cents(1234);
        assert_eq!(convert(x, Currency::Usd, Currency::Usd, &rates()), x);
    }

    #[test]
    fn test_convert_round_trip() {
        let r = ExchangeRates::new(36.58, 44.0);
        for cents in [1, 99, 1000, 123_456, 9_999_999] {
            let x = Money::from_cents(cents);
            let back = convert(convert(x, Currency::Usd, Currency::Bs, &r), Currency::Bs, Currency::Usd, &r);
            // Round trip within one cent of rounding error
            assert!((back.cents() - x.cents()).abs() <= 1, "{} -> {}", x, back);
        }
    }

    #[test]
    fn test_margin_bps() {
        let m = MarginBps::from_percentage(30.0);
        assert_eq!(m.bps(), 3000);
        assert!((m.fraction() - 0.30).abs() < 1e-9);
        assert!((m.percentage() - 30.0).abs() < 1e-9);
    }
}
