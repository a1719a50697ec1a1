//! # Validation Module
//!
//! Form-level input validation. Everything here runs before a transaction
//! starts; a failure means nothing was written (fail closed, no partial
//! state).
//!
//! ## Usage
//! ```rust
//! use turpial_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("FOR-IP12").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_REASON_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumerics, hyphens, underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (non-empty, at most 200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a refund reason. The operator must say why; an empty reason
/// rejects the refund before any transaction is attempted.
pub fn validate_refund_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "refund reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "refund reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value (positive, at most [`MAX_ITEM_QUANTITY`]).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents (non-negative; zero allowed for gifts).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

/// Validates an exchange rate: strictly positive and finite.
pub fn validate_rate(field: &str, rate: f64) -> ValidationResult<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a profit margin in basis points.
///
/// Margins well above 100% are normal here (replacement-cost pricing), so
/// the ceiling is generous: 1000%.
pub fn validate_margin_bps(bps: u32) -> ValidationResult<()> {
    if bps > 100_000 {
        return Err(ValidationError::OutOfRange {
            field: "profit margin".to_string(),
            min: 0,
            max: 100_000,
        });
    }

    Ok(())
}

/// Validates the counted amounts of a day close: every method must be
/// counted as a non-negative amount. Rejected before the reconciliation
/// transaction is attempted.
pub fn validate_counted_amounts<'a, I>(counted: I) -> ValidationResult<()>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    for (method, cents) in counted {
        if cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: format!("counted amount for {}", method),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("FOR-IP12").is_ok());
        assert!(validate_sku("BAT_A52").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Batería Samsung A52").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_refund_reason() {
        assert!(validate_refund_reason("Cliente devolvió el forro").is_ok());
        assert!(validate_refund_reason("").is_err());
        assert!(validate_refund_reason("  ").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_rate() {
        assert!(validate_rate("bcv_rate", 36.58).is_ok());
        assert!(validate_rate("bcv_rate", 0.0).is_err());
        assert!(validate_rate("bcv_rate", -1.0).is_err());
        assert!(validate_rate("bcv_rate", f64::NAN).is_err());
        assert!(validate_rate("bcv_rate", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_counted_amounts() {
        assert!(validate_counted_amounts([("cash_usd", 0), ("card", 5000)]).is_ok());
        assert!(validate_counted_amounts([("cash_usd", 100), ("cash_bs", -1)]).is_err());
    }

    #[test]
    fn test_validate_margin_bps() {
        assert!(validate_margin_bps(0).is_ok());
        assert!(validate_margin_bps(3000).is_ok());
        assert!(validate_margin_bps(100_000).is_ok());
        assert!(validate_margin_bps(100_001).is_err());
    }
}
