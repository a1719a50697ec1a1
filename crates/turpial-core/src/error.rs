//! # Error Types
//!
//! Domain-specific error types for turpial-core.
//!
//! `ValidationError` covers form-level input failures caught before any
//! transaction starts; `CoreError` covers business-rule violations raised
//! while an operation runs. Database failures live in turpial-db's own
//! error type, and the server maps all three onto its API error.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Checkout was attempted with no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// Tendered payments do not cover the sale total (USD equivalent).
    #[error("Insufficient payment: tendered {tendered_cents} against {required_cents}")]
    InsufficientPayment {
        tendered_cents: i64,
        required_cents: i64,
    },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// The sale was already closed in a daily reconciliation and is
    /// immutable.
    #[error("Sale {sale_id} is closed in reconciliation {reconciliation_id} and cannot be refunded")]
    SaleAlreadyReconciled {
        sale_id: String,
        reconciliation_id: String,
    },

    /// The sale was already refunded.
    #[error("Sale {sale_id} is already refunded")]
    SaleAlreadyRefunded { sale_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when user input doesn't meet requirements; they are caught
/// before business logic runs and nothing is written.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., bad SKU characters, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientPayment {
            tendered_cents: 500,
            required_cents: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient payment: tendered 500 against 1000"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "refund reason".to_string(),
        };
        assert_eq!(err.to_string(), "refund reason is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "bcv_rate".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
