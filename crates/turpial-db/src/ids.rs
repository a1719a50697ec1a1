//! # Identifier Generation
//!
//! Client-generated ids with human-readable prefixes: `S-yyMMdd-NNNN` for
//! sales, `R-yyMMdd-NNNN` for repair jobs, `RECON-yyyy-MM-dd` for daily
//! reconciliations, plain UUID v4 for products and sub-records.
//!
//! The four-digit suffix is derived from the sub-second clock, not a
//! counter. Collisions within the same day are possible in principle; the
//! primary key rejects the insert if one ever lands.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

/// Generates a sale id: `S-yyMMdd-NNNN`.
pub fn generate_sale_id() -> String {
    prefixed_daily_id("S")
}

/// Generates a repair job id: `R-yyMMdd-NNNN`.
pub fn generate_repair_id() -> String {
    prefixed_daily_id("R")
}

/// Generates the reconciliation id for a calendar day:
/// `RECON-yyyy-MM-dd`. Deterministic on purpose - one close per day.
pub fn generate_reconciliation_id(date: NaiveDate) -> String {
    format!("RECON-{}", date.format("%Y-%m-%d"))
}

/// Generates a new product id (UUID v4).
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale line id (UUID v4).
pub fn generate_line_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new payment id (UUID v4).
pub fn generate_payment_id() -> String {
    Uuid::new_v4().to_string()
}

fn prefixed_daily_id(prefix: &str) -> String {
    let now = Utc::now();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let suffix = (nanos % 10_000) as u16;
    format!("{}-{}-{:04}", prefix, now.format("%y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_id_shape() {
        let id = generate_sale_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "S");
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn test_reconciliation_id_is_date_keyed() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(generate_reconciliation_id(date), "RECON-2026-08-06");
    }
}
