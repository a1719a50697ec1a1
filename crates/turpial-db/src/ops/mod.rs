//! # Transactional Operations
//!
//! The three multi-step operations of the register, each executed as one
//! SQLite transaction:
//!
//! - [`checkout`] - decrement inventory, consume reserved repair parts,
//!   record the sale and its payments, settle change, complete the linked
//!   repair job.
//! - [`refund`] - reverse a sale's inventory effects and reset the linked
//!   repair job.
//! - [`close_day`] - the end-of-day cash count: expected vs. counted per
//!   payment method, one reconciliation document, every open sale stamped.
//!
//! All stock mutations are read-modify-write inside the transaction (read
//! the current value, compute, write the result) - never a blind
//! decrement - so concurrent operations serialize on the store's
//! transaction semantics. On any error the transaction drops and rolls
//! back; partial application is never observable.

pub mod checkout;
pub mod close_day;
pub mod refund;

pub use checkout::{checkout, CheckoutOutcome, CheckoutRequest};
pub use close_day::{close_day, expected_totals, CloseDayOutcome, CloseDayRequest, CountedAmount, DayPreview};
pub use refund::{refund, RefundRequest};
