//! # turpial-core: Pure Business Logic for Turpial POS
//!
//! This crate is the heart of Turpial POS. It contains the dual-currency
//! pricing rules, cart settlement, domain types, and validation as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Turpial POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      Web Frontend                               │   │
//! │  │   Inventory ──► Cart ──► Checkout ──► Receipt / Close Day       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP (axum, apps/server)               │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ turpial-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   money   │  │   rates   │  │   cart    │   │   │
//! │  │   │  Product  │  │   Money   │  │  pricing  │  │settlement │   │   │
//! │  │   │   Sale    │  │           │  │  convert  │  │  totals   │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  turpial-db (Database Layer)                    │   │
//! │  │        SQLite repositories + checkout/refund/close-day          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, RepairJob, Sale, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`rates`] - Dual-currency pricing engine and conversion
//! - [`cart`] - Cart lines, totals, payment settlement
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64)
//! 4. **Explicit Config**: Settings are passed by value, never read globally

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod rates;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use turpial_core::Money` instead of
// `use turpial_core::money::Money`

pub use cart::{settle_payments, CartItem, Settlement, TenderedPayment};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use rates::{convert, dynamic_price, Currency, ExchangeRates, MarginBps};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Repair warranty window, in days from completion.
pub const WARRANTY_DAYS: i64 = 4;

/// Maximum quantity of a single line item.
///
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of an operator-entered reason string.
pub const MAX_REASON_LEN: usize = 500;
