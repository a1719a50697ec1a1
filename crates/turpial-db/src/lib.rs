//! # turpial-db: Database Layer for Turpial POS
//!
//! SQLite persistence for the register: connection pool, embedded
//! migrations, one repository per collection, and the three multi-step
//! atomic operations (checkout, refund, close-day) in [`ops`].
//!
//! ## Transaction Contract
//! Every operation that touches more than one document runs inside a
//! single SQLite transaction: all reads observe a consistent snapshot,
//! all writes apply together or not at all. Stock mutations are always
//! read-modify-write inside that transaction, never blind decrements.

pub mod error;
pub mod ids;
pub mod migrations;
pub mod ops;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// =============================================================================
// Test Utilities
// =============================================================================

/// Shared helpers for the transactional tests: an isolated in-memory
/// database plus seed data shaped like the shop's real catalog.
#[cfg(test)]
pub(crate) mod testutil {
    use chrono::Utc;

    use crate::ids::generate_product_id;
    use crate::pool::{Database, DbConfig};
    use turpial_core::{
        AppSettings, ComboComponent, PaymentMethod, Product, TenderedPayment,
    };

    /// Fresh in-memory database with migrations applied.
    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }

    /// Writes the standard test settings (bcv 40, parallel 45, margin
    /// 30%) and returns the snapshot.
    pub async fn seed_settings(db: &Database) -> AppSettings {
        let settings = AppSettings {
            bcv_rate: 40.0,
            parallel_rate: 45.0,
            profit_margin_bps: 3000,
            auto_update_bcv: false,
            last_updated: Utc::now(),
        };
        db.settings().update(&settings).await.expect("seed settings");
        settings
    }

    /// Inserts a fixed-price product so its retail price equals
    /// `price_cents` and tests stay arithmetic-free.
    pub async fn seed_product(db: &Database, sku: &str, stock: i64, price_cents: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: format!("Producto {}", sku),
            category: "Pruebas".to_string(),
            sku: sku.to_string(),
            cost_price_cents: price_cents,
            promo_price_cents: None,
            stock_level: stock,
            reserved_stock: 0,
            damaged_stock: 0,
            low_stock_threshold: 1,
            is_combo: false,
            combo_items: Vec::new(),
            is_fixed_price: true,
            is_giftable: true,
            margin_bps: None,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.expect("seed product");
        product
    }

    /// Inserts a fixed-price combo over the given (component, quantity)
    /// pairs. The combo itself carries no stock; its components do.
    pub async fn seed_combo(
        db: &Database,
        sku: &str,
        components: &[(&Product, i64)],
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: format!("Combo {}", sku),
            category: "Combos".to_string(),
            sku: sku.to_string(),
            cost_price_cents: 1000,
            promo_price_cents: None,
            stock_level: 0,
            reserved_stock: 0,
            damaged_stock: 0,
            low_stock_threshold: 0,
            is_combo: true,
            combo_items: components
                .iter()
                .map(|(p, qty)| ComboComponent {
                    product_id: p.id.clone(),
                    quantity: *qty,
                })
                .collect(),
            is_fixed_price: true,
            is_giftable: false,
            margin_bps: None,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.expect("seed combo");
        product
    }

    /// A USD cash tender.
    pub fn usd(amount_cents: i64) -> TenderedPayment {
        TenderedPayment {
            method: PaymentMethod::CashUsd,
            amount_cents,
            reference: None,
        }
    }
}
