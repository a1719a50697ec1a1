//! # Product Repository
//!
//! Database operations for products: CRUD, name/SKU search, and the
//! low-stock listing. Stock decrements that belong to a checkout or
//! refund are NOT here - they run inside the transactions in
//! [`crate::ops`].

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use turpial_core::{ComboComponent, Product};

/// Shared column list; every product SELECT goes through this.
pub(crate) const SELECT_PRODUCT: &str = "SELECT id, name, category, sku, cost_price_cents, \
     promo_price_cents, stock_level, reserved_stock, damaged_stock, \
     low_stock_threshold, is_combo, combo_items, is_fixed_price, \
     is_giftable, margin_bps, created_at, updated_at FROM products";

/// Raw product row; `combo_items` is the JSON TEXT column.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub sku: String,
    pub cost_price_cents: i64,
    pub promo_price_cents: Option<i64>,
    pub stock_level: i64,
    pub reserved_stock: i64,
    pub damaged_stock: i64,
    pub low_stock_threshold: i64,
    pub is_combo: bool,
    pub combo_items: String,
    pub is_fixed_price: bool,
    pub is_giftable: bool,
    pub margin_bps: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    pub(crate) fn into_product(self) -> DbResult<Product> {
        let combo_items: Vec<ComboComponent> = serde_json::from_str(&self.combo_items)
            .map_err(|e| DbError::corrupt_column("combo_items", e))?;

        Ok(Product {
            id: self.id,
            name: self.name,
            category: self.category,
            sku: self.sku,
            cost_price_cents: self.cost_price_cents,
            promo_price_cents: self.promo_price_cents,
            stock_level: self.stock_level,
            reserved_stock: self.reserved_stock,
            damaged_stock: self.damaged_stock,
            low_stock_threshold: self.low_stock_threshold,
            is_combo: self.is_combo,
            combo_items,
            is_fixed_price: self.is_fixed_price,
            is_giftable: self.is_giftable,
            margin_bps: self.margin_bps,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products ordered by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("{} ORDER BY name LIMIT ?1", SELECT_PRODUCT))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(ProductRow::into_product).collect()
    }

    /// Searches products by name or SKU (case-insensitive substring).
    ///
    /// An empty query falls back to the plain listing.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list(limit).await;
        }

        let pattern = format!("%{}%", query);
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{} WHERE name LIKE ?1 OR sku LIKE ?1 ORDER BY name LIMIT ?2",
            SELECT_PRODUCT
        ))
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Search returned products");
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_PRODUCT))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ProductRow::into_product).transpose()
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("{} WHERE sku = ?1", SELECT_PRODUCT))
                .bind(sku)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ProductRow::into_product).transpose()
    }

    /// Products at or below their low-stock threshold.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{} WHERE stock_level - reserved_stock - damaged_stock <= low_stock_threshold \
             ORDER BY name",
            SELECT_PRODUCT
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProductRow::into_product).collect()
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        let combo_json = serde_json::to_string(&product.combo_items)
            .map_err(|e| DbError::corrupt_column("combo_items", e))?;

        sqlx::query(
            "INSERT INTO products ( \
                id, name, category, sku, cost_price_cents, promo_price_cents, \
                stock_level, reserved_stock, damaged_stock, low_stock_threshold, \
                is_combo, combo_items, is_fixed_price, is_giftable, margin_bps, \
                created_at, updated_at \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.sku)
        .bind(product.cost_price_cents)
        .bind(product.promo_price_cents)
        .bind(product.stock_level)
        .bind(product.reserved_stock)
        .bind(product.damaged_stock)
        .bind(product.low_stock_threshold)
        .bind(product.is_combo)
        .bind(&combo_json)
        .bind(product.is_fixed_price)
        .bind(product.is_giftable)
        .bind(product.margin_bps)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing product.
    ///
    /// Stock fields are included: the product form edits them directly
    /// (manual restock / correction). Transactional stock movements go
    /// through [`crate::ops`].
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let combo_json = serde_json::to_string(&product.combo_items)
            .map_err(|e| DbError::corrupt_column("combo_items", e))?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET \
                name = ?2, category = ?3, sku = ?4, cost_price_cents = ?5, \
                promo_price_cents = ?6, stock_level = ?7, reserved_stock = ?8, \
                damaged_stock = ?9, low_stock_threshold = ?10, is_combo = ?11, \
                combo_items = ?12, is_fixed_price = ?13, is_giftable = ?14, \
                margin_bps = ?15, updated_at = ?16 \
             WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.sku)
        .bind(product.cost_price_cents)
        .bind(product.promo_price_cents)
        .bind(product.stock_level)
        .bind(product.reserved_stock)
        .bind(product.damaged_stock)
        .bind(product.low_stock_threshold)
        .bind(product.is_combo)
        .bind(&combo_json)
        .bind(product.is_fixed_price)
        .bind(product.is_giftable)
        .bind(product.margin_bps)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Deletes a product.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
