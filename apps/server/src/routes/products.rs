//! # Product Handlers
//!
//! Inventory CRUD, search, the low-stock list, and the price suggestion
//! the product form shows while the user types a cost. Prices on the way
//! out are resolved against the current settings snapshot - display-time
//! resolution, never stored.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;
use turpial_core::validation::{validate_price_cents, validate_product_name, validate_sku};
use turpial_core::{dynamic_price, AppSettings, MarginBps, Money, Product};
use turpial_db::ids::generate_product_id;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboComponentDto {
    pub product_id: String,
    pub quantity: i64,
}

impl From<turpial_core::ComboComponent> for ComboComponentDto {
    fn from(c: turpial_core::ComboComponent) -> Self {
        ComboComponentDto {
            product_id: c.product_id,
            quantity: c.quantity,
        }
    }
}

impl From<ComboComponentDto> for turpial_core::ComboComponent {
    fn from(c: ComboComponentDto) -> Self {
        turpial_core::ComboComponent {
            product_id: c.product_id,
            quantity: c.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub name: String,
    pub category: String,
    pub sku: String,
    pub cost_price_cents: i64,
    pub promo_price_cents: Option<i64>,
    /// Resolved retail price at current settings.
    pub price_cents: i64,
    pub is_promo: bool,
    pub stock_level: i64,
    pub reserved_stock: i64,
    pub damaged_stock: i64,
    pub available_stock: i64,
    pub low_stock_threshold: i64,
    pub is_combo: bool,
    pub combo_items: Vec<ComboComponentDto>,
    pub is_fixed_price: bool,
    pub is_giftable: bool,
    pub margin_bps: Option<u32>,
}

impl ProductDto {
    fn from_product(product: Product, settings: &AppSettings) -> Self {
        let resolved = product.retail_price(settings);
        ProductDto {
            price_cents: resolved.price.cents(),
            is_promo: resolved.is_promo,
            available_stock: product.available_stock(),
            id: product.id,
            name: product.name,
            category: product.category,
            sku: product.sku,
            cost_price_cents: product.cost_price_cents,
            promo_price_cents: product.promo_price_cents,
            stock_level: product.stock_level,
            reserved_stock: product.reserved_stock,
            damaged_stock: product.damaged_stock,
            low_stock_threshold: product.low_stock_threshold,
            is_combo: product.is_combo,
            combo_items: product.combo_items.into_iter().map(Into::into).collect(),
            is_fixed_price: product.is_fixed_price,
            is_giftable: product.is_giftable,
            margin_bps: product.margin_bps,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductForm {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub sku: String,
    pub cost_price_cents: i64,
    pub promo_price_cents: Option<i64>,
    #[serde(default)]
    pub stock_level: i64,
    #[serde(default)]
    pub reserved_stock: i64,
    #[serde(default)]
    pub damaged_stock: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub is_combo: bool,
    #[serde(default)]
    pub combo_items: Vec<ComboComponentDto>,
    #[serde(default)]
    pub is_fixed_price: bool,
    #[serde(default)]
    pub is_giftable: bool,
    pub margin_bps: Option<u32>,
}

impl ProductForm {
    fn validate(&self) -> Result<(), ApiError> {
        validate_product_name(&self.name)?;
        validate_sku(&self.sku)?;
        validate_price_cents(self.cost_price_cents)?;
        if let Some(promo) = self.promo_price_cents {
            validate_price_cents(promo)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestionParams {
    pub cost_cents: i64,
    pub margin_bps: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestionResponse {
    pub price_cents: i64,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ProductDto>>, ApiError> {
    let settings = state.db.settings().get().await?;

    let products = match params.search.as_deref() {
        Some(q) => state.db.products().search(q, params.limit).await?,
        None => state.db.products().list(params.limit).await?,
    };

    Ok(Json(
        products
            .into_iter()
            .map(|p| ProductDto::from_product(p, &settings))
            .collect(),
    ))
}

pub async fn low_stock(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductDto>>, ApiError> {
    let settings = state.db.settings().get().await?;
    let products = state.db.products().low_stock().await?;

    Ok(Json(
        products
            .into_iter()
            .map(|p| ProductDto::from_product(p, &settings))
            .collect(),
    ))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDto>, ApiError> {
    let settings = state.db.settings().get().await?;
    let product = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;

    Ok(Json(ProductDto::from_product(product, &settings)))
}

pub async fn create(
    State(state): State<AppState>,
    Json(form): Json<ProductForm>,
) -> Result<Json<ProductDto>, ApiError> {
    debug!(sku = %form.sku, "create_product");
    form.validate()?;

    let now = Utc::now();
    let product = Product {
        id: generate_product_id(),
        name: form.name.trim().to_string(),
        category: form.category.trim().to_string(),
        sku: form.sku.trim().to_string(),
        cost_price_cents: form.cost_price_cents,
        promo_price_cents: form.promo_price_cents,
        stock_level: form.stock_level,
        reserved_stock: form.reserved_stock,
        damaged_stock: form.damaged_stock,
        low_stock_threshold: form.low_stock_threshold,
        is_combo: form.is_combo,
        combo_items: form.combo_items.into_iter().map(Into::into).collect(),
        is_fixed_price: form.is_fixed_price,
        is_giftable: form.is_giftable,
        margin_bps: form.margin_bps,
        created_at: now,
        updated_at: now,
    };

    state.db.products().insert(&product).await?;
    info!(id = %product.id, sku = %product.sku, "Product created");

    let settings = state.db.settings().get().await?;
    Ok(Json(ProductDto::from_product(product, &settings)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<ProductForm>,
) -> Result<Json<ProductDto>, ApiError> {
    debug!(id = %id, "update_product");
    form.validate()?;

    let existing = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;

    let product = Product {
        id: existing.id,
        name: form.name.trim().to_string(),
        category: form.category.trim().to_string(),
        sku: form.sku.trim().to_string(),
        cost_price_cents: form.cost_price_cents,
        promo_price_cents: form.promo_price_cents,
        stock_level: form.stock_level,
        reserved_stock: form.reserved_stock,
        damaged_stock: form.damaged_stock,
        low_stock_threshold: form.low_stock_threshold,
        is_combo: form.is_combo,
        combo_items: form.combo_items.into_iter().map(Into::into).collect(),
        is_fixed_price: form.is_fixed_price,
        is_giftable: form.is_giftable,
        margin_bps: form.margin_bps,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };

    state.db.products().update(&product).await?;
    info!(id = %product.id, "Product updated");

    let settings = state.db.settings().get().await?;
    Ok(Json(ProductDto::from_product(product, &settings)))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.db.products().delete(&id).await?;
    info!(id = %id, "Product deleted");
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Suggested retail price for the product form, straight from the
/// pricing engine.
pub async fn price_suggestion(
    State(state): State<AppState>,
    Query(params): Query<PriceSuggestionParams>,
) -> Result<Json<PriceSuggestionResponse>, ApiError> {
    let settings = state.db.settings().get().await?;

    let margin = params
        .margin_bps
        .map(MarginBps::from_bps)
        .unwrap_or_else(|| settings.margin());

    let price = dynamic_price(
        Money::from_cents(params.cost_cents),
        &settings.rates(),
        margin,
    );

    Ok(Json(PriceSuggestionResponse {
        price_cents: price.cents(),
    }))
}
