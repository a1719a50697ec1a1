//! # Routes
//!
//! The full API surface of the register, one module per page of the app:
//! inventory, repairs, the register itself (checkout), sales history and
//! refunds, the day close, and settings.

use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::state::AppState;

pub mod checkout;
pub mod products;
pub mod reconciliation;
pub mod repairs;
pub mod sales;
pub mod settings;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Inventory
        .route(
            "/api/products",
            get(products::list).post(products::create),
        )
        .route("/api/products/low-stock", get(products::low_stock))
        .route(
            "/api/products/price-suggestion",
            get(products::price_suggestion),
        )
        .route(
            "/api/products/{id}",
            get(products::get_one)
                .put(products::update)
                .delete(products::remove),
        )
        // Repair shop
        .route("/api/repairs", get(repairs::list).post(repairs::create))
        .route(
            "/api/repairs/{id}",
            get(repairs::get_one).delete(repairs::remove),
        )
        .route("/api/repairs/{id}/status", put(repairs::update_status))
        // Register
        .route("/api/checkout", post(checkout::checkout))
        // Sales history
        .route("/api/sales", get(sales::list))
        .route("/api/sales/{id}", get(sales::get_one))
        .route("/api/sales/{id}/refund", post(sales::refund))
        .route("/api/sales/{id}/receipt", get(sales::receipt))
        // Day close
        .route(
            "/api/reconciliations",
            get(reconciliation::list).post(reconciliation::close),
        )
        .route("/api/reconciliations/preview", get(reconciliation::preview))
        .route("/api/reconciliations/{id}", get(reconciliation::get_one))
        // Settings
        .route(
            "/api/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/api/settings/sync-rate", post(settings::sync_rate))
        // Diagnostics
        .route("/api/health", get(health))
        .with_state(state)
}

/// Liveness probe: answers when the database does.
async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    let db_ok = state.db.health_check().await;
    Json(serde_json::json!({ "ok": db_ok }))
}
