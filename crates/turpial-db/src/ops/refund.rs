//! # Refund
//!
//! Reverses a completed sale, atomically.
//!
//! ## Preconditions (checked inside the transaction, on fresh reads)
//! - The sale exists and is `completed`.
//! - The sale has no `reconciliation_id`: a sale closed in a daily cash
//!   count is immutable.
//!
//! ## Reversal rules per line
//! - Custom lines are skipped (never tracked in inventory).
//! - Repair lines reverse using the sale's frozen `consumed_parts`
//!   snapshot, not the live job state - the job may have changed since.
//!   The linked job resets to pending/unpaid.
//! - Combo lines reverse each live component by `component qty × sale
//!   qty`.
//! - Simple lines reverse by the sale quantity.
//!
//! Reversal always adds the quantity back to `stock_level`; with the
//! `damage` disposition the same quantity also lands in `damaged_stock`,
//! so the units are on the books but not sellable.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::product::{ProductRow, SELECT_PRODUCT};
use crate::repository::sale::{SaleLineRow, SaleRow, SELECT_LINE, SELECT_SALE};
use turpial_core::{
    validation::validate_refund_reason, CoreError, RepairStatus, Sale, SaleStatus,
    StockDisposition,
};

/// Operator input for a refund.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub sale_id: String,
    pub reason: String,
    pub disposition: StockDisposition,
}

/// Runs the refund transaction and returns the refunded sale.
pub async fn refund(pool: &SqlitePool, request: RefundRequest) -> DbResult<Sale> {
    validate_refund_reason(&request.reason).map_err(CoreError::from)?;

    debug!(sale_id = %request.sale_id, disposition = ?request.disposition, "Starting refund transaction");

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let sale_row: Option<SaleRow> = sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_SALE))
        .bind(&request.sale_id)
        .fetch_optional(&mut *tx)
        .await?;

    let sale = sale_row
        .ok_or_else(|| DbError::not_found("Sale", &request.sale_id))?
        .into_sale();

    if let Some(reconciliation_id) = &sale.reconciliation_id {
        return Err(CoreError::SaleAlreadyReconciled {
            sale_id: sale.id.clone(),
            reconciliation_id: reconciliation_id.clone(),
        }
        .into());
    }
    if sale.status == SaleStatus::Refunded {
        return Err(CoreError::SaleAlreadyRefunded {
            sale_id: sale.id.clone(),
        }
        .into());
    }

    let line_rows: Vec<SaleLineRow> =
        sqlx::query_as(&format!("{} WHERE sale_id = ?1", SELECT_LINE))
            .bind(&sale.id)
            .fetch_all(&mut *tx)
            .await?;

    for row in line_rows {
        let line = row.into_line()?;

        if line.is_custom {
            continue;
        }

        if line.is_repair {
            for part in &line.consumed_parts {
                restock(&mut tx, &part.product_id, part.quantity, request.disposition).await?;
            }

            if let Some(job_id) = &line.repair_job_id {
                reset_job(&mut tx, job_id).await?;
            }
            continue;
        }

        let product_id = match &line.product_id {
            Some(id) => id,
            // A non-custom line without a product id has nothing to reverse
            None => continue,
        };

        let product = fetch_product(&mut tx, product_id).await?;

        if product.is_combo {
            for component in &product.combo_items {
                restock(
                    &mut tx,
                    &component.product_id,
                    component.quantity * line.quantity,
                    request.disposition,
                )
                .await?;
            }
        } else {
            restock(&mut tx, &product.id, line.quantity, request.disposition).await?;
        }
    }

    sqlx::query(
        "UPDATE sales SET status = ?2, refund_reason = ?3, refunded_at = ?4, updated_at = ?4 \
         WHERE id = ?1",
    )
    .bind(&sale.id)
    .bind(SaleStatus::Refunded)
    .bind(&request.reason)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(sale_id = %sale.id, "Refund committed");

    Ok(Sale {
        status: SaleStatus::Refunded,
        refund_reason: Some(request.reason),
        refunded_at: Some(now),
        updated_at: now,
        ..sale
    })
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn fetch_product(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
) -> DbResult<turpial_core::Product> {
    let row: Option<ProductRow> = sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_PRODUCT))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    row.ok_or_else(|| DbError::not_found("Product", id))?
        .into_product()
}

/// Adds `quantity` back to `stock_level`; with the damage disposition the
/// same quantity also goes to `damaged_stock`.
async fn restock(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: &str,
    quantity: i64,
    disposition: StockDisposition,
) -> DbResult<()> {
    let product = fetch_product(tx, product_id).await?;

    let damaged = match disposition {
        StockDisposition::Return => product.damaged_stock,
        StockDisposition::Damage => product.damaged_stock + quantity,
    };

    sqlx::query(
        "UPDATE products SET stock_level = ?2, damaged_stock = ?3, updated_at = ?4 WHERE id = ?1",
    )
    .bind(product_id)
    .bind(product.stock_level + quantity)
    .bind(damaged)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Resets the linked repair job: back to pending, unpaid, warranty void.
async fn reset_job(tx: &mut Transaction<'_, Sqlite>, job_id: &str) -> DbResult<()> {
    sqlx::query(
        "UPDATE repair_jobs SET status = ?2, is_paid = 0, amount_paid_cents = 0, \
         completed_at = NULL, warranty_end_date = NULL WHERE id = ?1",
    )
    .bind(job_id)
    .bind(RepairStatus::Pending)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::checkout::{checkout, CheckoutRequest};
    use crate::testutil::{seed_combo, seed_product, seed_settings, test_db, usd};
    use turpial_core::CartItem;

    async fn checkout_one(
        db: &crate::Database,
        settings: &turpial_core::AppSettings,
        items: Vec<CartItem>,
    ) -> crate::ops::CheckoutOutcome {
        checkout(
            db.pool(),
            settings,
            CheckoutRequest {
                items,
                payments: vec![usd(1_000_000)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_refund_returns_stock() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let product = seed_product(&db, "RET-1", 10, 1000).await;

        let outcome = checkout_one(
            &db,
            &settings,
            vec![CartItem::from_product(&product, 4, &settings)],
        )
        .await;

        let refunded = refund(
            db.pool(),
            RefundRequest {
                sale_id: outcome.sale.id.clone(),
                reason: "Cliente devolvió".to_string(),
                disposition: StockDisposition::Return,
            },
        )
        .await
        .unwrap();

        assert_eq!(refunded.status, SaleStatus::Refunded);
        assert!(refunded.refunded_at.is_some());

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        // Exactly the original decrement restored, nothing flagged damaged
        assert_eq!(after.stock_level, 10);
        assert_eq!(after.damaged_stock, 0);
    }

    #[tokio::test]
    async fn test_refund_damage_disposition() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let product = seed_product(&db, "DAM-1", 10, 1000).await;

        let outcome = checkout_one(
            &db,
            &settings,
            vec![CartItem::from_product(&product, 2, &settings)],
        )
        .await;

        refund(
            db.pool(),
            RefundRequest {
                sale_id: outcome.sale.id,
                reason: "Llegó dañado".to_string(),
                disposition: StockDisposition::Damage,
            },
        )
        .await
        .unwrap();

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 10);
        assert_eq!(after.damaged_stock, 2);
        // Damaged units are on the books but not sellable
        assert_eq!(after.available_stock(), 8);
    }

    #[tokio::test]
    async fn test_refund_combo_reverses_components() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let comp_a = seed_product(&db, "RCA", 20, 300).await;
        let comp_b = seed_product(&db, "RCB", 20, 400).await;
        let combo = seed_combo(&db, "RCOMBO", &[(&comp_a, 2), (&comp_b, 1)]).await;

        let outcome = checkout_one(
            &db,
            &settings,
            vec![CartItem::from_product(&combo, 2, &settings)],
        )
        .await;

        refund(
            db.pool(),
            RefundRequest {
                sale_id: outcome.sale.id,
                reason: "Equivocado".to_string(),
                disposition: StockDisposition::Return,
            },
        )
        .await
        .unwrap();

        let a = db.products().get_by_id(&comp_a.id).await.unwrap().unwrap();
        let b = db.products().get_by_id(&comp_b.id).await.unwrap().unwrap();
        assert_eq!(a.stock_level, 20);
        assert_eq!(b.stock_level, 20);
    }

    #[tokio::test]
    async fn test_refund_repair_uses_consumed_snapshot_and_resets_job() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let screen = seed_product(&db, "RSCR", 5, 2000).await;

        let job = db
            .repair_jobs()
            .create(crate::repository::NewRepairJob {
                customer_name: "Ana".to_string(),
                customer_phone: "".to_string(),
                device_brand: "Samsung".to_string(),
                device_model: "A52".to_string(),
                reported_issue: "Pantalla".to_string(),
                estimated_cost_cents: 4500,
                parts: vec![crate::repository::PartRequest {
                    product_id: screen.id.clone(),
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        let outcome = checkout_one(&db, &settings, vec![CartItem::repair(&job)]).await;

        refund(
            db.pool(),
            RefundRequest {
                sale_id: outcome.sale.id,
                reason: "Reparación fallida".to_string(),
                disposition: StockDisposition::Return,
            },
        )
        .await
        .unwrap();

        // The consumed part went back on the shelf (not into reserved)
        let after = db.products().get_by_id(&screen.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 5);
        assert_eq!(after.reserved_stock, 0);

        // The job is pending and unpaid again
        let job_after = db.repair_jobs().get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(job_after.status, RepairStatus::Pending);
        assert!(!job_after.is_paid);
        assert_eq!(job_after.amount_paid_cents, 0);
        assert!(job_after.completed_at.is_none());
        assert!(job_after.warranty_end_date.is_none());
    }

    #[tokio::test]
    async fn test_refund_custom_lines_skipped() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;

        let outcome =
            checkout_one(&db, &settings, vec![CartItem::custom("Servicio", 700, 1)]).await;

        // Refunding a custom-only sale touches no inventory and succeeds
        let refunded = refund(
            db.pool(),
            RefundRequest {
                sale_id: outcome.sale.id,
                reason: "Cobro errado".to_string(),
                disposition: StockDisposition::Return,
            },
        )
        .await
        .unwrap();
        assert_eq!(refunded.status, SaleStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_rejects_empty_reason() {
        let db = test_db().await;

        let err = refund(
            db.pool(),
            RefundRequest {
                sale_id: "S-000000-0000".to_string(),
                reason: "   ".to_string(),
                disposition: StockDisposition::Return,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_refund_rejects_double_refund() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let product = seed_product(&db, "DBL-1", 10, 1000).await;

        let outcome = checkout_one(
            &db,
            &settings,
            vec![CartItem::from_product(&product, 1, &settings)],
        )
        .await;

        let request = RefundRequest {
            sale_id: outcome.sale.id,
            reason: "Primera vez".to_string(),
            disposition: StockDisposition::Return,
        };
        refund(db.pool(), request.clone()).await.unwrap();

        let err = refund(db.pool(), request).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::SaleAlreadyRefunded { .. })
        ));

        // Stock restored exactly once
        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 10);
    }

    #[tokio::test]
    async fn test_refund_rejects_missing_sale() {
        let db = test_db().await;

        let err = refund(
            db.pool(),
            RefundRequest {
                sale_id: "S-999999-9999".to_string(),
                reason: "No existe".to_string(),
                disposition: StockDisposition::Return,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
