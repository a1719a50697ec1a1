//! # Checkout
//!
//! Executes a cart against inventory and records the sale, atomically.
//!
//! ## Steps (one transaction)
//! 1. Non-repair lines decrement stock: combos decrement each component by
//!    `component qty × cart qty`, simple products by cart qty. Decrements
//!    clamp at zero and never reject the sale.
//! 2. Repair lines consume the job's reserved parts: both `reserved_stock`
//!    and `stock_level` drop by the reserved quantity, and the consumed
//!    parts are frozen onto the sale line for a later refund.
//! 3. The sale, its lines, and its settled payments are inserted.
//! 4. The linked repair job is completed: `amount_paid` grows by the
//!    repair line total, status becomes `completed`, `is_paid` reflects
//!    the quote, warranty starts.
//!
//! A missing product, component, or job aborts the transaction; nothing is
//! persisted and the caller keeps the cart for correction. There is no
//! retry: re-invoking re-attempts the same transaction with fresh reads.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::ids::{generate_line_id, generate_payment_id, generate_sale_id};
use crate::repository::product::{ProductRow, SELECT_PRODUCT};
use crate::repository::repair::{RepairJobRow, SELECT_REPAIR};
use turpial_core::{
    cart, settle_payments, AppSettings, CartItem, CoreError, Money, RepairJob, RepairStatus,
    ReservedPart, Sale, SaleLine, SalePayment, SaleStatus, TenderedPayment,
};

/// A cart plus its tendered payments.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    pub payments: Vec<TenderedPayment>,
    /// Flat discount on the cart subtotal, USD cents.
    pub discount_cents: i64,
}

/// Everything the register needs to print the receipt.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
    pub payments: Vec<SalePayment>,
    /// USD cash handed back.
    pub change_given_cents: i64,
    /// Change owed that the USD-cash tender could not cover (known
    /// limitation of the change rule; surfaced, not hidden).
    pub unreturned_change_cents: i64,
}

/// Runs the checkout transaction.
pub async fn checkout(
    pool: &SqlitePool,
    settings: &AppSettings,
    request: CheckoutRequest,
) -> DbResult<CheckoutOutcome> {
    if request.items.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }
    for item in &request.items {
        turpial_core::validation::validate_quantity(item.quantity)
            .map_err(CoreError::from)?;
        turpial_core::validation::validate_price_cents(item.unit_price_cents)
            .map_err(CoreError::from)?;
    }

    let discount = Money::from_cents(request.discount_cents.max(0));
    let subtotal = cart::subtotal(&request.items);
    let total = cart::total(&request.items, discount);

    // Settlement is pure and runs before the transaction: an insufficient
    // payment never opens one.
    let settlement = settle_payments(&request.payments, total, &settings.rates())
        .map_err(DbError::from)?;

    let sale_id = generate_sale_id();
    let now = Utc::now();

    debug!(
        sale_id = %sale_id,
        items = request.items.len(),
        total = %total,
        "Starting checkout transaction"
    );

    let mut tx = pool.begin().await?;

    let mut lines: Vec<SaleLine> = Vec::with_capacity(request.items.len());

    for item in &request.items {
        let mut consumed_parts: Vec<ReservedPart> = Vec::new();

        if item.is_repair {
            let job_id = item
                .repair_job_id
                .as_deref()
                .ok_or_else(|| DbError::not_found("Repair job", "(missing id on repair line)"))?;

            let job = fetch_job(&mut tx, job_id).await?;

            consumed_parts = consume_reserved_parts(&mut tx, &job).await?;
            complete_job(&mut tx, &job, item.line_total()).await?;
        } else if let Some(product_id) = &item.product_id {
            // Gift lines decrement like regular ones; custom lines never
            // reach this branch (no product id).
            let product = fetch_product(&mut tx, product_id).await?;

            if product.is_combo {
                for component in &product.combo_items {
                    let comp = fetch_product(&mut tx, &component.product_id).await?;
                    decrement_stock(&mut tx, &comp.id, comp.stock_level, component.quantity * item.quantity)
                        .await?;
                }
            } else {
                decrement_stock(&mut tx, &product.id, product.stock_level, item.quantity).await?;
            }
        }

        lines.push(SaleLine {
            id: generate_line_id(),
            sale_id: sale_id.clone(),
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            unit_price_cents: item.unit_price_cents,
            quantity: item.quantity,
            is_repair: item.is_repair,
            is_promo: item.is_promo,
            is_gift: item.is_gift,
            is_custom: item.is_custom,
            repair_job_id: item.repair_job_id.clone(),
            consumed_parts,
            created_at: now,
        });
    }

    let sale = Sale {
        id: sale_id.clone(),
        status: SaleStatus::Completed,
        subtotal_cents: subtotal.cents(),
        discount_cents: discount.cents(),
        total_cents: total.cents(),
        change_given_cents: settlement.change_given_cents,
        reconciliation_id: None,
        refund_reason: None,
        refunded_at: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO sales ( \
            id, status, subtotal_cents, discount_cents, total_cents, \
            change_given_cents, created_at, updated_at \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(&sale.id)
    .bind(sale.status)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(sale.change_given_cents)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *tx)
    .await?;

    for line in &lines {
        let parts_json = serde_json::to_string(&line.consumed_parts)
            .map_err(|e| DbError::corrupt_column("consumed_parts", e))?;

        sqlx::query(
            "INSERT INTO sale_lines ( \
                id, sale_id, product_id, name, unit_price_cents, quantity, \
                is_repair, is_promo, is_gift, is_custom, repair_job_id, \
                consumed_parts, created_at \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_id)
        .bind(&line.name)
        .bind(line.unit_price_cents)
        .bind(line.quantity)
        .bind(line.is_repair)
        .bind(line.is_promo)
        .bind(line.is_gift)
        .bind(line.is_custom)
        .bind(&line.repair_job_id)
        .bind(&parts_json)
        .bind(line.created_at)
        .execute(&mut *tx)
        .await?;
    }

    let mut payments: Vec<SalePayment> = Vec::with_capacity(settlement.payments.len());
    for tendered in &settlement.payments {
        let payment = SalePayment {
            id: generate_payment_id(),
            sale_id: sale_id.clone(),
            method: tendered.method,
            amount_cents: tendered.amount_cents,
            reference: tendered.reference.clone(),
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO sale_payments (id, sale_id, method, amount_cents, reference, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(&payment.reference)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        payments.push(payment);
    }

    tx.commit().await?;

    info!(
        sale_id = %sale_id,
        total = %total,
        change = settlement.change_given_cents,
        "Checkout committed"
    );

    Ok(CheckoutOutcome {
        sale,
        lines,
        payments,
        change_given_cents: settlement.change_given_cents,
        unreturned_change_cents: settlement.unreturned_change_cents,
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

async fn fetch_job(tx: &mut Transaction<'_, Sqlite>, id: &str) -> DbResult<RepairJob> {
    let row: Option<RepairJobRow> = sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_REPAIR))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    row.ok_or_else(|| DbError::not_found("Repair job", id))?
        .into_job()
}

/// Read-modify-write stock decrement, clamped at zero.
async fn decrement_stock(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: &str,
    current_stock: i64,
    quantity: i64,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET stock_level = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind((current_stock - quantity).max(0))
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Moves a job's reserved parts to consumed: both `reserved_stock` and
/// `stock_level` drop by the reserved quantity, clamped at zero. Returns
/// the consumed snapshot for the sale line.
async fn consume_reserved_parts(
    tx: &mut Transaction<'_, Sqlite>,
    job: &RepairJob,
) -> DbResult<Vec<ReservedPart>> {
    for part in &job.reserved_parts {
        let product = fetch_product(tx, &part.product_id).await?;

        sqlx::query(
            "UPDATE products SET stock_level = ?2, reserved_stock = ?3, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(&product.id)
        .bind((product.stock_level - part.quantity).max(0))
        .bind((product.reserved_stock - part.quantity).max(0))
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
    }

    Ok(job.reserved_parts.clone())
}

/// Settles the repair job at checkout: payment accumulated, status
/// completed, warranty window opened.
async fn complete_job(
    tx: &mut Transaction<'_, Sqlite>,
    job: &RepairJob,
    paid: Money,
) -> DbResult<()> {
    let now = Utc::now();
    let amount_paid = job.amount_paid_cents + paid.cents();
    let is_paid = amount_paid >= job.estimated_cost_cents;

    sqlx::query(
        "UPDATE repair_jobs SET status = ?2, amount_paid_cents = ?3, is_paid = ?4, \
         completed_at = ?5, warranty_end_date = ?6 WHERE id = ?1",
    )
    .bind(&job.id)
    .bind(RepairStatus::Completed)
    .bind(amount_paid)
    .bind(is_paid)
    .bind(now)
    .bind(RepairJob::warranty_end(now))
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
    use crate::testutil::{seed_combo, seed_product, seed_settings, test_db, usd};
    use turpial_core::PaymentMethod;

    #[tokio::test]
    async fn test_checkout_decrements_simple_stock() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let product = seed_product(&db, "FOR-1", 10, 1000).await;

        let outcome = checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![CartItem::from_product(&product, 3, &settings)],
                payments: vec![usd(100_000)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap();

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 7);
        assert_eq!(outcome.sale.status, SaleStatus::Completed);
        assert_eq!(outcome.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_combo_decrements_components() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let comp_a = seed_product(&db, "COMP-A", 20, 300).await;
        let comp_b = seed_product(&db, "COMP-B", 20, 400).await;
        let combo = seed_combo(&db, "COMBO-1", &[(&comp_a, 2), (&comp_b, 1)]).await;

        // Two combos sold: A drops by 4, B drops by 2
        checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![CartItem::from_product(&combo, 2, &settings)],
                payments: vec![usd(100_000)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap();

        let a = db.products().get_by_id(&comp_a.id).await.unwrap().unwrap();
        let b = db.products().get_by_id(&comp_b.id).await.unwrap().unwrap();
        assert_eq!(a.stock_level, 16);
        assert_eq!(b.stock_level, 18);
    }

    #[tokio::test]
    async fn test_checkout_clamps_stock_at_zero() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let product = seed_product(&db, "LOW-1", 2, 500).await;

        // Overselling does not fail; stock clamps at zero
        checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![CartItem::from_product(&product, 5, &settings)],
                payments: vec![usd(100_000)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap();

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 0);
    }

    #[tokio::test]
    async fn test_checkout_missing_product_aborts_everything() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let good = seed_product(&db, "OK-1", 10, 1000).await;

        let mut ghost = CartItem::from_product(&good, 1, &settings);
        ghost.product_id = Some("no-such-product".to_string());

        let err = checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![CartItem::from_product(&good, 2, &settings), ghost],
                payments: vec![usd(100_000)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));

        // Nothing persisted: stock untouched, no sale recorded
        let after = db.products().get_by_id(&good.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 10);
        assert!(db.sales().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_custom_line_skips_inventory() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;

        let outcome = checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![CartItem::custom("Instalación", 500, 1)],
                payments: vec![usd(500)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.sale.total_cents, 500);
        assert!(outcome.lines[0].is_custom);
    }

    #[tokio::test]
    async fn test_checkout_repair_consumes_reserved_parts() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let screen = seed_product(&db, "SCR-A52", 5, 2000).await;

        let job = db
            .repair_jobs()
            .create(crate::repository::NewRepairJob {
                customer_name: "Ana".to_string(),
                customer_phone: "0414-5550000".to_string(),
                device_brand: "Samsung".to_string(),
                device_model: "A52".to_string(),
                reported_issue: "Pantalla rota".to_string(),
                estimated_cost_cents: 4500,
                parts: vec![crate::repository::PartRequest {
                    product_id: screen.id.clone(),
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        // Reservation holds one unit
        let reserved = db.products().get_by_id(&screen.id).await.unwrap().unwrap();
        assert_eq!(reserved.reserved_stock, 1);
        assert_eq!(reserved.stock_level, 5);

        let outcome = checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![CartItem::repair(&job)],
                payments: vec![usd(4500)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap();

        // Part moved from reserved to consumed
        let after = db.products().get_by_id(&screen.id).await.unwrap().unwrap();
        assert_eq!(after.reserved_stock, 0);
        assert_eq!(after.stock_level, 4);

        // Consumed snapshot frozen on the line
        assert_eq!(outcome.lines[0].consumed_parts.len(), 1);
        assert_eq!(outcome.lines[0].consumed_parts[0].product_id, screen.id);

        // Job settled
        let settled = db.repair_jobs().get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(settled.status, RepairStatus::Completed);
        assert!(settled.is_paid);
        assert_eq!(settled.amount_paid_cents, 4500);
        assert!(settled.completed_at.is_some());
        assert!(settled.warranty_end_date.is_some());
    }

    #[tokio::test]
    async fn test_checkout_partial_repair_payment_not_marked_paid() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;

        let job = db
            .repair_jobs()
            .create(crate::repository::NewRepairJob {
                customer_name: "Luis".to_string(),
                customer_phone: "".to_string(),
                device_brand: "Xiaomi".to_string(),
                device_model: "Note 11".to_string(),
                reported_issue: "No carga".to_string(),
                estimated_cost_cents: 6000,
                parts: vec![],
            })
            .await
            .unwrap();

        // The register can discount a repair below the quote; the job
        // keeps is_paid=false because amount_paid < estimated
        let mut item = CartItem::repair(&job);
        item.unit_price_cents = 4000;

        checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![item],
                payments: vec![usd(4000)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap();

        let settled = db.repair_jobs().get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(settled.amount_paid_cents, 4000);
        assert!(!settled.is_paid);
        assert_eq!(settled.status, RepairStatus::Completed);
    }

    #[tokio::test]
    async fn test_checkout_change_recorded_on_sale() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let product = seed_product(&db, "FIX-1", 10, 1450).await;

        // Fixed price $14.50, $20 tendered: $5.50 change
        let outcome = checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![CartItem::from_product(&product, 1, &settings)],
                payments: vec![usd(2000)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.change_given_cents, 550);
        assert_eq!(outcome.sale.change_given_cents, 550);
        let recorded = db.sales().get_payments(&outcome.sale.id).await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].method, PaymentMethod::CashUsd);
        assert_eq!(recorded[0].amount_cents, 1450);
    }

    #[tokio::test]
    async fn test_checkout_insufficient_payment_never_opens_transaction() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let product = seed_product(&db, "EXP-1", 10, 10_000).await;

        let err = checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![CartItem::from_product(&product, 1, &settings)],
                payments: vec![usd(100)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientPayment { .. })
        ));
        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 10);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_rejected() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;

        let err = checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![],
                payments: vec![usd(100)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_checkout_stock_conservation() {
        // Total decrement across products equals total quantities sold
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let p1 = seed_product(&db, "CON-1", 10, 500).await;
        let p2 = seed_product(&db, "CON-2", 10, 700).await;

        let before: i64 = 20;

        checkout(
            db.pool(),
            &settings,
            CheckoutRequest {
                items: vec![
                    CartItem::from_product(&p1, 3, &settings),
                    CartItem::from_product(&p2, 2, &settings),
                ],
                payments: vec![usd(100_000)],
                discount_cents: 0,
            },
        )
        .await
        .unwrap();

        let a1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        let a2 = db.products().get_by_id(&p2.id).await.unwrap().unwrap();
        assert_eq!(before - (a1.stock_level + a2.stock_level), 5);
    }
}
