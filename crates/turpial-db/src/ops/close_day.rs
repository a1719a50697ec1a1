//! # Close Day (Daily Reconciliation)
//!
//! The end-of-day cash count. Expected totals come from the day's open
//! sales (`completed`, not yet reconciled), grouped by payment method in
//! each method's own currency. The operator enters the counted amounts;
//! per-method differences stay in the method's currency and the grand
//! total difference is expressed in USD at the official rate.
//!
//! One transaction inserts the `RECON-yyyy-MM-dd` document, its
//! per-method lines, and stamps every included sale with the
//! reconciliation id - after which those sales are immutable.
//!
//! The id doubles as the uniqueness guard: it is the primary key, so a
//! second close of the same calendar day fails the insert and rolls back.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::ids::generate_reconciliation_id;
use crate::repository::sale::day_bounds;
use turpial_core::{
    convert, validation::validate_counted_amounts, AppSettings, CoreError, Currency,
    DailyReconciliation, Money, PaymentMethod, ReconciliationLine,
};

/// Operator-entered counted amount for one payment method, in the
/// method's own currency.
#[derive(Debug, Clone)]
pub struct CountedAmount {
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

/// Input for a day close.
#[derive(Debug, Clone)]
pub struct CloseDayRequest {
    pub date: NaiveDate,
    pub counted: Vec<CountedAmount>,
}

/// Result of a committed day close.
#[derive(Debug, Clone)]
pub struct CloseDayOutcome {
    pub reconciliation: DailyReconciliation,
    pub lines: Vec<ReconciliationLine>,
}

/// Expected per-method total for the close-day form.
#[derive(Debug, Clone)]
pub struct DayPreview {
    pub date: NaiveDate,
    pub open_sales: i64,
    /// (method, expected cents in the method's currency), register order.
    pub expected: Vec<(PaymentMethod, i64)>,
}

/// Computes the expected totals of a day without closing it.
pub async fn expected_totals(pool: &SqlitePool, date: NaiveDate) -> DbResult<DayPreview> {
    let (start, end) = day_bounds(date);

    let grouped: Vec<(PaymentMethod, i64)> = sqlx::query_as(
        "SELECT p.method, COALESCE(SUM(p.amount_cents), 0) \
         FROM sale_payments p JOIN sales s ON s.id = p.sale_id \
         WHERE s.created_at >= ?1 AND s.created_at < ?2 \
           AND s.status = 'completed' AND s.reconciliation_id IS NULL \
         GROUP BY p.method",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let open_sales: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sales \
         WHERE created_at >= ?1 AND created_at < ?2 \
           AND status = 'completed' AND reconciliation_id IS NULL",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    let expected = PaymentMethod::ALL
        .iter()
        .map(|m| {
            let cents = grouped
                .iter()
                .find(|(method, _)| method == m)
                .map(|(_, cents)| *cents)
                .unwrap_or(0);
            (*m, cents)
        })
        .collect();

    Ok(DayPreview {
        date,
        open_sales,
        expected,
    })
}

/// Runs the close-day transaction.
pub async fn close_day(
    pool: &SqlitePool,
    settings: &AppSettings,
    request: CloseDayRequest,
) -> DbResult<CloseDayOutcome> {
    let labelled: Vec<(String, i64)> = request
        .counted
        .iter()
        .map(|c| (format!("{:?}", c.method), c.amount_cents))
        .collect();
    validate_counted_amounts(labelled.iter().map(|(m, cents)| (m.as_str(), *cents)))
        .map_err(CoreError::from)?;

    let reconciliation_id = generate_reconciliation_id(request.date);
    let (start, end) = day_bounds(request.date);
    let now = Utc::now();
    let rates = settings.rates();

    debug!(id = %reconciliation_id, "Starting close-day transaction");

    let mut tx = pool.begin().await?;

    let grouped: Vec<(PaymentMethod, i64)> = sqlx::query_as(
        "SELECT p.method, COALESCE(SUM(p.amount_cents), 0) \
         FROM sale_payments p JOIN sales s ON s.id = p.sale_id \
         WHERE s.created_at >= ?1 AND s.created_at < ?2 \
           AND s.status = 'completed' AND s.reconciliation_id IS NULL \
         GROUP BY p.method",
    )
    .bind(start)
    .bind(end)
    .fetch_all(&mut *tx)
    .await?;

    let mut lines: Vec<ReconciliationLine> = Vec::with_capacity(PaymentMethod::ALL.len());
    let mut total_expected_usd = Money::zero();
    let mut total_counted_usd = Money::zero();

    for method in PaymentMethod::ALL {
        let expected_cents = grouped
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, cents)| *cents)
            .unwrap_or(0);
        let counted_cents = request
            .counted
            .iter()
            .find(|c| c.method == method)
            .map(|c| c.amount_cents)
            .unwrap_or(0);

        total_expected_usd += convert(
            Money::from_cents(expected_cents),
            method.currency(),
            Currency::Usd,
            &rates,
        );
        total_counted_usd += convert(
            Money::from_cents(counted_cents),
            method.currency(),
            Currency::Usd,
            &rates,
        );

        lines.push(ReconciliationLine {
            reconciliation_id: reconciliation_id.clone(),
            method,
            expected_cents,
            counted_cents,
            difference_cents: counted_cents - expected_cents,
        });
    }

    let total_difference = total_counted_usd - total_expected_usd;

    let reconciliation = DailyReconciliation {
        id: reconciliation_id.clone(),
        date: request.date,
        total_expected_cents: total_expected_usd.cents(),
        total_counted_cents: total_counted_usd.cents(),
        total_difference_cents: total_difference.cents(),
        sales_closed: 0, // stamped below
        created_at: now,
    };

    // The PK enforces one close per calendar day: a duplicate insert
    // surfaces as a unique violation and rolls everything back.
    sqlx::query(
        "INSERT INTO daily_reconciliations ( \
            id, date, total_expected_cents, total_counted_cents, \
            total_difference_cents, sales_closed, created_at \
         ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
    )
    .bind(&reconciliation.id)
    .bind(reconciliation.date)
    .bind(reconciliation.total_expected_cents)
    .bind(reconciliation.total_counted_cents)
    .bind(reconciliation.total_difference_cents)
    .bind(reconciliation.created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate("reconciliation", &reconciliation_id),
        other => other,
    })?;

    for line in &lines {
        sqlx::query(
            "INSERT INTO reconciliation_lines ( \
                reconciliation_id, method, expected_cents, counted_cents, difference_cents \
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&line.reconciliation_id)
        .bind(line.method)
        .bind(line.expected_cents)
        .bind(line.counted_cents)
        .bind(line.difference_cents)
        .execute(&mut *tx)
        .await?;
    }

    let stamped = sqlx::query(
        "UPDATE sales SET reconciliation_id = ?1, updated_at = ?2 \
         WHERE created_at >= ?3 AND created_at < ?4 \
           AND status = 'completed' AND reconciliation_id IS NULL",
    )
    .bind(&reconciliation_id)
    .bind(now)
    .bind(start)
    .bind(end)
    .execute(&mut *tx)
    .await?
    .rows_affected() as i64;

    sqlx::query("UPDATE daily_reconciliations SET sales_closed = ?2 WHERE id = ?1")
        .bind(&reconciliation_id)
        .bind(stamped)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        id = %reconciliation_id,
        sales_closed = stamped,
        difference = %total_difference,
        "Day closed"
    );

    Ok(CloseDayOutcome {
        reconciliation: DailyReconciliation {
            sales_closed: stamped,
            ..reconciliation
        },
        lines,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::checkout::{checkout, CheckoutRequest};
    use crate::ops::refund::{refund, RefundRequest};
    use crate::testutil::{seed_settings, test_db, usd};
    use turpial_core::{CartItem, StockDisposition, TenderedPayment};

    fn bs(method: PaymentMethod, amount_cents: i64) -> TenderedPayment {
        TenderedPayment {
            method,
            amount_cents,
            reference: None,
        }
    }

    fn counted(method: PaymentMethod, amount_cents: i64) -> CountedAmount {
        CountedAmount {
            method,
            amount_cents,
        }
    }

    async fn sell_custom(
        db: &crate::Database,
        settings: &turpial_core::AppSettings,
        price_cents: i64,
        payments: Vec<TenderedPayment>,
    ) -> crate::ops::CheckoutOutcome {
        checkout(
            db.pool(),
            settings,
            CheckoutRequest {
                items: vec![CartItem::custom("Servicio", price_cents, 1)],
                payments,
                discount_cents: 0,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_close_day_worked_example() {
        // Expected: USD cash $100.00, Bs cash 500.00 Bs (bcv 40).
        // Counted:  USD cash $98.00,  Bs cash 510.00 Bs.
        // Differences: -2.00 USD, +10 Bs (= +$0.25), grand total -$1.75.
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let today = Utc::now().date_naive();

        sell_custom(&db, &settings, 10_000, vec![usd(10_000)]).await;
        // 500 Bs = $12.50 at bcv 40
        sell_custom(&db, &settings, 1250, vec![bs(PaymentMethod::CashBs, 50_000)]).await;

        let outcome = close_day(
            db.pool(),
            &settings,
            CloseDayRequest {
                date: today,
                counted: vec![
                    counted(PaymentMethod::CashUsd, 9800),
                    counted(PaymentMethod::CashBs, 51_000),
                ],
            },
        )
        .await
        .unwrap();

        let usd_line = outcome
            .lines
            .iter()
            .find(|l| l.method == PaymentMethod::CashUsd)
            .unwrap();
        assert_eq!(usd_line.expected_cents, 10_000);
        assert_eq!(usd_line.difference_cents, -200);

        let bs_line = outcome
            .lines
            .iter()
            .find(|l| l.method == PaymentMethod::CashBs)
            .unwrap();
        assert_eq!(bs_line.expected_cents, 50_000);
        assert_eq!(bs_line.difference_cents, 1000);

        assert_eq!(outcome.reconciliation.total_difference_cents, -175);
        assert_eq!(outcome.reconciliation.sales_closed, 2);
        assert_eq!(
            outcome.reconciliation.id,
            format!("RECON-{}", today.format("%Y-%m-%d"))
        );
    }

    #[tokio::test]
    async fn test_close_day_stamps_sales_and_blocks_refund() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let today = Utc::now().date_naive();

        let sale = sell_custom(&db, &settings, 2000, vec![usd(2000)]).await.sale;

        close_day(
            db.pool(),
            &settings,
            CloseDayRequest {
                date: today,
                counted: vec![counted(PaymentMethod::CashUsd, 2000)],
            },
        )
        .await
        .unwrap();

        let stamped = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert!(stamped.reconciliation_id.is_some());
        assert!(!stamped.is_refundable());

        // Closed sales are immutable
        let err = refund(
            db.pool(),
            RefundRequest {
                sale_id: sale.id,
                reason: "Demasiado tarde".to_string(),
                disposition: StockDisposition::Return,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::SaleAlreadyReconciled { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_day_twice_fails() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let today = Utc::now().date_naive();

        let request = CloseDayRequest {
            date: today,
            counted: vec![],
        };
        close_day(db.pool(), &settings, request.clone()).await.unwrap();

        let err = close_day(db.pool(), &settings, request).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_close_day_rejects_negative_counted() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let today = Utc::now().date_naive();

        let err = close_day(
            db.pool(),
            &settings,
            CloseDayRequest {
                date: today,
                counted: vec![counted(PaymentMethod::CashUsd, -1)],
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        // Validation failed before the transaction: the day is still open
        assert!(db
            .reconciliations()
            .get_by_date(today)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_refunded_sales_excluded_from_expected() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let today = Utc::now().date_naive();

        sell_custom(&db, &settings, 3000, vec![usd(3000)]).await;
        let refunded = sell_custom(&db, &settings, 5000, vec![usd(5000)]).await.sale;
        refund(
            db.pool(),
            RefundRequest {
                sale_id: refunded.id,
                reason: "Devuelto".to_string(),
                disposition: StockDisposition::Return,
            },
        )
        .await
        .unwrap();

        let preview = expected_totals(db.pool(), today).await.unwrap();
        assert_eq!(preview.open_sales, 1);
        let usd_expected = preview
            .expected
            .iter()
            .find(|(m, _)| *m == PaymentMethod::CashUsd)
            .unwrap()
            .1;
        assert_eq!(usd_expected, 3000);
    }

    #[tokio::test]
    async fn test_grand_total_equals_sum_of_per_method_usd_differences() {
        let db = test_db().await;
        let settings = seed_settings(&db).await;
        let today = Utc::now().date_naive();
        let rates = settings.rates();

        sell_custom(&db, &settings, 4000, vec![usd(4000)]).await;
        sell_custom(&db, &settings, 2500, vec![bs(PaymentMethod::PagoMovil, 100_000)]).await;

        let outcome = close_day(
            db.pool(),
            &settings,
            CloseDayRequest {
                date: today,
                counted: vec![
                    counted(PaymentMethod::CashUsd, 3900),
                    counted(PaymentMethod::PagoMovil, 104_000),
                ],
            },
        )
        .await
        .unwrap();

        let sum_of_diffs: i64 = outcome
            .lines
            .iter()
            .map(|l| {
                convert(
                    Money::from_cents(l.difference_cents),
                    l.method.currency(),
                    Currency::Usd,
                    &rates,
                )
                .cents()
            })
            .sum();

        assert_eq!(outcome.reconciliation.total_difference_cents, sum_of_diffs);
    }
}
