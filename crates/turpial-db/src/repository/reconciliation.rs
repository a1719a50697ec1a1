//! # Reconciliation Repository
//!
//! Read paths for daily reconciliations. Creation happens only in
//! [`crate::ops::close_day`].

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use turpial_core::{DailyReconciliation, PaymentMethod, ReconciliationLine};

pub(crate) const SELECT_RECON: &str = "SELECT id, date, total_expected_cents, total_counted_cents, \
     total_difference_cents, sales_closed, created_at FROM daily_reconciliations";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ReconciliationRow {
    pub id: String,
    pub date: NaiveDate,
    pub total_expected_cents: i64,
    pub total_counted_cents: i64,
    pub total_difference_cents: i64,
    pub sales_closed: i64,
    pub created_at: DateTime<Utc>,
}

impl ReconciliationRow {
    pub(crate) fn into_reconciliation(self) -> DailyReconciliation {
        DailyReconciliation {
            id: self.id,
            date: self.date,
            total_expected_cents: self.total_expected_cents,
            total_counted_cents: self.total_counted_cents,
            total_difference_cents: self.total_difference_cents,
            sales_closed: self.sales_closed,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ReconciliationLineRow {
    pub reconciliation_id: String,
    pub method: PaymentMethod,
    pub expected_cents: i64,
    pub counted_cents: i64,
    pub difference_cents: i64,
}

impl ReconciliationLineRow {
    pub(crate) fn into_line(self) -> ReconciliationLine {
        ReconciliationLine {
            reconciliation_id: self.reconciliation_id,
            method: self.method,
            expected_cents: self.expected_cents,
            counted_cents: self.counted_cents,
            difference_cents: self.difference_cents,
        }
    }
}

/// Repository for daily reconciliation reads.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    pool: SqlitePool,
}

impl ReconciliationRepository {
    /// Creates a new ReconciliationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReconciliationRepository { pool }
    }

    /// Gets a reconciliation by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<DailyReconciliation>> {
        let row: Option<ReconciliationRow> =
            sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_RECON))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(ReconciliationRow::into_reconciliation))
    }

    /// Gets the reconciliation of a calendar day, if the day was closed.
    pub async fn get_by_date(&self, date: NaiveDate) -> DbResult<Option<DailyReconciliation>> {
        let row: Option<ReconciliationRow> =
            sqlx::query_as(&format!("{} WHERE date = ?1", SELECT_RECON))
                .bind(date)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(ReconciliationRow::into_reconciliation))
    }

    /// Gets the per-method lines of a reconciliation.
    pub async fn get_lines(&self, reconciliation_id: &str) -> DbResult<Vec<ReconciliationLine>> {
        let rows: Vec<ReconciliationLineRow> = sqlx::query_as(
            "SELECT reconciliation_id, method, expected_cents, counted_cents, difference_cents \
             FROM reconciliation_lines WHERE reconciliation_id = ?1 ORDER BY method",
        )
        .bind(reconciliation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(ReconciliationLineRow::into_line)
            .collect())
    }

    /// Lists recent reconciliations, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<DailyReconciliation>> {
        let rows: Vec<ReconciliationRow> = sqlx::query_as(&format!(
            "{} ORDER BY date DESC LIMIT ?1",
            SELECT_RECON
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(ReconciliationRow::into_reconciliation)
            .collect())
    }
}
