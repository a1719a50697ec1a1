//! # Repair Job Repository
//!
//! Repair job lifecycle:
//! created (parts reserved) -> status transitions -> settled at checkout
//! (reserved parts consumed, see [`crate::ops::checkout`]) -> or deleted
//! (reserved parts released).
//!
//! Reservation and release touch both the job and the affected products,
//! so they run inside a transaction: the part list and the products'
//! `reserved_stock` never disagree.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::ids::generate_repair_id;
use crate::repository::product::{ProductRow, SELECT_PRODUCT};
use turpial_core::{RepairJob, RepairStatus, ReservedPart};

pub(crate) const SELECT_REPAIR: &str = "SELECT id, customer_name, customer_phone, device_brand, \
     device_model, reported_issue, status, estimated_cost_cents, \
     amount_paid_cents, is_paid, reserved_parts, created_at, completed_at, \
     warranty_end_date FROM repair_jobs";

/// Raw repair job row; `reserved_parts` is the JSON TEXT column.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RepairJobRow {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub device_brand: String,
    pub device_model: String,
    pub status: RepairStatus,
    pub reported_issue: String,
    pub estimated_cost_cents: i64,
    pub amount_paid_cents: i64,
    pub is_paid: bool,
    pub reserved_parts: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub warranty_end_date: Option<DateTime<Utc>>,
}

impl RepairJobRow {
    pub(crate) fn into_job(self) -> DbResult<RepairJob> {
        let reserved_parts: Vec<ReservedPart> = serde_json::from_str(&self.reserved_parts)
            .map_err(|e| DbError::corrupt_column("reserved_parts", e))?;

        Ok(RepairJob {
            id: self.id,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            device_brand: self.device_brand,
            device_model: self.device_model,
            reported_issue: self.reported_issue,
            status: self.status,
            estimated_cost_cents: self.estimated_cost_cents,
            amount_paid_cents: self.amount_paid_cents,
            is_paid: self.is_paid,
            reserved_parts,
            created_at: self.created_at,
            completed_at: self.completed_at,
            warranty_end_date: self.warranty_end_date,
        })
    }
}

/// A part to reserve when creating a job.
#[derive(Debug, Clone)]
pub struct PartRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Input for creating a repair job.
#[derive(Debug, Clone)]
pub struct NewRepairJob {
    pub customer_name: String,
    pub customer_phone: String,
    pub device_brand: String,
    pub device_model: String,
    pub reported_issue: String,
    pub estimated_cost_cents: i64,
    pub parts: Vec<PartRequest>,
}

/// Repository for repair job database operations.
#[derive(Debug, Clone)]
pub struct RepairJobRepository {
    pool: SqlitePool,
}

impl RepairJobRepository {
    /// Creates a new RepairJobRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RepairJobRepository { pool }
    }

    /// Gets a repair job by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RepairJob>> {
        let row: Option<RepairJobRow> =
            sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_REPAIR))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(RepairJobRow::into_job).transpose()
    }

    /// Lists repair jobs, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<RepairStatus>, limit: u32) -> DbResult<Vec<RepairJob>> {
        let rows: Vec<RepairJobRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "{} WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2",
                    SELECT_REPAIR
                ))
                .bind(status)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "{} ORDER BY created_at DESC LIMIT ?1",
                    SELECT_REPAIR
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(RepairJobRow::into_job).collect()
    }

    /// Creates a repair job and reserves its parts.
    ///
    /// Each requested part must exist; its name is frozen into the
    /// reservation and the product's `reserved_stock` is incremented
    /// (read-modify-write). A missing product aborts the whole creation.
    pub async fn create(&self, input: NewRepairJob) -> DbResult<RepairJob> {
        let id = generate_repair_id();
        let now = Utc::now();

        debug!(id = %id, parts = input.parts.len(), "Creating repair job");

        let mut tx = self.pool.begin().await?;

        let mut reserved_parts: Vec<ReservedPart> = Vec::with_capacity(input.parts.len());
        for part in &input.parts {
            let row: Option<ProductRow> =
                sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_PRODUCT))
                    .bind(&part.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            let product = row
                .ok_or_else(|| DbError::not_found("Product", &part.product_id))?
                .into_product()?;

            sqlx::query(
                "UPDATE products SET reserved_stock = ?2, updated_at = ?3 WHERE id = ?1",
            )
            .bind(&product.id)
            .bind(product.reserved_stock + part.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            reserved_parts.push(ReservedPart {
                product_id: product.id,
                product_name: product.name,
                quantity: part.quantity,
            });
        }

        let parts_json = serde_json::to_string(&reserved_parts)
            .map_err(|e| DbError::corrupt_column("reserved_parts", e))?;

        sqlx::query(
            "INSERT INTO repair_jobs ( \
                id, customer_name, customer_phone, device_brand, device_model, \
                reported_issue, status, estimated_cost_cents, amount_paid_cents, \
                is_paid, reserved_parts, created_at \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, ?9, ?10)",
        )
        .bind(&id)
        .bind(&input.customer_name)
        .bind(&input.customer_phone)
        .bind(&input.device_brand)
        .bind(&input.device_model)
        .bind(&input.reported_issue)
        .bind(RepairStatus::Pending)
        .bind(input.estimated_cost_cents)
        .bind(&parts_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %id, "Repair job created");

        Ok(RepairJob {
            id,
            customer_name: input.customer_name,
            customer_phone: input.customer_phone,
            device_brand: input.device_brand,
            device_model: input.device_model,
            reported_issue: input.reported_issue,
            status: RepairStatus::Pending,
            estimated_cost_cents: input.estimated_cost_cents,
            amount_paid_cents: 0,
            is_paid: false,
            reserved_parts,
            created_at: now,
            completed_at: None,
            warranty_end_date: None,
        })
    }

    /// Updates the status of a repair job.
    ///
    /// Completion via checkout stamps `completed_at`/warranty in the
    /// checkout transaction; this covers the manual bench transitions.
    pub async fn update_status(&self, id: &str, status: RepairStatus) -> DbResult<()> {
        debug!(id = %id, status = ?status, "Updating repair job status");

        let result = sqlx::query("UPDATE repair_jobs SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Repair job", id));
        }

        Ok(())
    }

    /// Deletes a repair job and releases its reserved parts back to the
    /// products (`reserved_stock` decremented, clamped at zero).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting repair job");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row: Option<RepairJobRow> =
            sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_REPAIR))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let job = row
            .ok_or_else(|| DbError::not_found("Repair job", id))?
            .into_job()?;

        for part in &job.reserved_parts {
            let reserved: Option<i64> =
                sqlx::query_scalar("SELECT reserved_stock FROM products WHERE id = ?1")
                    .bind(&part.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            // The product may have been deleted since reservation; there
            // is nothing left to release then.
            if let Some(reserved) = reserved {
                sqlx::query(
                    "UPDATE products SET reserved_stock = ?2, updated_at = ?3 WHERE id = ?1",
                )
                .bind(&part.product_id)
                .bind((reserved - part.quantity).max(0))
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("DELETE FROM repair_jobs WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = %id, "Repair job deleted, reserved parts released");
        Ok(())
    }
}
