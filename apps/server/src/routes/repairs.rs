//! # Repair Job Handlers
//!
//! Ticket intake (with part reservation), bench status transitions, and
//! deletion (which releases reserved parts). Settlement of a finished
//! repair happens at checkout with a repair cart line, not here.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;
use turpial_core::validation::{validate_price_cents, validate_quantity};
use turpial_core::{RepairJob, RepairStatus, ValidationError};
use turpial_db::repository::{NewRepairJob, PartRequest};

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedPartDto {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairJobDto {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub device_brand: String,
    pub device_model: String,
    pub reported_issue: String,
    pub status: RepairStatus,
    pub estimated_cost_cents: i64,
    pub amount_paid_cents: i64,
    pub is_paid: bool,
    pub reserved_parts: Vec<ReservedPartDto>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub warranty_end_date: Option<String>,
}

impl From<RepairJob> for RepairJobDto {
    fn from(job: RepairJob) -> Self {
        RepairJobDto {
            id: job.id,
            customer_name: job.customer_name,
            customer_phone: job.customer_phone,
            device_brand: job.device_brand,
            device_model: job.device_model,
            reported_issue: job.reported_issue,
            status: job.status,
            estimated_cost_cents: job.estimated_cost_cents,
            amount_paid_cents: job.amount_paid_cents,
            is_paid: job.is_paid,
            reserved_parts: job
                .reserved_parts
                .into_iter()
                .map(|p| ReservedPartDto {
                    product_id: p.product_id,
                    product_name: p.product_name,
                    quantity: p.quantity,
                })
                .collect(),
            created_at: job.created_at.to_rfc3339(),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
            warranty_end_date: job.warranty_end_date.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRequestDto {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepairRequest {
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub device_brand: String,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub reported_issue: String,
    pub estimated_cost_cents: i64,
    #[serde(default)]
    pub parts: Vec<PartRequestDto>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<RepairStatus>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: RepairStatus,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RepairJobDto>>, ApiError> {
    let jobs = state
        .db
        .repair_jobs()
        .list(params.status, params.limit)
        .await?;

    Ok(Json(jobs.into_iter().map(RepairJobDto::from).collect()))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RepairJobDto>, ApiError> {
    let job = state
        .db
        .repair_jobs()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Repair job", &id))?;

    Ok(Json(job.into()))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateRepairRequest>,
) -> Result<Json<RepairJobDto>, ApiError> {
    debug!(customer = %request.customer_name, "create_repair");

    if request.customer_name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "customer name".to_string(),
        }
        .into());
    }
    validate_price_cents(request.estimated_cost_cents)?;
    for part in &request.parts {
        validate_quantity(part.quantity)?;
    }

    let job = state
        .db
        .repair_jobs()
        .create(NewRepairJob {
            customer_name: request.customer_name.trim().to_string(),
            customer_phone: request.customer_phone.trim().to_string(),
            device_brand: request.device_brand.trim().to_string(),
            device_model: request.device_model.trim().to_string(),
            reported_issue: request.reported_issue.trim().to_string(),
            estimated_cost_cents: request.estimated_cost_cents,
            parts: request
                .parts
                .into_iter()
                .map(|p| PartRequest {
                    product_id: p.product_id,
                    quantity: p.quantity,
                })
                .collect(),
        })
        .await?;

    info!(id = %job.id, "Repair job created");
    Ok(Json(job.into()))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<RepairJobDto>, ApiError> {
    debug!(id = %id, status = ?request.status, "update_repair_status");

    state.db.repair_jobs().update_status(&id, request.status).await?;

    let job = state
        .db
        .repair_jobs()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Repair job", &id))?;

    Ok(Json(job.into()))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.db.repair_jobs().delete(&id).await?;
    info!(id = %id, "Repair job deleted");
    Ok(Json(serde_json::json!({ "deleted": id })))
}
