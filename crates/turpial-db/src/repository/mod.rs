//! # Repositories
//!
//! One repository per collection. Repositories cover single-document reads
//! and writes; anything that must mutate several documents atomically
//! (checkout, refund, close-day) lives in [`crate::ops`] instead and runs
//! inside one transaction.

pub mod product;
pub mod reconciliation;
pub mod repair;
pub mod sale;
pub mod settings;

pub use product::ProductRepository;
pub use reconciliation::ReconciliationRepository;
pub use repair::{NewRepairJob, PartRequest, RepairJobRepository};
pub use sale::SaleRepository;
pub use settings::SettingsRepository;
