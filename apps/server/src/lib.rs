//! # turpial-server
//!
//! Axum HTTP API for Turpial POS. Handlers are thin: validate, read the
//! settings snapshot where pricing is involved, call into turpial-db, map
//! errors onto [`error::ApiError`].

pub mod config;
pub mod error;
pub mod rates;
pub mod routes;
pub mod state;
