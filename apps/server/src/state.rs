//! Shared application state.
//!
//! One state type for the whole router: the database handle (cheap to
//! clone, pool inside), the immutable config, and the HTTP client for the
//! rate feed. No cart lives here - carts belong to the browser; the
//! server only sees them at checkout.

use std::sync::Arc;

use crate::config::Config;
use turpial_db::Database;

/// Axum-managed application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: Database, config: Arc<Config>) -> Self {
        AppState {
            db,
            config,
            http: reqwest::Client::new(),
        }
    }
}
