//! Axum Router Configuration
//!
//! The HTTP surface is intentionally tiny: the webhook receipt point plus a
//! health probe for the listener itself.

use crate::{state::AppState, webhook::webhook_handler};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/healthz", get(health))
        .with_state(app_state)
}

async fn health() -> &'static str {
    "ok"
}
