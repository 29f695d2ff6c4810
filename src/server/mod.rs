//! HTTP server for the webhook dispatcher.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Handles a GitHub webhook delivery synchronously and
//!   returns `{"Result": "<status>"}`
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::webhook_handler;

use tower_http::trace::TraceLayer;

use crate::delivery::Hook;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Hook>,
}

impl AppState {
    pub fn new(hook: Hook) -> Self {
        AppState {
            inner: Arc::new(hook),
        }
    }

    /// Returns the delivery handler.
    pub fn hook(&self) -> &Hook {
        &self.inner
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
