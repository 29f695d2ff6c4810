//! Liveness endpoint.
//!
//! Reports only that the process is serving requests. It does not check the
//! queues or tables; a backend outage shows up as 503s on `/webhook`.

use axum::http::StatusCode;

/// Returns 200 with the text "OK".
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
