//! Webhook endpoint handler.
//!
//! Handles each GitHub delivery synchronously: the response is sent only
//! after every queue and table write for the delivery has completed, so a
//! non-2xx status tells GitHub to redeliver.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::debug;

use super::AppState;
use crate::delivery::{DeliveryError, HookResponse};
use crate::types::DeliveryId;

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::Delivery(e) if !e.is_retryable() => StatusCode::BAD_REQUEST,
            WebhookError::Delivery(DeliveryError::Store(e)) if e.is_conflict() => {
                StatusCode::CONFLICT
            }
            WebhookError::Delivery(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `X-GitHub-Event`: Event type (e.g., "push", "installation")
/// - Optional headers:
///   - `X-GitHub-Delivery`: Delivery ID, used only in logs
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 200 OK: `{"Result": "<status>"}`, including for events that needed no
///   action
/// - 400 Bad Request: Missing header, unknown event type or malformed payload
/// - 409 Conflict: A record changed between read and delete
/// - 503 Service Unavailable: A queue or table could not be reached
///
/// # Example
///
/// ```ignore
/// POST /webhook HTTP/1.1
/// X-GitHub-Event: push
/// X-GitHub-Delivery: 72d3162e-cc78-11e3-81ab-4c9367dc0958
/// Content-Type: application/json
///
/// {"ref": "refs/heads/master", "commits": [...], "repository": {...}}
///
/// HTTP/1.1 200 OK
///
/// {"Result":"truth"}
/// ```
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<HookResponse>, WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let delivery_id = get_header(&headers, HEADER_DELIVERY)
        .ok()
        .map(DeliveryId::new);

    debug!(
        delivery_id = delivery_id.as_ref().map(DeliveryId::as_str).unwrap_or("-"),
        event_type = %event_type,
        bytes = body.len(),
        "Received webhook"
    );

    let response = app_state
        .hook()
        .handle(delivery_id.as_ref(), &event_type, &body)
        .await?;
    Ok(Json(response))
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
