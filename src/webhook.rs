//! Inbound call-ready notification endpoint.
//!
//! The remote service announces a ringing call by POSTing a JSON event here.
//! The handler only validates the payload and enqueues a typed notification
//! for the orchestrator, then acknowledges immediately — the remote treats a
//! slow response as undelivered and retries, so authorization and streaming
//! must never sit between parse and ack.

use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

/// The only event type this bridge consumes.
pub const INCOMING_CALL_EVENT: &str = "realtime.call.incoming";

/// Wire shape of the webhook body. The call identifier is nested under
/// `data`.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookCallData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookCallData {
    pub call_id: String,
}

/// Typed event handed to the orchestrator. Immutable once constructed;
/// consumed exactly once.
#[derive(Debug, Clone)]
pub struct CallReadyNotification {
    pub call_id: String,
    pub received_at: DateTime<Utc>,
    pub raw_payload: serde_json::Value,
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

pub enum WebhookError {
    /// Payload did not carry a parseable, non-empty call identifier.
    Malformed(String),
    /// The orchestrator cannot take the event right now; the remote should
    /// redeliver.
    Unavailable,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::Malformed(message) => {
                warn!(%message, "rejecting webhook payload");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
            WebhookError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    message: "notification queue unavailable".to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Axum handler for the webhook receipt point.
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<serde_json::Value>,
) -> Result<StatusCode, WebhookError> {
    // The type check comes first, on the raw value: events this bridge does
    // not consume carry arbitrary `data` shapes and must still be acked.
    let kind = raw.get("type").and_then(|v| v.as_str()).ok_or_else(|| {
        WebhookError::Malformed("webhook event has no type field".to_string())
    })?;

    if kind != INCOMING_CALL_EVENT {
        // Ack unknown event types so the remote does not redeliver them.
        info!(%kind, "ignoring webhook event of unexpected type");
        return Ok(StatusCode::OK);
    }

    let event: WebhookEvent = serde_json::from_value(raw.clone())
        .map_err(|e| WebhookError::Malformed(format!("unparseable webhook event: {}", e)))?;

    if event.data.call_id.is_empty() {
        return Err(WebhookError::Malformed(
            "webhook event has empty call_id".to_string(),
        ));
    }

    let notification = CallReadyNotification {
        call_id: event.data.call_id,
        received_at: Utc::now(),
        raw_payload: raw,
    };

    info!(call_id = %notification.call_id, "call-ready notification received");

    // try_send keeps the ack independent of downstream work.
    match state.notifications.try_send(notification) {
        Ok(()) => Ok(StatusCode::OK),
        Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
            Err(WebhookError::Unavailable)
        }
    }
}
