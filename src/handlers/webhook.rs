use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::auth::verify_webhook_secret;
use crate::errors::{AppError, Result};
use crate::handlers::AppState;
use crate::models::submission::{WebhookAck, WebhookSubmission};
use crate::services::intake::accept_submission;

// POST /api/forms/submissions/webhook
//
// The body is read raw so a bad key is always answered with 401 before
// anything in the payload is looked at.
pub async fn receive_submission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>)> {
    verify_webhook_secret(&headers, state.webhook_secret.as_deref())?;

    let payload: WebhookSubmission = serde_json::from_slice(&body).map_err(|e| {
        warn!("Malformed webhook body: {}", e);
        AppError::Validation(format!("Invalid JSON body: {}", e))
    })?;

    let accepted = accept_submission(&state.database, payload, Utc::now())?;
    let message = if accepted.duplicate {
        "Submission already received"
    } else {
        "Submission received successfully"
    };

    Ok((
        StatusCode::CREATED,
        Json(WebhookAck {
            success: true,
            submission_id: accepted.submission_id,
            message: message.to_string(),
        }),
    ))
}

// GET /api/forms/submissions/webhook
pub async fn webhook_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "endpoint": "/api/forms/submissions/webhook",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
