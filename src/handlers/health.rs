use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::Staff;
use crate::handlers::AppState;

// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

// GET /api/portal/status
pub async fn portal_status(
    Staff(_session): Staff,
    State(state): State<Arc<AppState>>,
) -> Json<Value> {
    let connected = state.publisher.check_connection().await;
    Json(json!({ "success": true, "connected": connected }))
}
