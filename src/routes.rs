use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::forms::{create_form, delete_form, get_form, list_forms, update_form};
use crate::handlers::health::{health_check, portal_status};
use crate::handlers::submissions::{delete_submission, export_submissions, list_submissions};
use crate::handlers::sync::{sync_form_submissions, sync_submissions};
use crate::handlers::webhook::{receive_submission, webhook_health};
use crate::handlers::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Health check and the portal webhook are reachable without a staff session
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/forms/submissions/webhook",
            post(receive_submission).get(webhook_health),
        );

    let staff_routes = Router::new()
        .route("/api/forms", get(list_forms).post(create_form))
        .route("/api/forms/sync", get(sync_submissions).post(sync_form_submissions))
        .route(
            "/api/forms/:id",
            get(get_form).patch(update_form).delete(delete_form),
        )
        .route(
            "/api/forms/:id/submissions",
            get(list_submissions).delete(delete_submission),
        )
        .route("/api/forms/:id/submissions/export", get(export_submissions))
        .route("/api/portal/status", get(portal_status));

    public_routes.merge(staff_routes).with_state(app_state)
}
