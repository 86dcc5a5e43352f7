use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::auth::Staff;
use crate::errors::{AppError, Result};
use crate::handlers::AppState;
use crate::models::enums::Role;
use crate::models::form::Form;
use crate::models::submission::{non_empty, DeleteSubmissionParams};
use crate::services::export::{export_file_name, submissions_csv};

fn load_form(state: &AppState, id: &str) -> Result<Form> {
    state
        .database
        .get_form(id)?
        .ok_or_else(|| AppError::NotFound("Form not found".to_string()))
}

// GET /api/forms/:id/submissions
pub async fn list_submissions(
    Staff(_session): Staff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let form = load_form(&state, &id)?;
    let submissions = state.database.list_submissions(&id)?;

    Ok(Json(json!({
        "success": true,
        "form": {
            "id": form.id,
            "title": form.title,
            "fields": form.fields,
        },
        "totalCount": submissions.len(),
        "submissions": submissions,
    })))
}

// DELETE /api/forms/:id/submissions?submissionId=
pub async fn delete_submission(
    Staff(session): Staff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: std::result::Result<Query<DeleteSubmissionParams>, QueryRejection>,
) -> Result<Json<Value>> {
    session.require_role(Role::Staff)?;
    let Query(params) = params?;

    let submission_id = non_empty(params.submission_id)
        .ok_or_else(|| AppError::Validation("submissionId is required".to_string()))?;

    if !state.database.delete_submission(&id, &submission_id)? {
        return Err(AppError::NotFound("Submission not found".to_string()));
    }
    info!("Submission {} deleted by {}", submission_id, session.user_id);

    Ok(Json(json!({
        "success": true,
        "message": "Submission deleted successfully",
    })))
}

// GET /api/forms/:id/submissions/export
pub async fn export_submissions(
    Staff(_session): Staff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let form = load_form(&state, &id)?;
    let submissions = state.database.list_submissions(&id)?;
    let body = submissions_csv(&form, &submissions)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(&form, Utc::now())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
