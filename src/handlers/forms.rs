use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::auth::Staff;
use crate::errors::{AppError, Result};
use crate::handlers::AppState;
use crate::models::common::PortalStatus;
use crate::models::enums::Role;
use crate::models::form::{
    CreateFormRequest, FieldInput, Form, FormChanges, FormSummary, ListFormsParams, NewForm,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    pub success: bool,
    pub form: Form,
    #[serde(flatten)]
    pub portal: PortalStatus,
}

fn validate_fields(fields: &[FieldInput]) -> Result<()> {
    if fields.is_empty() {
        return Err(AppError::Validation("At least one field is required".to_string()));
    }
    for (index, field) in fields.iter().enumerate() {
        if field.label.trim().is_empty() {
            return Err(AppError::Validation(format!("Field {} needs a label", index + 1)));
        }
        let has_options = field.options.as_ref().map_or(false, |options| !options.is_empty());
        if field.field_type.has_options() && !has_options {
            return Err(AppError::Validation(format!("Field {} needs options", index + 1)));
        }
    }
    Ok(())
}

// GET /api/forms
pub async fn list_forms(
    Staff(_session): Staff,
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<ListFormsParams>, QueryRejection>,
) -> Result<Json<Value>> {
    let Query(params) = params?;
    let forms: Vec<FormSummary> = state.database.list_forms(params.include_inactive)?;
    Ok(Json(json!({ "success": true, "forms": forms })))
}

// POST /api/forms
pub async fn create_form(
    Staff(session): Staff,
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateFormRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FormResponse>)> {
    session.require_role(Role::Staff)?;
    let Json(request) = payload?;

    let title = request
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Title is required".to_string()))?;
    let fields = request.fields.unwrap_or_default();
    validate_fields(&fields)?;

    let mut form = state.database.create_form(NewForm {
        title,
        description: request.description,
        deadline: request.deadline,
        max_entries: request.max_entries,
        created_by: session.user_id.clone(),
        fields,
    })?;
    info!("Form {} created by {}", form.id, session.user_id);

    let outcome = state
        .publisher
        .publish_and_record(&state.database, &mut form, request.category, Some(session.department))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(FormResponse {
            success: true,
            form,
            portal: outcome.status(),
        }),
    ))
}

// GET /api/forms/:id
pub async fn get_form(
    Staff(_session): Staff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let form = state
        .database
        .get_form(&id)?
        .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;
    let submission_count = state.database.count_submissions(&id)?;

    Ok(Json(json!({
        "success": true,
        "form": FormSummary { form, submission_count },
    })))
}

// PATCH /api/forms/:id
pub async fn update_form(
    Staff(session): Staff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<FormChanges>, JsonRejection>,
) -> Result<Json<FormResponse>> {
    session.require_role(Role::Staff)?;
    let Json(changes) = payload?;

    if changes.is_empty() {
        return Err(AppError::Validation("No changes provided".to_string()));
    }
    if let Some(title) = &changes.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
    }
    if let Some(fields) = &changes.fields {
        validate_fields(fields)?;
    }

    let mut form = state
        .database
        .update_form(&id, &changes)?
        .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;

    let outcome = state
        .publisher
        .sync_update(&state.database, &mut form, &changes, Some(session.department))
        .await?;

    Ok(Json(FormResponse {
        success: true,
        form,
        portal: outcome.status(),
    }))
}

// DELETE /api/forms/:id
pub async fn delete_form(
    Staff(session): Staff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    session.require_role(Role::Staff)?;

    let form = state
        .database
        .get_form(&id)?
        .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;

    // The portal also tracks forms by our id, so retract even if we never
    // stored one of its ids
    let remote_id = form.portal_form_id.as_deref().unwrap_or(&form.id);
    let outcome = state.publisher.retract(remote_id).await;

    state.database.delete_form(&id)?;
    info!("Form {} deleted by {}", id, session.user_id);

    Ok(Json(json!({
        "success": true,
        "message": "Form deleted successfully",
        "portalSynced": outcome.success,
        "portalError": outcome.error,
    })))
}
