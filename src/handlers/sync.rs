use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::Staff;
use crate::errors::{AppError, Result};
use crate::handlers::AppState;
use crate::models::enums::Role;
use crate::models::submission::non_empty;
use crate::services::puller::PullSummary;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncParams {
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFormRequest {
    #[serde(default)]
    pub form_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: PullSummary,
}

impl From<PullSummary> for SyncResponse {
    fn from(summary: PullSummary) -> Self {
        Self {
            success: true,
            message: format!("Synced {} new submissions", summary.synced),
            summary,
        }
    }
}

fn parse_since(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    non_empty(raw)
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|_| AppError::Validation(format!("since is not a valid timestamp: {}", raw)))
        })
        .transpose()
}

// GET /api/forms/sync?formId=&since=
pub async fn sync_submissions(
    Staff(session): Staff,
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<SyncParams>, QueryRejection>,
) -> Result<Json<SyncResponse>> {
    session.require_role(Role::Staff)?;
    let Query(params) = params?;
    let since = parse_since(params.since)?;
    let form_id = non_empty(params.form_id);

    let summary = state.puller.pull(form_id.as_deref(), since).await?;
    Ok(Json(summary.into()))
}

// POST /api/forms/sync
pub async fn sync_form_submissions(
    Staff(session): Staff,
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SyncFormRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>> {
    session.require_role(Role::Staff)?;
    let Json(request) = payload?;
    let form_id = non_empty(request.form_id)
        .ok_or_else(|| AppError::Validation("formId is required".to_string()))?;

    let summary = state.puller.pull(Some(&form_id), None).await?;
    Ok(Json(summary.into()))
}
