use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::form::{ClosedReason, Form};
use crate::models::submission::{
    non_empty, parse_member_id, InsertOutcome, NewSubmission, WebhookSubmission,
};
use crate::services::database::DatabaseService;

/// Outcome of an accepted webhook delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub submission_id: String,
    /// The delivery matched a submission that was already stored
    pub duplicate: bool,
}

/// Run a webhook delivery through validation, form checks and persistence.
/// Authentication happens before this is called.
pub fn accept_submission(
    database: &DatabaseService,
    payload: WebhookSubmission,
    now: DateTime<Utc>,
) -> Result<Accepted, AppError> {
    let new_submission = validate(payload, now)?;

    let form = load_form(database, &new_submission.form_id)?;

    let count = database.count_submissions(&form.id)?;
    if let Err(reason) = form.acceptance(count, now) {
        info!("Rejected submission for form {}: {:?}", form.id, reason);
        return Err(AppError::Validation(reason.message().to_string()));
    }

    let new_submission = NewSubmission {
        form_id: form.id.clone(),
        ..new_submission
    };

    // Capacity is checked again under the store lock
    match database.insert_submission_capped(new_submission, form.max_entries)? {
        InsertOutcome::Inserted(submission) => {
            info!("Accepted webhook submission {} for form {}", submission.id, form.id);
            Ok(Accepted {
                submission_id: submission.id,
                duplicate: false,
            })
        }
        InsertOutcome::Duplicate(existing) => {
            info!("Webhook redelivered submission {} for form {}", existing.id, form.id);
            Ok(Accepted {
                submission_id: existing.id,
                duplicate: true,
            })
        }
        InsertOutcome::Full => {
            info!("Rejected submission for full form {}", form.id);
            Err(AppError::Validation(ClosedReason::Full.message().to_string()))
        }
    }
}

/// Presence checks. An empty `responses` object is valid; a missing one is not.
fn validate(payload: WebhookSubmission, now: DateTime<Utc>) -> Result<NewSubmission, AppError> {
    let form_id = non_empty(payload.form_id)
        .ok_or_else(|| AppError::Validation("formId is required".to_string()))?;

    let submitter = payload.submitter.unwrap_or_default();
    let name = non_empty(submitter.name)
        .ok_or_else(|| AppError::Validation("submitter.name is required".to_string()))?;

    let responses = payload
        .responses
        .ok_or_else(|| AppError::Validation("responses object is required".to_string()))?;

    let submitted_at = match non_empty(payload.submitted_at) {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|_| AppError::Validation(format!("submittedAt is not a valid timestamp: {}", raw)))?,
        None => now,
    };

    Ok(NewSubmission {
        form_id,
        member_id: submitter.member_id.as_ref().and_then(parse_member_id),
        name,
        email: non_empty(submitter.email),
        phone: non_empty(submitter.phone),
        responses,
        submitted_at,
    })
}

// The portal may address a form by our id or by the id it assigned
fn load_form(database: &DatabaseService, form_id: &str) -> Result<Form, AppError> {
    if let Some(form) = database.get_form(form_id)? {
        return Ok(form);
    }
    if let Some(form) = database.find_form_by_portal_id(form_id)? {
        return Ok(form);
    }
    warn!("Webhook submission for unknown form {}", form_id);
    Err(AppError::NotFound("Form not found".to_string()))
}
