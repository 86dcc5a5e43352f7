use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::PortalApi;
use crate::errors::AppError;
use crate::models::portal::{PortalSubmission, SubmissionQuery};
use crate::models::submission::{non_empty, parse_member_id, InsertOutcome, NewSubmission};
use crate::services::database::DatabaseService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    pub synced: usize,
    pub skipped: usize,
    pub total: usize,
}

/// Best-effort association of a portal form id with a local form id.
///
/// Tried in order:
/// 1. the id the caller asked to pull for, used for every item;
/// 2. the local form whose stored portal id equals `remote_form_id`;
/// 3. a local form whose own id equals `remote_form_id`.
///
/// A failing lookup stops the resolution with its error.
pub fn resolve_local_form<E, P, L>(
    requested: Option<&str>,
    remote_form_id: &str,
    by_portal_id: P,
    by_local_id: L,
) -> Result<Option<String>, E>
where
    P: FnOnce(&str) -> Result<Option<String>, E>,
    L: FnOnce(&str) -> Result<Option<String>, E>,
{
    if let Some(requested) = requested {
        return Ok(Some(requested.to_string()));
    }
    match by_portal_id(remote_form_id)? {
        Some(local_id) => Ok(Some(local_id)),
        None => by_local_id(remote_form_id),
    }
}

/// Fetches submissions from the portal and stores the ones not seen yet
#[derive(Clone)]
pub struct SubmissionPuller {
    database: Arc<DatabaseService>,
    portal: Arc<dyn PortalApi>,
}

impl SubmissionPuller {
    pub fn new(database: Arc<DatabaseService>, portal: Arc<dyn PortalApi>) -> Self {
        Self { database, portal }
    }

    /// Pull submissions, optionally for one local form and only those newer
    /// than `since`. A failing list call aborts the pull; items already
    /// inserted stay stored.
    pub async fn pull(
        &self,
        form_id: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<PullSummary, AppError> {
        if let Some(form_id) = form_id {
            if self.database.get_form(form_id)?.is_none() {
                return Err(AppError::NotFound("Form not found locally".to_string()));
            }
        }

        let query = SubmissionQuery {
            form_id: form_id.map(str::to_string),
            since: since.map(|at| at.to_rfc3339()),
        };
        let list = self.portal.list_submissions(&query).await?;

        let Some(submissions) = list.into_submissions() else {
            info!("Portal reported no new submissions");
            return Ok(PullSummary::default());
        };

        let mut summary = PullSummary {
            total: submissions.len(),
            ..Default::default()
        };

        for item in submissions {
            if self.store_item(form_id, item)? {
                summary.synced += 1;
            } else {
                summary.skipped += 1;
            }
        }

        info!(
            "Synced {} submissions, skipped {} of {}",
            summary.synced, summary.skipped, summary.total
        );
        Ok(summary)
    }

    // Returns whether the item was inserted
    fn store_item(&self, requested: Option<&str>, item: PortalSubmission) -> Result<bool, AppError> {
        let database = &self.database;
        let target = resolve_local_form(
            requested,
            &item.form_id,
            |remote| {
                database
                    .find_form_by_portal_id(remote)
                    .map(|form| form.map(|form| form.id))
            },
            |remote| database.get_form(remote).map(|form| form.map(|form| form.id)),
        )?;

        let Some(form_id) = target else {
            warn!("Form {} not found locally, skipping submission", item.form_id);
            return Ok(false);
        };

        let submitted_at = match DateTime::parse_from_rfc3339(&item.submitted_at) {
            Ok(at) => at.with_timezone(&Utc),
            Err(e) => {
                warn!(
                    "Skipping submission from {} with bad timestamp {:?}: {}",
                    item.name, item.submitted_at, e
                );
                return Ok(false);
            }
        };

        let new_submission = NewSubmission {
            form_id,
            member_id: item.member_id.as_ref().and_then(parse_member_id),
            name: item.name,
            email: non_empty(item.email),
            phone: non_empty(item.phone),
            responses: item.responses,
            submitted_at,
        };

        // The store enforces the de-duplication key, so a concurrent pull
        // that got there first also lands here as a duplicate
        match self.database.insert_submission(new_submission)? {
            InsertOutcome::Inserted(_) => Ok(true),
            InsertOutcome::Duplicate(_) | InsertOutcome::Full => Ok(false),
        }
    }
}
