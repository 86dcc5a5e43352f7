use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::{PortalApi, PortalError};
use crate::models::common::PortalStatus;
use crate::models::enums::{BulletinCategory, Department};
use crate::models::form::{Form, FormChanges};
use crate::models::portal::PortalFormPatch;
use crate::services::database::{DatabaseService, StoreError};
use crate::services::field_schema::{portal_fields, portal_payload};

/// Result of pushing a form change to the portal. Failure is never fatal
/// for the local action; it is only reported back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    pub success: bool,
    pub remote_id: Option<String>,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn ok(remote_id: Option<String>) -> Self {
        Self {
            success: true,
            remote_id,
            error: None,
        }
    }

    fn failed(error: &PortalError) -> Self {
        Self {
            success: false,
            remote_id: None,
            error: Some(error.to_string()),
        }
    }

    pub fn status(&self) -> PortalStatus {
        PortalStatus {
            portal_synced: self.success,
            portal_form_id: self.remote_id.clone(),
            portal_error: self.error.clone(),
        }
    }
}

/// Pushes local form definitions to the portal
#[derive(Clone)]
pub struct FormPublisher {
    portal: Arc<dyn PortalApi>,
}

impl FormPublisher {
    pub fn new(portal: Arc<dyn PortalApi>) -> Self {
        Self { portal }
    }

    pub async fn publish(
        &self,
        form: &Form,
        category: Option<BulletinCategory>,
        department: Option<Department>,
    ) -> SyncOutcome {
        let payload = portal_payload(form, category, department);

        match self.portal.create_form(&payload).await {
            Ok(response) => {
                info!(
                    "Form {} published to portal as {:?}",
                    form.id, response.portal_form_id
                );
                SyncOutcome::ok(response.portal_form_id)
            }
            Err(err) => {
                warn!("Form {} saved locally but portal publish failed: {}", form.id, err);
                SyncOutcome::failed(&err)
            }
        }
    }

    pub async fn update(&self, remote_id: &str, changes: &FormChanges, form: &Form) -> SyncOutcome {
        let patch = portal_patch(changes, form);

        match self.portal.update_form(remote_id, &patch).await {
            Ok(()) => SyncOutcome::ok(Some(remote_id.to_string())),
            Err(err) => {
                warn!("Portal update of form {} failed: {}", remote_id, err);
                SyncOutcome::failed(&err)
            }
        }
    }

    pub async fn retract(&self, remote_id: &str) -> SyncOutcome {
        match self.portal.delete_form(remote_id).await {
            Ok(()) => SyncOutcome::ok(None),
            Err(err) => {
                warn!("Portal delete of form {} failed: {}", remote_id, err);
                SyncOutcome::failed(&err)
            }
        }
    }

    pub async fn check_connection(&self) -> bool {
        self.portal.check_connection().await
    }

    /// Publish a freshly stored form and remember the portal's id for it
    pub async fn publish_and_record(
        &self,
        database: &DatabaseService,
        form: &mut Form,
        category: Option<BulletinCategory>,
        department: Option<Department>,
    ) -> Result<SyncOutcome, StoreError> {
        let outcome = self.publish(form, category, department).await;
        if outcome.success {
            let synced_at = Utc::now();
            database.record_portal_sync(&form.id, outcome.remote_id.as_deref(), synced_at)?;
            if let Some(remote_id) = &outcome.remote_id {
                form.portal_form_id = Some(remote_id.clone());
            }
            form.synced_at = Some(synced_at);
        }
        Ok(outcome)
    }

    /// Propagate an edit: PATCH when the portal already knows the form,
    /// otherwise publish it for the first time
    pub async fn sync_update(
        &self,
        database: &DatabaseService,
        form: &mut Form,
        changes: &FormChanges,
        department: Option<Department>,
    ) -> Result<SyncOutcome, StoreError> {
        match form.portal_form_id.clone() {
            Some(remote_id) => {
                let outcome = self.update(&remote_id, changes, form).await;
                if outcome.success {
                    let synced_at = Utc::now();
                    database.record_portal_sync(&form.id, None, synced_at)?;
                    form.synced_at = Some(synced_at);
                }
                Ok(outcome)
            }
            None => {
                self.publish_and_record(database, form, changes.category, department)
                    .await
            }
        }
    }
}

/// Only the members present in `changes`, in the portal's shape. Fields are
/// taken from the stored form so they carry their final ids.
pub fn portal_patch(changes: &FormChanges, form: &Form) -> PortalFormPatch {
    PortalFormPatch {
        title: changes.title.clone(),
        description: changes.description.as_ref().map(|_| form.description.clone()),
        deadline: changes
            .deadline
            .as_ref()
            .map(|_| form.deadline.map(|d| d.to_rfc3339())),
        max_entries: changes.max_entries.as_ref().map(|_| form.max_entries),
        is_active: changes.is_active,
        category: changes.category,
        fields: changes.fields.as_ref().map(|_| portal_fields(&form.fields)),
    }
}
