use async_trait::async_trait;
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::{PortalApi, PortalError};
use crate::models::portal::{
    PortalCreateResponse, PortalFormPatch, PortalFormPayload, PortalSubmission,
    PortalSubmissionData, PortalSubmissionList, SubmissionQuery,
};

// Define a mock for the community portal API
mock! {
    pub Portal {}

    #[async_trait]
    impl PortalApi for Portal {
        async fn create_form(&self, payload: &PortalFormPayload) -> Result<PortalCreateResponse, PortalError>;
        async fn update_form(&self, portal_form_id: &str, patch: &PortalFormPatch) -> Result<(), PortalError>;
        async fn delete_form(&self, portal_form_id: &str) -> Result<(), PortalError>;
        async fn list_submissions(&self, query: &SubmissionQuery) -> Result<PortalSubmissionList, PortalError>;
        async fn check_connection(&self) -> bool;
    }
}

// A simple in-memory portal for the mock to work against
#[derive(Default)]
pub struct MockPortalStore {
    forms: Mutex<HashMap<String, PortalFormPayload>>,
    patches: Mutex<Vec<(String, PortalFormPatch)>>,
    submissions: Mutex<Vec<PortalSubmission>>,
    next_id: Mutex<u32>,
}

impl MockPortalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_form(&self, payload: &PortalFormPayload) -> String {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let portal_id = format!("portal_{}", next_id);
        self.forms
            .lock()
            .unwrap()
            .insert(portal_id.clone(), payload.clone());
        portal_id
    }

    pub fn get_form(&self, portal_id: &str) -> Option<PortalFormPayload> {
        self.forms.lock().unwrap().get(portal_id).cloned()
    }

    pub fn form_count(&self) -> usize {
        self.forms.lock().unwrap().len()
    }

    /// Applies the patch; `false` when the portal has no such form
    pub fn patch_form(&self, portal_id: &str, patch: &PortalFormPatch) -> bool {
        let mut forms = self.forms.lock().unwrap();
        let Some(form) = forms.get_mut(portal_id) else {
            return false;
        };
        if let Some(title) = &patch.title {
            form.title = title.clone();
        }
        if let Some(description) = &patch.description {
            form.description = description.clone();
        }
        if let Some(deadline) = &patch.deadline {
            form.deadline = deadline.clone();
        }
        if let Some(max_entries) = patch.max_entries {
            form.max_entries = max_entries;
        }
        if let Some(is_active) = patch.is_active {
            form.is_active = is_active;
        }
        if let Some(category) = patch.category {
            form.category = category;
        }
        if let Some(fields) = &patch.fields {
            form.fields = fields.clone();
        }
        self.patches
            .lock()
            .unwrap()
            .push((portal_id.to_string(), patch.clone()));
        true
    }

    pub fn patches(&self) -> Vec<(String, PortalFormPatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn delete_form(&self, portal_id: &str) {
        self.forms.lock().unwrap().remove(portal_id);
    }

    pub fn add_submission(&self, submission: PortalSubmission) {
        self.submissions.lock().unwrap().push(submission);
    }

    /// Filters like the portal: `formId` is the band office's id, which the
    /// portal keeps on every form it published for us
    pub fn list_submissions(&self, query: &SubmissionQuery) -> Vec<PortalSubmission> {
        let forms = self.forms.lock().unwrap();
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| match &query.form_id {
                None => true,
                Some(local_id) => {
                    s.form_id == *local_id
                        || forms
                            .get(&s.form_id)
                            .map_or(false, |form| form.form_id == *local_id)
                }
            })
            .filter(|s| match &query.since {
                None => true,
                Some(since) => s.submitted_at.as_str() > since.as_str(),
            })
            .cloned()
            .collect()
    }
}

/// A mock portal wired to a fresh in-memory store
pub fn setup_mock_portal() -> (MockPortal, Arc<MockPortalStore>) {
    let store = Arc::new(MockPortalStore::new());
    let mut mock_portal = MockPortal::new();

    let store_ref = Arc::clone(&store);
    mock_portal.expect_create_form().returning(move |payload| {
        let portal_id = store_ref.create_form(payload);
        Ok(PortalCreateResponse {
            portal_form_id: Some(portal_id),
        })
    });

    let store_ref = Arc::clone(&store);
    mock_portal
        .expect_update_form()
        .returning(move |portal_id, patch| {
            if store_ref.patch_form(portal_id, patch) {
                Ok(())
            } else {
                Err(PortalError::Status {
                    status: 404,
                    message: "Form not found".to_string(),
                })
            }
        });

    let store_ref = Arc::clone(&store);
    mock_portal.expect_delete_form().returning(move |portal_id| {
        store_ref.delete_form(portal_id);
        Ok(())
    });

    let store_ref = Arc::clone(&store);
    mock_portal.expect_list_submissions().returning(move |query| {
        Ok(PortalSubmissionList {
            success: true,
            data: Some(PortalSubmissionData {
                submissions: Some(store_ref.list_submissions(query)),
            }),
        })
    });

    mock_portal.expect_check_connection().return_const(true);

    (mock_portal, store)
}

/// A portal that is down: every call fails with a 503
pub fn setup_unavailable_portal() -> MockPortal {
    fn unavailable() -> PortalError {
        PortalError::Status {
            status: 503,
            message: "Portal returned 503".to_string(),
        }
    }

    let mut mock_portal = MockPortal::new();
    mock_portal.expect_create_form().returning(|_| Err(unavailable()));
    mock_portal.expect_update_form().returning(|_, _| Err(unavailable()));
    mock_portal.expect_delete_form().returning(|_| Err(unavailable()));
    mock_portal.expect_list_submissions().returning(|_| Err(unavailable()));
    mock_portal.expect_check_connection().return_const(false);
    mock_portal
}
