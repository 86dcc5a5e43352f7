use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::enums::{BulletinCategory, Department, FieldType};

/// Field descriptor as the portal expects it. `field_id` is the semantic
/// identifier, never our row id unless the field has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalField {
    pub field_id: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub order: u32,
    pub placeholder: Option<String>,
    pub options: Option<Vec<String>>,
}

/// Body of `POST /api/signup-forms`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalFormPayload {
    pub form_id: String,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub max_entries: Option<u32>,
    pub is_active: bool,
    pub category: BulletinCategory,
    pub created_by: Department,
    pub fields: Vec<PortalField>,
}

/// Body of `PATCH /api/signup-forms/{id}`; absent members are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalFormPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<BulletinCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<PortalField>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalCreateResponse {
    #[serde(default)]
    pub portal_form_id: Option<String>,
}

/// A submission record from the portal's list endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalSubmission {
    pub form_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub member_id: Option<Value>,
    #[serde(default)]
    pub responses: Map<String, Value>,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PortalSubmissionData {
    #[serde(default)]
    pub submissions: Option<Vec<PortalSubmission>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PortalSubmissionList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<PortalSubmissionData>,
}

impl PortalSubmissionList {
    /// The submissions, or `None` when the portal reported nothing usable
    pub fn into_submissions(self) -> Option<Vec<PortalSubmission>> {
        if !self.success {
            return None;
        }
        self.data.and_then(|data| data.submissions)
    }
}

/// Query for the portal's submission list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}
