use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::enums::{BulletinCategory, FieldType};
use crate::services::field_schema::semantic_field_id;

/// A sign-up form together with its ordered fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: String,
    pub portal_form_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub max_entries: Option<u32>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub form_id: String,
    /// Semantic identifier used to match responses across systems
    pub field_id: Option<String>,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub order: u32,
    pub options: Option<Vec<String>>,
    pub placeholder: Option<String>,
}

impl FormField {
    /// Key under which this field's answer is stored in a submission
    pub fn response_key(&self) -> &str {
        self.field_id.as_deref().unwrap_or(&self.id)
    }
}

/// Form with its submission count, as returned by list endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    #[serde(flatten)]
    pub form: Form,
    pub submission_count: usize,
}

impl Form {
    /// Whether a new submission can be accepted given the current count
    pub fn acceptance(&self, submission_count: usize, now: DateTime<Utc>) -> Result<(), ClosedReason> {
        if !self.is_active {
            return Err(ClosedReason::Inactive);
        }
        if let Some(deadline) = self.deadline {
            if now > deadline {
                return Err(ClosedReason::DeadlinePassed);
            }
        }
        if let Some(max) = self.max_entries {
            if max > 0 && submission_count >= max as usize {
                return Err(ClosedReason::Full);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    Inactive,
    DeadlinePassed,
    Full,
}

impl ClosedReason {
    pub fn message(&self) -> &'static str {
        match self {
            ClosedReason::Inactive => "Form is no longer accepting submissions",
            ClosedReason::DeadlinePassed => "Form deadline has passed",
            ClosedReason::Full => "Form has reached maximum entries",
        }
    }
}

/// Field definition as submitted by staff when creating or replacing fields
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInput {
    #[serde(default)]
    pub field_id: Option<String>,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

impl FieldInput {
    /// Build a stored field, deriving the semantic id from the label unless
    /// one was supplied explicitly
    pub fn into_field(self, id: String, form_id: &str, index: usize) -> FormField {
        let semantic = semantic_field_id(&self.label, self.field_id.as_deref());
        FormField {
            id,
            form_id: form_id.to_string(),
            field_id: if semantic.is_empty() { None } else { Some(semantic) },
            label: self.label,
            field_type: self.field_type,
            required: self.required,
            order: self.order.unwrap_or(index as u32),
            options: self.options.filter(|options| !options.is_empty()),
            placeholder: self.placeholder.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_entries: Option<u32>,
    #[serde(default)]
    pub category: Option<BulletinCategory>,
    #[serde(default)]
    pub fields: Option<Vec<FieldInput>>,
}

/// Validated input for a new form
#[derive(Debug, Clone)]
pub struct NewForm {
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub max_entries: Option<u32>,
    pub created_by: String,
    pub fields: Vec<FieldInput>,
}

/// Partial update of a form. Only the members that are `Some` are applied;
/// nullable columns use a nested option so `null` clears them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "present")]
    pub max_entries: Option<Option<u32>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub category: Option<BulletinCategory>,
    #[serde(default)]
    pub fields: Option<Vec<FieldInput>>,
}

// Distinguishes an explicit `null` (Some(None)) from an absent key (None).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl FormChanges {
    /// Merge the provided members into `form`. Field replacement is handled
    /// by the store because it needs fresh ids.
    pub fn apply_to(&self, form: &mut Form) {
        if let Some(title) = &self.title {
            form.title = title.clone();
        }
        if let Some(description) = &self.description {
            form.description = description.clone().filter(|d| !d.is_empty());
        }
        if let Some(deadline) = self.deadline {
            form.deadline = deadline;
        }
        if let Some(max_entries) = self.max_entries {
            form.max_entries = max_entries.filter(|max| *max > 0);
        }
        if let Some(is_active) = self.is_active {
            form.is_active = is_active;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.deadline.is_none()
            && self.max_entries.is_none()
            && self.is_active.is_none()
            && self.category.is_none()
            && self.fields.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFormsParams {
    #[serde(default, deserialize_with = "flag")]
    pub include_inactive: bool,
}

// Only the literal `true` turns a query flag on; any other value is off.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref() == Some("true"))
}
