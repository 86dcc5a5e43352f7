//! Semantic field identifiers and the portal's view of a form.
//!
//! The portal autofills answers for members by matching on a normalized key
//! such as `email` or `full_name`, so each field carries one independent of
//! either system's row ids.

use crate::models::enums::{BulletinCategory, Department};
use crate::models::form::{Form, FormField};
use crate::models::portal::{PortalField, PortalFormPayload};

/// Semantic id for a field: the explicit id when one is given, otherwise
/// the label lowercased, whitespace runs collapsed to `_`, and everything
/// outside `[a-z0-9_]` removed.
pub fn semantic_field_id(label: &str, explicit: Option<&str>) -> String {
    if let Some(explicit) = explicit.filter(|id| !id.is_empty()) {
        return explicit.to_string();
    }

    let mut id = String::with_capacity(label.len());
    let mut in_whitespace = false;
    for c in label.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                id.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            id.push(c);
        }
    }
    id
}

pub fn portal_field(field: &FormField) -> PortalField {
    PortalField {
        field_id: field.response_key().to_string(),
        label: field.label.clone(),
        field_type: field.field_type,
        required: field.required,
        order: field.order,
        placeholder: field.placeholder.clone(),
        options: field.options.clone(),
    }
}

pub fn portal_fields(fields: &[FormField]) -> Vec<PortalField> {
    fields.iter().map(portal_field).collect()
}

/// Full form payload for first-time publication
pub fn portal_payload(
    form: &Form,
    category: Option<BulletinCategory>,
    department: Option<Department>,
) -> PortalFormPayload {
    PortalFormPayload {
        form_id: form.id.clone(),
        title: form.title.clone(),
        description: form.description.clone(),
        deadline: form.deadline.map(|d| d.to_rfc3339()),
        max_entries: form.max_entries,
        is_active: form.is_active,
        category: category.unwrap_or_default(),
        created_by: department.unwrap_or_default(),
        fields: portal_fields(&form.fields),
    }
}
