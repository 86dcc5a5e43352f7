use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde_json::Value;

use crate::models::form::{Form, FormField};
use crate::models::submission::Submission;
use crate::services::database::StoreError;

/// Semantic ids already covered by the fixed contact columns
const CONTACT_FIELD_IDS: &[&str] = &["first_name", "last_name", "email", "phone", "full_name"];

fn is_contact_field(field: &FormField) -> bool {
    field
        .field_id
        .as_deref()
        .map_or(false, |id| CONTACT_FIELD_IDS.contains(&id))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => if *b { "Yes" } else { "No" }.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

/// Render a form's submissions as CSV: contact columns, then one column per
/// non-contact field in field order
pub fn submissions_csv(form: &Form, submissions: &[Submission]) -> Result<String, StoreError> {
    let custom: Vec<&FormField> = form.fields.iter().filter(|f| !is_contact_field(f)).collect();

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    let mut header = vec![
        "Name".to_string(),
        "Email".to_string(),
        "Phone".to_string(),
        "Submitted".to_string(),
    ];
    header.extend(custom.iter().map(|f| f.label.clone()));
    writer.write_record(&header)?;

    for submission in submissions {
        let mut record = vec![
            submission.name.clone(),
            submission.email.clone().unwrap_or_default(),
            submission.phone.clone().unwrap_or_default(),
            submission.submitted_at.to_rfc3339(),
        ];
        for field in &custom {
            // Answers are keyed by semantic id; older ones by row id
            let value = field
                .field_id
                .as_deref()
                .and_then(|id| submission.responses.get(id))
                .or_else(|| submission.responses.get(&field.id));
            record.push(cell(value));
        }
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `<title>_submissions_<yyyy-mm-dd>.csv` with whitespace runs as `_`
pub fn export_file_name(form: &Form, now: DateTime<Utc>) -> String {
    let title = form.title.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{}_submissions_{}.csv", title, now.format("%Y-%m-%d"))
}
