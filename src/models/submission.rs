use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored response to a sign-up form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub form_id: String,
    pub member_id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub responses: Map<String, Value>,
    pub submitted_at: DateTime<Utc>,
}

/// Submission data before it is assigned an id by the store
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub form_id: String,
    pub member_id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub responses: Map<String, Value>,
    pub submitted_at: DateTime<Utc>,
}

impl NewSubmission {
    pub fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            form_id: &self.form_id,
            name: &self.name,
            email: self.email.as_deref(),
            submitted_at: self.submitted_at,
        }
    }
}

/// (form, submitter name, email, exact submission time). Two submissions
/// with equal keys are the same submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupKey<'a> {
    pub form_id: &'a str,
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub submitted_at: DateTime<Utc>,
}

/// Result of inserting under the uniqueness constraint
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Submission),
    /// An equal de-duplication key already exists; carries the existing row
    Duplicate(Submission),
    /// The form already holds its maximum number of submissions
    Full,
}

// Webhook payload types. Every member is optional so that presence checks
// can report which one is missing instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSubmission {
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub submitter: Option<Submitter>,
    #[serde(default)]
    pub responses: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub member_id: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub success: bool,
    pub submission_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSubmissionParams {
    #[serde(default)]
    pub submission_id: Option<String>,
}

/// Read a member id from a JSON number or the leading digits of a string
pub fn parse_member_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let trimmed = s.trim();
            let (sign, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|n| sign * n)
        }
        _ => None,
    }
}

/// Treat empty strings the same as a missing value
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
