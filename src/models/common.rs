use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

/// Generate a collision-resistant record id (lowercase, 25 characters,
/// always starting with a letter)
pub fn new_id() -> String {
    let body: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("c{}", body)
}

/// Outcome of a portal round trip reported next to a successful local action
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalStatus {
    pub portal_synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_form_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_error: Option<String>,
}
