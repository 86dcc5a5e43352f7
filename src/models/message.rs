use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Sms,
    Email,
}

/// Overall result of a bulk send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Every recipient succeeded
    Sent,
    /// Some recipients succeeded and some failed
    Partial,
    /// No recipient succeeded
    Failed,
}

impl BatchStatus {
    pub fn from_counts(successful: usize, failed: usize) -> Self {
        if failed == 0 {
            BatchStatus::Sent
        } else if successful == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub channel: Channel,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub recipient: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFailure {
    pub recipient: String,
    pub error: String,
}

/// Per-batch record kept for operator visibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLog {
    pub id: String,
    pub channel: Channel,
    pub summary: String,
    pub recipients: Vec<String>,
    pub status: BatchStatus,
    pub message_ids: Vec<String>,
    pub error: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
