//! Bulk SMS/email fan-out.
//!
//! Every recipient is sent independently; one failure never stops the
//! others. The batch is summarized as sent, partial or failed and logged
//! once.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::models::common::new_id;
use crate::models::message::{
    BatchStatus, DeliveryFailure, DeliveryReceipt, MessageLog, OutboundMessage,
};
use crate::services::database::DatabaseService;

/// A provider able to deliver one message to one recipient
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Returns the provider's message id
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<String, String>;
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    pub delivered: Vec<DeliveryReceipt>,
    pub failures: Vec<DeliveryFailure>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }

    /// `"<recipient>: <error>; ..."` or `None` when nothing failed
    pub fn error_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.recipient, f.error))
            .collect();
        Some(format!("Failed: {}", parts.join("; ")))
    }
}

/// Normalize a North American phone number to `+<digits>`.
///
/// Spaces, dashes and parentheses are removed; a missing `+` gets `+1`.
/// Anything else that is not a digit, or fewer than 10 digits, is invalid.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();

    let (has_plus, digits) = match cleaned.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };

    if digits.len() < 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(if has_plus {
        format!("+{}", digits)
    } else {
        format!("+1{}", digits)
    })
}

/// Send `message` to every recipient concurrently and collect the results
pub async fn dispatch_batch(
    sender: &dyn MessageSender,
    recipients: &[String],
    message: &OutboundMessage,
) -> BatchOutcome {
    let sends = recipients.iter().map(|recipient| async move {
        let result = sender.send(recipient, message).await;
        (recipient.clone(), result)
    });

    let mut delivered = Vec::new();
    let mut failures = Vec::new();
    for (recipient, result) in join_all(sends).await {
        match result {
            Ok(message_id) => delivered.push(DeliveryReceipt {
                recipient,
                message_id,
            }),
            Err(error) => {
                warn!("Failed to deliver to {}: {}", recipient, error);
                failures.push(DeliveryFailure { recipient, error });
            }
        }
    }

    let status = BatchStatus::from_counts(delivered.len(), failures.len());
    info!(
        "Batch {:?}: delivered to {} of {} recipients",
        status,
        delivered.len(),
        recipients.len()
    );

    BatchOutcome {
        status,
        delivered,
        failures,
    }
}

/// Persist one log record for the batch. Logging problems are reported
/// but never fail the send.
pub fn record_batch(
    database: &DatabaseService,
    user_id: &str,
    recipients: &[String],
    message: &OutboundMessage,
    outcome: &BatchOutcome,
) -> Option<MessageLog> {
    let log = MessageLog {
        id: new_id(),
        channel: message.channel,
        summary: message
            .subject
            .clone()
            .unwrap_or_else(|| message.body.chars().take(160).collect()),
        recipients: recipients.to_vec(),
        status: outcome.status,
        message_ids: outcome
            .delivered
            .iter()
            .map(|receipt| receipt.message_id.clone())
            .collect(),
        error: outcome.error_summary(),
        user_id: user_id.to_string(),
        created_at: Utc::now(),
    };

    match database.record_message_log(&log) {
        Ok(()) => Some(log),
        Err(e) => {
            error!("Failed to log message batch: {}", e);
            None
        }
    }
}
