use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::enums::{Department, Role};

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Header the portal uses to present the shared webhook secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// Compare a presented secret with the expected one in constant time
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    // MAC both values under the expected secret so the comparison length
    // never depends on the presented input
    let key = expected.as_bytes();
    let tag = |value: &str| {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(value.as_bytes());
        mac
    };

    let expected_tag = tag(expected).finalize().into_bytes();
    tag(presented).verify_slice(&expected_tag).is_ok()
}

/// Check the webhook secret header. No configured secret rejects every call.
pub fn verify_webhook_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match (presented, expected) {
        (Some(presented), Some(expected)) if secrets_match(presented, expected) => Ok(()),
        (_, None) => {
            warn!("Webhook call rejected: no webhook secret configured");
            Err(AppError::Unauthorized("Unauthorized - Invalid API key".to_string()))
        }
        _ => {
            debug!("Webhook call presented a missing or wrong API key");
            Err(AppError::Unauthorized("Unauthorized - Invalid API key".to_string()))
        }
    }
}

/// SHA-256 hex digest of a bearer token; only digests are kept in memory
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// An authenticated staff identity, as issued by the credentials provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffSession {
    pub user_id: String,
    pub role: Role,
    pub department: Department,
}

impl StaffSession {
    pub fn require_role(&self, required: Role) -> Result<(), AppError> {
        if self.role.at_least(required) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Forbidden - {} role required",
                required
            )))
        }
    }
}

/// Bearer token digests mapped to the sessions they stand for
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    by_digest: HashMap<String, StaffSession>,
}

impl SessionRegistry {
    pub fn insert(&mut self, token: &str, session: StaffSession) {
        self.by_digest.insert(token_digest(token), session);
    }

    pub fn lookup(&self, token: &str) -> Option<&StaffSession> {
        self.by_digest.get(&token_digest(token))
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }
}

/// Extractor for handlers that need an authenticated staff session
pub struct Staff(pub StaffSession);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Staff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

        state
            .sessions
            .lookup(token)
            .cloned()
            .map(Staff)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))
    }
}
