use dotenv::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{SessionRegistry, StaffSession};
use crate::models::enums::{Department, Role};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Connection settings for the community portal
#[derive(Debug, Clone, Default)]
pub struct PortalConfig {
    pub portal_base_url: String,
    pub api_key: String,
}

impl PortalConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Process configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub webhook_secret: Option<String>,
    pub sessions: SessionRegistry,
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Load from `.env` (if present) and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let portal = PortalConfig {
            portal_base_url: env::var("PORTAL_BASE_URL")
                .unwrap_or_else(|_| "https://tcnaux.ca".to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: env::var("PORTAL_API_KEY").unwrap_or_default(),
        };

        let webhook_secret = webhook_secret(env::var("WEBHOOK_SECRET").ok(), &portal.api_key);

        let sessions = parse_staff_tokens(&env::var("STAFF_TOKENS").unwrap_or_default())?;

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "/app/data".to_string()));

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let request_timeout = match env::var("REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_SECS",
                reason: e.to_string(),
            })?),
            Err(_) => Duration::from_secs(30),
        };

        Ok(Self {
            portal,
            webhook_secret,
            sessions,
            data_dir,
            bind_addr,
            request_timeout,
        })
    }
}

/// The portal signs its webhook calls with its API key unless a dedicated,
/// non-empty secret is set. `None` when neither is available.
pub fn webhook_secret(explicit: Option<String>, portal_api_key: &str) -> Option<String> {
    explicit
        .filter(|secret| !secret.is_empty())
        .or_else(|| Some(portal_api_key.to_string()))
        .filter(|secret| !secret.is_empty())
}

/// Parse `token=user_id:ROLE:DEPARTMENT` entries separated by `;`
pub fn parse_staff_tokens(raw: &str) -> Result<SessionRegistry, ConfigError> {
    let mut registry = SessionRegistry::default();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let invalid = |reason: &str| ConfigError::Invalid {
            name: "STAFF_TOKENS",
            reason: format!("{} in entry for {}", reason, entry.split('=').nth(1).unwrap_or("?")),
        };

        let (token, identity) = entry.split_once('=').ok_or_else(|| invalid("missing '='"))?;
        let parts: Vec<&str> = identity.split(':').collect();
        if token.is_empty() || parts.len() != 3 || parts[0].is_empty() {
            return Err(invalid("expected token=user_id:ROLE:DEPARTMENT"));
        }

        let role = parts[1].parse::<Role>().map_err(|e| invalid(&e.to_string()))?;
        let department = parts[2].parse::<Department>().map_err(|e| invalid(&e.to_string()))?;

        registry.insert(
            token,
            StaffSession {
                user_id: parts[0].to_string(),
                role,
                department,
            },
        );
    }

    Ok(registry)
}
