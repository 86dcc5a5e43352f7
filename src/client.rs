use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PortalConfig;
use crate::models::portal::{
    PortalCreateResponse, PortalFormPatch, PortalFormPayload, PortalSubmissionList, SubmissionQuery,
};

/// Value of the `X-Source` header on every portal call
const SOURCE_TAG: &str = "band-office";

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Portal API key not configured")]
    NotConfigured,

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },
}

/// Operations the service needs from the community portal
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Create a sign-up form; the portal answers with its own form id
    async fn create_form(&self, payload: &PortalFormPayload) -> Result<PortalCreateResponse, PortalError>;

    async fn update_form(&self, portal_form_id: &str, patch: &PortalFormPatch) -> Result<(), PortalError>;

    /// Delete a form. A form the portal no longer knows is not an error.
    async fn delete_form(&self, portal_form_id: &str) -> Result<(), PortalError>;

    async fn list_submissions(&self, query: &SubmissionQuery) -> Result<PortalSubmissionList, PortalError>;

    async fn check_connection(&self) -> bool;
}

/// reqwest-backed portal client
pub struct PortalClient {
    client: Client,
    config: PortalConfig,
}

impl PortalClient {
    pub fn new(config: PortalConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.portal_base_url, path)
    }

    fn ensure_configured(&self) -> Result<(), PortalError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            warn!("PORTAL_API_KEY not configured, skipping portal call");
            Err(PortalError::NotConfigured)
        }
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-API-Key", &self.config.api_key)
            .header("X-Source", SOURCE_TAG)
    }

    /// Turn a non-2xx response into an error, preferring the portal's own
    /// `message` when the body carries one
    async fn error_from(response: Response) -> PortalError {
        let status = response.status();
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("Portal returned {}", status.as_u16()));

        PortalError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl PortalApi for PortalClient {
    async fn create_form(&self, payload: &PortalFormPayload) -> Result<PortalCreateResponse, PortalError> {
        self.ensure_configured()?;

        info!("Publishing form {} to portal", payload.form_id);
        let response = self
            .with_headers(self.client.post(self.url("/api/signup-forms")))
            .json(payload)
            .send()
            .await?;
        debug!("Portal create responded with {}", response.status());

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response.json::<PortalCreateResponse>().await?)
    }

    async fn update_form(&self, portal_form_id: &str, patch: &PortalFormPatch) -> Result<(), PortalError> {
        self.ensure_configured()?;

        info!("Updating portal form {}", portal_form_id);
        let response = self
            .with_headers(
                self.client
                    .patch(self.url(&format!("/api/signup-forms/{}", portal_form_id))),
            )
            .json(patch)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }

    async fn delete_form(&self, portal_form_id: &str) -> Result<(), PortalError> {
        self.ensure_configured()?;

        info!("Deleting portal form {}", portal_form_id);
        let response = self
            .with_headers(
                self.client
                    .delete(self.url(&format!("/api/signup-forms/{}", portal_form_id))),
            )
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!("Portal form {} already gone", portal_form_id);
            return Ok(());
        }
        if !status.is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }

    async fn list_submissions(&self, query: &SubmissionQuery) -> Result<PortalSubmissionList, PortalError> {
        self.ensure_configured()?;

        let url = self.url("/api/signup-forms/submissions");
        info!("Fetching submissions from portal: {:?}", query);

        let response = self
            .with_headers(self.client.get(&url))
            .query(query)
            .send()
            .await?;
        debug!("Portal list responded with {}", response.status());

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PortalError::Status {
                status: status.as_u16(),
                message: format!("Portal returned {}: {}", status.as_u16(), text),
            });
        }

        Ok(response.json::<PortalSubmissionList>().await?)
    }

    async fn check_connection(&self) -> bool {
        match self
            .with_headers(self.client.get(self.url("/api/health")))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!("Portal health check failed: {}", err);
                false
            }
        }
    }
}
