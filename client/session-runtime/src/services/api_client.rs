use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::error::ApiError;
use crate::models::answer::{SubmissionPayload, SubmissionResult};
use crate::models::anticheat::ViolationEvent;
use crate::models::task::SessionRecord;
use crate::utils::path::encode_segment;

/// Remote interview backend.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn fetch_session(&self, token: &str) -> Result<SessionRecord, ApiError>;

    async fn submit_session(
        &self,
        token: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionResult, ApiError>;

    async fn report_violation(&self, token: &str, event: &ViolationEvent) -> Result<(), ApiError>;
}

pub struct HttpSessionApi {
    http_client: Client,
    base_url: String,
}

impl HttpSessionApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, token: &str, suffix: &str) -> String {
        format!(
            "{}/api/interview/{}{}",
            self.base_url,
            encode_segment(token),
            suffix
        )
    }

    async fn ensure_success(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn fetch_session(&self, token: &str) -> Result<SessionRecord, ApiError> {
        let url = self.endpoint(token, "");
        tracing::debug!("Fetching interview session: {}", url);

        let response = self.http_client.get(&url).send().await?;
        let body = Self::ensure_success(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn submit_session(
        &self,
        token: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionResult, ApiError> {
        let url = self.endpoint(token, "/submit");
        tracing::debug!("Submitting interview answers: {}", url);

        let response = self.http_client.post(&url).json(payload).send().await?;
        let body = Self::ensure_success(response).await?.bytes().await?;
        if body.is_empty() {
            return Ok(SubmissionResult(serde_json::Value::Null));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn report_violation(&self, token: &str, event: &ViolationEvent) -> Result<(), ApiError> {
        let url = self.endpoint(token, "/cheat-event");

        let response = self.http_client.post(&url).json(event).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
