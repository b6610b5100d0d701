use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::AgentError;

pub const DEFAULT_GENERATION_BASE_URL: &str = "http://localhost:3000";

const GENERATION_PATH: &str = "/api/agent/generate";

/// Total budget for the outbound call; a timeout is treated the same as
/// any other transport failure.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Setup payload forwarded to the generation endpoint, field names as the
/// endpoint expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    #[serde(rename = "type")]
    pub interview_type: String,
    pub role: String,
    pub level: String,
    pub techstack: String,
    pub amount: u32,
    pub userid: String,
}

/// Whatever the endpoint answered with: parsed JSON when the body is
/// JSON, an opaque wrapper otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub payload: Value,
}

impl GenerationResponse {
    pub fn from_body(body: &str) -> Self {
        let payload = if body.is_empty() {
            json!({ "success": true })
        } else {
            serde_json::from_str(body).unwrap_or_else(|_| json!({ "raw": body }))
        };
        Self { payload }
    }
}

/// One outbound generation trigger. The call has external side effects and
/// is never retried here; retry policy belongs to the driver.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait QuestionGenerator: Send + Sync {
    async fn request_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, AgentError>;
}

/// HTTP client for the external question-generation service.
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GenerationClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), GENERATION_PATH),
        })
    }
}

#[async_trait]
impl QuestionGenerator for GenerationClient {
    async fn request_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, AgentError> {
        tracing::info!(endpoint = %self.endpoint, "triggering interview generation");

        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::GenerationUnreachable(e.to_string()))?;

        // The body is read fully before deciding success so a rejection
        // always carries the endpoint's diagnostic detail.
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::GenerationUnreachable(e.to_string()))?;

        if status >= 400 {
            return Err(AgentError::GenerationRejected {
                status,
                detail: body,
            });
        }

        Ok(GenerationResponse::from_body(&body))
    }
}
