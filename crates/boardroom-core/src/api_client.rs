use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use boardroom_schema::{
    AgentInfo, AgentsResponse, GenerateMessageRequest, GenerateMessageResponse, GeneratedMessage,
    HealthResponse, TopicInfo, TopicsResponse,
};

use crate::generator::{GenerateError, MessageSource};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Typed client for a boardroom server's `/api` routes.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` includes the `/api` prefix, e.g. `http://localhost:5001/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn generate(&self, request: &GenerateMessageRequest) -> Result<GeneratedMessage> {
        let resp = self
            .client
            .post(format!("{}/generate-message", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body: GenerateMessageResponse = resp
            .json()
            .await
            .map_err(|e| anyhow!("boardroom api error ({status}): malformed response body: {e}"))?;
        body.into_result()
            .map_err(|e| anyhow!("boardroom api error ({status}): {e}"))
    }

    pub async fn agents(&self) -> Result<Vec<AgentInfo>> {
        let body: AgentsResponse = self.get_json("agents").await?;
        Ok(body.agents)
    }

    pub async fn topics(&self) -> Result<Vec<TopicInfo>> {
        let body: TopicsResponse = self.get_json("topics").await?;
        Ok(body.topics)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("health").await
    }

    async fn get_json<T>(&self, route: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let resp = self
            .client
            .get(format!("{}/{route}", self.base_url))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("boardroom api error ({status}) on /{route}"));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl MessageSource for ApiClient {
    async fn next_message(
        &self,
        request: GenerateMessageRequest,
    ) -> Result<GeneratedMessage, GenerateError> {
        self.generate(&request).await.map_err(|e| {
            tracing::warn!(error = %e, "remote message generation failed");
            GenerateError::new(e.to_string())
        })
    }
}
