use std::sync::Arc;

use async_trait::async_trait;
use boardroom_provider::LlmProvider;
use boardroom_schema::{GenerateMessageRequest, GeneratedMessage};
use chrono::Utc;

use crate::prompt::{build_request, GenerationSettings};
use crate::roster::Roster;
use crate::turn::next_agent;

/// Opaque generation failure. The cause is logged, never shown to callers
/// beyond [`GenerateError::detail`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to generate message")]
pub struct GenerateError {
    detail: String,
}

impl GenerateError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Anything that can produce the next boardroom line: the in-process
/// generator or a remote `/api/generate-message` endpoint.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn next_message(
        &self,
        request: GenerateMessageRequest,
    ) -> Result<GeneratedMessage, GenerateError>;
}

pub struct MessageGenerator {
    provider: Arc<dyn LlmProvider>,
    roster: Arc<Roster>,
    settings: GenerationSettings,
}

impl MessageGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        roster: Arc<Roster>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            roster,
            settings,
        }
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub async fn generate(
        &self,
        request: &GenerateMessageRequest,
    ) -> Result<GeneratedMessage, GenerateError> {
        let persona = next_agent(
            &self.roster.personas,
            &request.conversation_history,
            request.last_speaker.as_deref(),
        );
        let seed = self
            .roster
            .topics
            .seed_prompt(&request.topic, request.custom_topic.as_deref());
        let llm_request = build_request(
            persona,
            &request.conversation_history,
            request.user_input.as_deref(),
            &seed,
            &self.settings,
        );

        tracing::debug!(
            agent = %persona.id,
            topic = %request.topic,
            history = request.conversation_history.len(),
            prompt_messages = llm_request.messages.len(),
            "generating boardroom message"
        );

        let response = self.provider.chat(llm_request).await.map_err(|e| {
            tracing::warn!(agent = %persona.id, error = %e, "message generation failed");
            GenerateError::new(e.to_string())
        })?;

        if response.truncated {
            tracing::debug!(
                agent = %persona.id,
                output_tokens = ?response.output_tokens,
                "completion cut at max_tokens"
            );
        }
        let content = response.text.trim();
        if content.is_empty() {
            tracing::warn!(agent = %persona.id, "model returned an empty completion");
            return Err(GenerateError::new("empty completion"));
        }

        Ok(GeneratedMessage {
            agent_id: persona.id.clone(),
            agent_name: persona.name.clone(),
            content: content.to_string(),
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl MessageSource for MessageGenerator {
    async fn next_message(
        &self,
        request: GenerateMessageRequest,
    ) -> Result<GeneratedMessage, GenerateError> {
        self.generate(&request).await
    }
}
