use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Agent id carried by messages the human participant injects.
pub const USER_AGENT_ID: &str = "user";
/// Display name attached to injected human messages.
pub const USER_DISPLAY_NAME: &str = "Startup Director";
/// Topic used when a request names none.
pub const DEFAULT_TOPIC: &str = "general";

const PREVIEW_CHARS: usize = 80;

/// One line of the boardroom conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    #[serde(default = "new_id")]
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl ConversationMessage {
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            content: content.into(),
            timestamp,
        }
    }

    /// A message typed by the startup director while the meeting was paused.
    pub fn from_user(content: impl Into<String>) -> Self {
        Self::new(USER_AGENT_ID, USER_DISPLAY_NAME, content, Utc::now())
    }

    pub fn is_user(&self) -> bool {
        self.agent_id == USER_AGENT_ID
    }
}

/// An archived, read-only snapshot of a finished conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<ConversationMessage>,
    pub title: String,
}

impl ConversationLog {
    /// Copies `messages` into a new log stamped with `at`.
    pub fn from_transcript(messages: &[ConversationMessage], at: DateTime<Utc>) -> Self {
        let local = at.with_timezone(&Local);
        Self {
            id: new_id(),
            timestamp: at,
            messages: messages.to_vec(),
            title: format!(
                "Conversation {} {}",
                local.format("%Y-%m-%d"),
                local.format("%H:%M:%S")
            ),
        }
    }

    /// First message content, cut at 80 characters.
    pub fn preview(&self) -> String {
        let Some(first) = self.messages.first() else {
            return "Empty conversation".to_string();
        };
        if first.content.chars().count() > PREVIEW_CHARS {
            let cut: String = first.content.chars().take(PREVIEW_CHARS).collect();
            format!("{cut}...")
        } else {
            first.content.clone()
        }
    }
}

// ============================================================
// HTTP wire types
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMessageRequest {
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessage>,
    #[serde(default)]
    pub last_speaker: Option<String>,
    #[serde(default)]
    pub user_input: Option<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub custom_topic: Option<String>,
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

impl Default for GenerateMessageRequest {
    fn default() -> Self {
        Self {
            conversation_history: Vec::new(),
            last_speaker: None,
            user_input: None,
            topic: default_topic(),
            custom_topic: None,
        }
    }
}

impl GenerateMessageRequest {
    pub fn opening(topic: impl Into<String>, custom_topic: Option<String>) -> Self {
        Self {
            topic: topic.into(),
            custom_topic,
            ..Self::default()
        }
    }
}

/// The generator's product before it is given a message id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMessage {
    pub agent_id: String,
    pub agent_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl GeneratedMessage {
    pub fn into_message(self) -> ConversationMessage {
        ConversationMessage::new(self.agent_id, self.agent_name, self.content, self.timestamp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerateMessageResponse {
    pub fn ok(generated: GeneratedMessage) -> Self {
        Self {
            success: true,
            agent: Some(generated.agent_id),
            agent_name: Some(generated.agent_name),
            message: Some(generated.content),
            timestamp: Some(generated.timestamp),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            agent: None,
            agent_name: None,
            message: None,
            timestamp: None,
            error: Some(error.into()),
        }
    }

    /// A successful response must name the agent and carry the message text.
    pub fn into_result(self) -> Result<GeneratedMessage, String> {
        if !self.success {
            return Err(self
                .error
                .unwrap_or_else(|| "generation failed".to_string()));
        }
        match (self.agent, self.agent_name, self.message) {
            (Some(agent_id), Some(agent_name), Some(content)) => Ok(GeneratedMessage {
                agent_id,
                agent_name,
                content,
                timestamp: self.timestamp.unwrap_or_else(Utc::now),
            }),
            _ => Err("incomplete generate-message response".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsResponse {
    pub topics: Vec<TopicInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message(agent_id: &str, content: &str) -> ConversationMessage {
        ConversationMessage::new(agent_id, "Daniel Rodriguez", content, Utc::now())
    }

    #[test]
    fn message_uses_camel_case_fields() {
        let msg = sample_message("entrepreneur", "Recurring revenue first.");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["agentId"], "entrepreneur");
        assert_eq!(json["agentName"], "Daniel Rodriguez");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn message_accepts_browser_style_payload() {
        let raw = serde_json::json!({
            "id": "1722000000000",
            "agentId": "user",
            "agentName": "Startup Director",
            "content": "What about churn?",
            "timestamp": "2024-07-26T12:00:00.000Z"
        });
        let msg: ConversationMessage = serde_json::from_value(raw).unwrap();
        assert!(msg.is_user());
        assert_eq!(msg.id, "1722000000000");
    }

    #[test]
    fn log_round_trip_is_field_for_field_equal() {
        let log = ConversationLog::from_transcript(
            &[
                sample_message("entrepreneur", "Let's talk SaaS."),
                ConversationMessage::from_user("Focus on B2B."),
            ],
            Utc::now(),
        );
        let encoded = serde_json::to_string(&vec![log.clone()]).unwrap();
        let decoded: Vec<ConversationLog> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, vec![log]);
    }

    #[test]
    fn log_is_a_copy_of_the_transcript() {
        let mut transcript = vec![sample_message("realist", "Cash flow matters.")];
        let log = ConversationLog::from_transcript(&transcript, Utc::now());
        transcript[0].content.push_str(" Edited.");
        transcript.push(sample_message("creative", "Think bigger."));
        assert_eq!(log.messages.len(), 1);
        assert_eq!(log.messages[0].content, "Cash flow matters.");
        assert!(log.title.starts_with("Conversation "));
    }

    #[test]
    fn preview_truncates_long_first_message() {
        let long = "x".repeat(100);
        let log = ConversationLog::from_transcript(&[sample_message("tech", &long)], Utc::now());
        let preview = log.preview();
        assert_eq!(preview.len(), 83);
        assert!(preview.ends_with("..."));

        let empty = ConversationLog::from_transcript(&[], Utc::now());
        assert_eq!(empty.preview(), "Empty conversation");
    }

    #[test]
    fn request_defaults_apply_to_empty_body() {
        let req: GenerateMessageRequest = serde_json::from_str("{}").unwrap();
        assert!(req.conversation_history.is_empty());
        assert_eq!(req.last_speaker, None);
        assert_eq!(req.topic, DEFAULT_TOPIC);
    }

    #[test]
    fn response_into_result_requires_agent_and_text() {
        let ok = GenerateMessageResponse::ok(GeneratedMessage {
            agent_id: "entrepreneur".into(),
            agent_name: "Daniel Rodriguez".into(),
            content: "Hi".into(),
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["agentName"], "Daniel Rodriguez");
        assert!(json.get("error").is_none());
        assert!(ok.into_result().is_ok());

        let failed = GenerateMessageResponse::failure("Failed to generate message");
        assert_eq!(failed.into_result().unwrap_err(), "Failed to generate message");

        let partial: GenerateMessageResponse =
            serde_json::from_value(serde_json::json!({"success": true, "agent": "tech"}))
                .unwrap();
        assert!(partial.into_result().is_err());
    }
}
