use std::fmt;

use boardroom_schema::{
    ConversationLog, ConversationMessage, GenerateMessageRequest, GeneratedMessage,
};
use chrono::Utc;

use crate::generator::GenerateError;
use crate::log_store::LogStore;
use crate::topic::CUSTOM_TOPIC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Playing,
    Paused,
    ViewingLog,
}

impl ConversationState {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::ViewingLog => "viewing a log",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: ConversationState,
    },
    #[error("input must not be blank")]
    EmptyInput,
    #[error("no failed generation to retry")]
    NothingToRetry,
    #[error("conversation log not found: {0}")]
    LogNotFound(String),
}

/// A generation the caller must run and hand back to
/// [`Conversation::complete_generation`].
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub session: u64,
    pub request: GenerateMessageRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Appended(ConversationMessage),
    Failed(GenerateError),
    /// The session the call belonged to is over.
    Discarded,
}

/// Client-side conversation loop: state, transcript and archived logs.
///
/// Generation is split into [`begin_generation`](Self::begin_generation) and
/// [`complete_generation`](Self::complete_generation) so the caller decides how
/// the call runs. At most one call is in flight, across sessions too; results
/// from an older session are dropped.
pub struct Conversation {
    state: ConversationState,
    transcript: Vec<ConversationMessage>,
    last_speaker: Option<String>,
    topic: String,
    custom_topic: Option<String>,
    default_topic: String,
    session: u64,
    in_flight: bool,
    failure: Option<GenerateError>,
    viewing: Option<ConversationLog>,
    logs: LogStore,
}

impl Conversation {
    pub fn new(logs: LogStore, default_topic: impl Into<String>) -> Self {
        let default_topic = default_topic.into();
        Self {
            state: ConversationState::Idle,
            transcript: Vec::new(),
            last_speaker: None,
            topic: default_topic.clone(),
            custom_topic: None,
            default_topic,
            session: 0,
            in_flight: false,
            failure: None,
            viewing: None,
            logs,
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn transcript(&self) -> &[ConversationMessage] {
        &self.transcript
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn failure(&self) -> Option<&GenerateError> {
        self.failure.as_ref()
    }

    pub fn viewing(&self) -> Option<&ConversationLog> {
        self.viewing.as_ref()
    }

    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    pub fn start(
        &mut self,
        topic: &str,
        custom_topic: Option<String>,
    ) -> Result<(), ConversationError> {
        self.expect_state("start", &[ConversationState::Idle])?;

        let topic = topic.trim();
        self.topic = if topic.is_empty() {
            self.default_topic.clone()
        } else {
            topic.to_string()
        };
        self.custom_topic = custom_topic
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && self.topic == CUSTOM_TOPIC);
        self.reset_session();
        self.state = ConversationState::Playing;
        tracing::info!(topic = %self.topic, session = self.session, "conversation started");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), ConversationError> {
        self.expect_state("pause", &[ConversationState::Playing])?;
        self.state = ConversationState::Paused;
        Ok(())
    }

    /// Resumes a paused conversation. Text, when given, must be non-blank and
    /// is appended as a message from the startup director.
    pub fn resume(
        &mut self,
        input: Option<&str>,
    ) -> Result<Option<ConversationMessage>, ConversationError> {
        self.expect_state("resume", &[ConversationState::Paused])?;

        let injected = match input {
            Some(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ConversationError::EmptyInput);
                }
                let msg = ConversationMessage::from_user(text);
                self.push(msg.clone());
                Some(msg)
            }
            None => None,
        };

        self.failure = None;
        self.state = ConversationState::Playing;
        Ok(injected)
    }

    /// Clears a generation failure so the loop issues the next call.
    pub fn retry(&mut self) -> Result<(), ConversationError> {
        self.expect_state(
            "retry",
            &[ConversationState::Playing, ConversationState::Paused],
        )?;
        if self.failure.take().is_none() {
            return Err(ConversationError::NothingToRetry);
        }
        Ok(())
    }

    /// Ends the live session. A non-empty transcript is archived and the new
    /// log returned.
    pub fn stop(&mut self) -> Result<Option<ConversationLog>, ConversationError> {
        self.expect_state(
            "stop",
            &[ConversationState::Playing, ConversationState::Paused],
        )?;

        let archived = if self.transcript.is_empty() {
            None
        } else {
            let log = ConversationLog::from_transcript(&self.transcript, Utc::now());
            if let Err(e) = self.logs.append(log.clone()) {
                tracing::warn!(error = %e, log_id = %log.id, "failed to persist conversation log");
            }
            tracing::info!(
                log_id = %log.id,
                messages = log.messages.len(),
                "conversation archived"
            );
            Some(log)
        };

        self.reset_session();
        self.state = ConversationState::Idle;
        Ok(archived)
    }

    /// Opens an archived log read-only. A live session is stopped and
    /// archived first; the archived log, if any, is returned.
    pub fn view_log(&mut self, id: &str) -> Result<Option<ConversationLog>, ConversationError> {
        let log = self
            .logs
            .view(id)
            .cloned()
            .ok_or_else(|| ConversationError::LogNotFound(id.to_string()))?;

        let archived = if self.state.is_live() {
            self.stop()?
        } else {
            None
        };

        self.viewing = Some(log);
        self.state = ConversationState::ViewingLog;
        Ok(archived)
    }

    pub fn close_log(&mut self) -> Result<(), ConversationError> {
        self.expect_state("close a log", &[ConversationState::ViewingLog])?;
        self.viewing = None;
        self.state = ConversationState::Idle;
        Ok(())
    }

    /// True while playing with nothing in flight and no unresolved failure.
    pub fn wants_generation(&self) -> bool {
        self.state == ConversationState::Playing && !self.in_flight && self.failure.is_none()
    }

    pub fn begin_generation(&mut self) -> Option<GenerationTicket> {
        if !self.wants_generation() {
            return None;
        }
        self.in_flight = true;

        let user_input = self
            .transcript
            .last()
            .filter(|msg| msg.is_user())
            .map(|msg| msg.content.clone());

        Some(GenerationTicket {
            session: self.session,
            request: GenerateMessageRequest {
                conversation_history: self.transcript.clone(),
                last_speaker: self.last_speaker.clone(),
                user_input,
                topic: self.topic.clone(),
                custom_topic: self.custom_topic.clone(),
            },
        })
    }

    pub fn complete_generation(
        &mut self,
        session: u64,
        result: Result<GeneratedMessage, GenerateError>,
    ) -> GenerationOutcome {
        self.in_flight = false;

        if session != self.session || !self.state.is_live() {
            tracing::debug!(session, current = self.session, "discarding stale generation");
            return GenerationOutcome::Discarded;
        }

        match result {
            Ok(generated) => {
                let msg = generated.into_message();
                self.push(msg.clone());
                GenerationOutcome::Appended(msg)
            }
            Err(err) => {
                tracing::warn!(detail = err.detail(), "generation failed, waiting for retry");
                self.failure = Some(err.clone());
                GenerationOutcome::Failed(err)
            }
        }
    }

    fn push(&mut self, msg: ConversationMessage) {
        self.last_speaker = Some(msg.agent_id.clone());
        self.transcript.push(msg);
    }

    fn reset_session(&mut self) {
        self.session += 1;
        self.transcript.clear();
        self.last_speaker = None;
        self.failure = None;
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: &[ConversationState],
    ) -> Result<(), ConversationError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ConversationError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }
}
