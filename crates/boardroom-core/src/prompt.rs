use boardroom_provider::{LlmMessage, LlmRequest};
use boardroom_schema::ConversationMessage;

use crate::persona::Persona;

const DISCUSSION_FRAMING: &str = "You are participating in a podcast-style discussion with \
other AI agents about the best ways for a startup director to make money. The conversation \
should feel natural and collaborative. You can:
- Build on others' ideas
- Respectfully disagree and provide alternatives
- Pass the conversation to another agent if the topic fits their expertise better
- Reference previous points made in the conversation";

const CONTENT_GUIDELINES: &str = "STRICT CONTENT GUIDELINES:
- NEVER discuss political topics, politicians, political parties, or governmental policies
- NEVER discuss religious topics, beliefs, or faith-based matters
- Focus exclusively on business, technology, entrepreneurship, and monetisation strategies
- If the conversation drifts toward prohibited topics, redirect back to business strategies";

const LENGTH_LIMIT: &str =
    "Keep your response to 2-3 sentences maximum to maintain a natural conversation flow.";

/// Sampling settings applied to every generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            max_tokens: 150,
            temperature: 0.8,
        }
    }
}

pub fn system_prompt(persona: &Persona) -> String {
    format!(
        "{}\n\n{DISCUSSION_FRAMING}\n\n{CONTENT_GUIDELINES}\n\n{LENGTH_LIMIT}",
        persona.system_prompt.trim()
    )
}

/// `Name: content` lines separated by blank lines.
pub fn render_transcript(history: &[ConversationMessage]) -> String {
    history
        .iter()
        .map(|msg| format!("{}: {}", msg.agent_name, msg.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn closing_instruction(persona: &Persona, history_is_empty: bool, seed_prompt: &str) -> String {
    if history_is_empty {
        seed_prompt.to_string()
    } else {
        format!(
            "Continue the conversation as the {}. Respond naturally to the previous messages.",
            persona.name
        )
    }
}

/// Assembles the full chat request for `persona`'s next line.
pub fn build_request(
    persona: &Persona,
    history: &[ConversationMessage],
    user_input: Option<&str>,
    seed_prompt: &str,
    settings: &GenerationSettings,
) -> LlmRequest {
    let mut messages = Vec::with_capacity(3);

    if !history.is_empty() {
        messages.push(LlmMessage::user(format!(
            "Here's the conversation so far:\n\n{}",
            render_transcript(history)
        )));
    }

    if let Some(input) = user_input.map(str::trim).filter(|s| !s.is_empty()) {
        messages.push(LlmMessage::user(format!(
            "The startup director has added this input to consider: \"{input}\""
        )));
    }

    messages.push(LlmMessage::user(closing_instruction(
        persona,
        history.is_empty(),
        seed_prompt,
    )));

    LlmRequest {
        model: settings.model.clone(),
        system: Some(system_prompt(persona)),
        messages,
        max_tokens: settings.max_tokens,
        temperature: Some(settings.temperature),
    }
}
