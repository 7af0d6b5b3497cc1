use boardroom_schema::ConversationMessage;

use crate::persona::{Persona, PersonaRegistry};

/// Picks the persona who speaks next.
///
/// The opener speaks when there is no history or no last speaker. After a
/// persona, the next one in turn order speaks, wrapping at the end. When the
/// last speaker is not a persona (the startup director), the rotation resumes
/// after the most recent persona in `history`.
pub fn next_agent<'a>(
    personas: &'a PersonaRegistry,
    history: &[ConversationMessage],
    last_speaker: Option<&str>,
) -> &'a Persona {
    let last_speaker = last_speaker.map(str::trim).filter(|s| !s.is_empty());
    let Some(last_speaker) = last_speaker else {
        return personas.opener();
    };
    if history.is_empty() {
        return personas.opener();
    }

    if let Some(index) = personas.position(last_speaker) {
        return personas.after(index);
    }

    history
        .iter()
        .rev()
        .find_map(|msg| personas.position(&msg.agent_id))
        .map(|index| personas.after(index))
        .unwrap_or_else(|| personas.opener())
}
