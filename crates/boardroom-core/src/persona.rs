use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// One seat at the boardroom table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub description: String,
    /// Behavioural prompt sent as the start of the system message.
    pub system_prompt: String,
}

/// The fixed, ordered set of personas. Order is turn order.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
    opener: usize,
}

impl PersonaRegistry {
    pub fn new(personas: Vec<Persona>, opener: &str) -> Result<Self> {
        if personas.is_empty() {
            return Err(anyhow!("persona registry cannot be empty"));
        }
        let opener = personas
            .iter()
            .position(|p| p.id == opener)
            .ok_or_else(|| anyhow!("opener is not a known persona: {opener}"))?;
        Ok(Self { personas, opener })
    }

    /// The persona who speaks first in every conversation.
    pub fn opener(&self) -> &Persona {
        &self.personas[self.opener]
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.personas.iter().position(|p| p.id == id)
    }

    /// Persona after `index`, wrapping after the last one.
    pub fn after(&self, index: usize) -> &Persona {
        &self.personas[(index + 1) % self.personas.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
