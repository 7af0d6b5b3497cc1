use anyhow::Result;
use boardroom_schema::{AgentInfo, TopicInfo};

use crate::config::BoardroomConfig;
use crate::persona::PersonaRegistry;
use crate::topic::TopicRegistry;

/// Immutable persona and topic registries, loaded once at start.
#[derive(Debug, Clone)]
pub struct Roster {
    pub personas: PersonaRegistry,
    pub topics: TopicRegistry,
}

impl Roster {
    pub fn new(personas: PersonaRegistry, topics: TopicRegistry) -> Self {
        Self { personas, topics }
    }

    pub fn from_config(config: &BoardroomConfig) -> Result<Self> {
        let personas = PersonaRegistry::new(
            config.personas.clone(),
            &config.main.conversation.opener,
        )?;
        let topics = TopicRegistry::new(
            config.topics.clone(),
            &config.main.conversation.default_topic,
        )?;
        Ok(Self::new(personas, topics))
    }

    /// Agents in turn order, as listed by `GET /api/agents`.
    pub fn agent_infos(&self) -> Vec<AgentInfo> {
        self.personas
            .iter()
            .map(|p| AgentInfo {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect()
    }

    pub fn topic_infos(&self) -> Vec<TopicInfo> {
        self.topics
            .iter()
            .map(|t| TopicInfo {
                id: t.id.clone(),
                name: t.display_name(),
                description: t.seed_prompt.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn fixture_roster() -> Roster {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config");
    let config = crate::config::load_config(&root).unwrap();
    Roster::from_config(&config).unwrap()
}
