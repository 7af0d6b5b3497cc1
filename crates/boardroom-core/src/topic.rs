use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const CUSTOM_TOPIC: &str = "custom";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub seed_prompt: String,
}

impl Topic {
    /// `saas` becomes `Saas`.
    pub fn display_name(&self) -> String {
        let mut chars = self.id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicRegistry {
    topics: Vec<Topic>,
    index: HashMap<String, usize>,
    default_topic: String,
}

impl TopicRegistry {
    pub fn new(topics: Vec<Topic>, default_topic: &str) -> Result<Self> {
        let index: HashMap<String, usize> = topics
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        if !index.contains_key(default_topic) {
            return Err(anyhow!("default topic is not registered: {default_topic}"));
        }
        Ok(Self {
            topics,
            index,
            default_topic: default_topic.to_string(),
        })
    }

    pub fn get(&self, id: &str) -> Option<&Topic> {
        self.index.get(id).map(|&i| &self.topics[i])
    }

    pub fn default_topic(&self) -> &Topic {
        &self.topics[self.index[&self.default_topic]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    /// Opening instruction for a fresh conversation.
    ///
    /// `custom` with non-blank text builds a prompt around that text. Unknown
    /// ids, and `custom` without text, fall back to the default topic.
    pub fn seed_prompt(&self, topic: &str, custom_topic: Option<&str>) -> String {
        if topic == CUSTOM_TOPIC {
            if let Some(text) = custom_topic.map(str::trim).filter(|t| !t.is_empty()) {
                return custom_seed_prompt(text);
            }
            return self.default_topic().seed_prompt.clone();
        }
        self.get(topic)
            .unwrap_or_else(|| self.default_topic())
            .seed_prompt
            .clone()
    }
}

fn custom_seed_prompt(text: &str) -> String {
    format!(
        "Start a discussion focused on \"{text}\" and how it relates to startup monetisation \
         strategies. Explore the business opportunities, revenue models, and growth potential \
         in this area."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TopicRegistry {
        TopicRegistry::new(
            vec![
                Topic {
                    id: "general".into(),
                    seed_prompt: "Talk monetisation.".into(),
                },
                Topic {
                    id: "saas".into(),
                    seed_prompt: "Talk SaaS.".into(),
                },
                Topic {
                    id: "custom".into(),
                    seed_prompt: "placeholder".into(),
                },
            ],
            "general",
        )
        .unwrap()
    }

    #[test]
    fn seed_prompt_for_known_topic() {
        assert_eq!(registry().seed_prompt("saas", None), "Talk SaaS.");
    }

    #[test]
    fn seed_prompt_unknown_topic_falls_back_to_default() {
        assert_eq!(registry().seed_prompt("crypto", None), "Talk monetisation.");
    }

    #[test]
    fn seed_prompt_custom_topic_embeds_text() {
        let prompt = registry().seed_prompt("custom", Some("  pet insurance "));
        assert!(prompt.starts_with("Start a discussion focused on \"pet insurance\""));
        assert!(prompt.ends_with("growth potential in this area."));
    }

    #[test]
    fn seed_prompt_custom_without_text_uses_default() {
        assert_eq!(
            registry().seed_prompt("custom", Some("   ")),
            "Talk monetisation."
        );
        assert_eq!(registry().seed_prompt("custom", None), "Talk monetisation.");
    }

    #[test]
    fn display_name_capitalises_first_letter() {
        let topic = Topic {
            id: "ecommerce".into(),
            seed_prompt: String::new(),
        };
        assert_eq!(topic.display_name(), "Ecommerce");
    }

    #[test]
    fn missing_default_topic_is_rejected() {
        assert!(TopicRegistry::new(vec![], "general").is_err());
    }
}
