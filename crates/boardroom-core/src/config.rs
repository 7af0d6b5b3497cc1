use std::{collections::HashSet, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use boardroom_schema::USER_AGENT_ID;
use serde::{Deserialize, Serialize};

use crate::persona::Persona;
use crate::topic::Topic;

fn default_bind() -> String {
    "0.0.0.0:5001".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.8
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_opener() -> String {
    "entrepreneur".to_string()
}

fn default_topic_id() -> String {
    boardroom_schema::DEFAULT_TOPIC.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_opener")]
    pub opener: String,
    #[serde(default = "default_topic_id")]
    pub default_topic: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            opener: default_opener(),
            default_topic: default_topic_id(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersonasFile {
    personas: Vec<Persona>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TopicsFile {
    topics: Vec<Topic>,
}

#[derive(Debug, Clone)]
pub struct BoardroomConfig {
    pub main: MainConfig,
    pub personas: Vec<Persona>,
    pub topics: Vec<Topic>,
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Loads `main.yaml`, `personas.yaml` and `topics.yaml` from `root`.
pub fn load_config(root: &Path) -> Result<BoardroomConfig> {
    let mut main: MainConfig = read_yaml_file(&root.join("main.yaml"))?;
    let personas: PersonasFile = read_yaml_file(&root.join("personas.yaml"))?;
    let topics: TopicsFile = read_yaml_file(&root.join("topics.yaml"))?;

    resolve_main_env(&mut main);

    let config = BoardroomConfig {
        main,
        personas: personas.personas,
        topics: topics.topics,
    };

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &BoardroomConfig) -> Result<()> {
    if config.personas.is_empty() {
        return Err(anyhow!("at least one persona must be configured"));
    }

    let mut seen = HashSet::new();
    for persona in &config.personas {
        if persona.id.trim().is_empty() {
            return Err(anyhow!("persona id must not be empty"));
        }
        if persona.id == USER_AGENT_ID {
            return Err(anyhow!("persona id is reserved: {}", persona.id));
        }
        if !seen.insert(persona.id.as_str()) {
            return Err(anyhow!("duplicate persona id: {}", persona.id));
        }
    }

    if !seen.contains(config.main.conversation.opener.as_str()) {
        return Err(anyhow!(
            "opener does not exist in personas: {}",
            config.main.conversation.opener
        ));
    }

    let mut topic_ids = HashSet::new();
    for topic in &config.topics {
        if !topic_ids.insert(topic.id.as_str()) {
            return Err(anyhow!("duplicate topic id: {}", topic.id));
        }
    }

    if !topic_ids.contains(config.main.conversation.default_topic.as_str()) {
        return Err(anyhow!(
            "default_topic does not exist in topics: {}",
            config.main.conversation.default_topic
        ));
    }

    let model = &config.main.model;
    if model.max_tokens == 0 {
        return Err(anyhow!("model.max_tokens must be greater than zero"));
    }
    if !(0.0..=2.0).contains(&model.temperature) {
        return Err(anyhow!(
            "model.temperature must be within [0, 2], got {}",
            model.temperature
        ));
    }

    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_main_env(main: &mut MainConfig) {
    main.server.bind = resolve_env_var(&main.server.bind);
    main.model.api_base = resolve_env_var(&main.model.api_base);
    main.model.api_key = resolve_env_var(&main.model.api_key);
    main.model.model = resolve_env_var(&main.model.model);
    main.storage.data_dir = resolve_env_var(&main.storage.data_dir);
}
